#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Partner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub role: Role,
    pub content: String,
}

/// Running memory of the conversation handed to the reply generator.
/// Append-only; one entry per accepted message.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    entries: Vec<ContextEntry>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push(ContextEntry {
            role,
            content: content.into(),
        });
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn format_history(context: &ConversationContext) -> String {
    if context.is_empty() {
        return "(no messages yet)".to_string();
    }

    let mut out = String::new();
    for entry in context.entries() {
        match entry.role {
            Role::User => out.push_str("User: "),
            Role::Partner => out.push_str("Partner: "),
        }
        out.push_str(&entry.content);
        out.push('\n');
    }
    out
}
