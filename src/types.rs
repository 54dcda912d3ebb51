use crate::error::GeneratorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One partner message as currently rendered by the chat surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingMessage {
    pub text: Option<String>,
    pub has_image: bool,
    pub image_reference: Option<String>,
    pub rendered_timestamp: Option<String>,
}

impl IncomingMessage {
    /// Same logical message: text and timestamp label match byte-for-byte.
    /// Image fields are ignored on purpose, they flicker while loading.
    pub fn same_observed(&self, other: &IncomingMessage) -> bool {
        self.text == other.text && self.rendered_timestamp == other.rendered_timestamp
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Raw reading of the newest partner bubble, before any dedup decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawIncoming {
    pub text: Option<String>,
    pub rendered_timestamp: Option<String>,
    /// Already resolved to an absolute locator by the surface.
    pub image_src: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: Option<String>,
    #[serde(rename = "send_star")]
    pub send_reaction: bool,
}

/// What the dispatcher actually does with an [`OutgoingMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery<'a> {
    Text(&'a str),
    Reaction,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            send_reaction: false,
        }
    }

    pub fn reaction() -> Self {
        Self {
            text: None,
            send_reaction: true,
        }
    }

    /// Exactly one of non-empty text or a reaction must be requested.
    pub fn delivery(&self) -> Result<Delivery<'_>, GeneratorError> {
        let text = self.text.as_deref().filter(|t| !t.trim().is_empty());
        match (text, self.send_reaction) {
            (Some(text), false) => Ok(Delivery::Text(text)),
            (None, true) => Ok(Delivery::Reaction),
            (Some(_), true) => Err(GeneratorError::InvalidReply(
                "reply has both text and a reaction".to_string(),
            )),
            (None, false) => Err(GeneratorError::InvalidReply(
                "reply has neither text nor a reaction".to_string(),
            )),
        }
    }
}

/// Static description of one party. Built once per run and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl Profile {
    /// Parses the "Name Age" heading shown on a character page.
    pub fn from_heading(heading: &str, bio: Option<String>) -> Self {
        let mut parts = heading.split_whitespace();
        let name = parts.next().map(str::to_string);
        let age = parts.next().and_then(|age| age.parse().ok());
        Self {
            name,
            age,
            bio: bio.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={} age={} bio={}",
            self.name.as_deref().unwrap_or("unknown"),
            self.age
                .map(|a| a.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            self.bio.as_deref().unwrap_or("none")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_observed_ignores_image_fields() {
        let a = IncomingMessage {
            text: Some("hey".into()),
            rendered_timestamp: Some("10:00".into()),
            has_image: false,
            image_reference: None,
        };
        let b = IncomingMessage {
            has_image: true,
            image_reference: Some("https://example.com/a.png".into()),
            ..a.clone()
        };
        assert!(a.same_observed(&b));

        let c = IncomingMessage {
            rendered_timestamp: Some("10:01".into()),
            ..a.clone()
        };
        assert!(!a.same_observed(&c));
    }

    #[test]
    fn delivery_enforces_exactly_one_of() {
        assert_eq!(
            OutgoingMessage::text("hi").delivery().unwrap(),
            Delivery::Text("hi")
        );
        assert_eq!(
            OutgoingMessage::reaction().delivery().unwrap(),
            Delivery::Reaction
        );

        let both = OutgoingMessage {
            text: Some("hi".into()),
            send_reaction: true,
        };
        assert!(both.delivery().is_err());

        let blank = OutgoingMessage {
            text: Some("   ".into()),
            send_reaction: false,
        };
        assert!(blank.delivery().is_err());

        // whitespace text alongside a reaction still counts as "no text"
        let star_with_blank = OutgoingMessage {
            text: Some("  ".into()),
            send_reaction: true,
        };
        assert_eq!(star_with_blank.delivery().unwrap(), Delivery::Reaction);
    }

    #[test]
    fn outgoing_uses_send_star_on_the_wire() {
        let parsed: OutgoingMessage =
            serde_json::from_str(r#"{"text": null, "send_star": true}"#).unwrap();
        assert_eq!(parsed, OutgoingMessage::reaction());
    }

    #[test]
    fn profile_from_heading() {
        let profile = Profile::from_heading("Anna 24", Some(" Likes hiking ".into()));
        assert_eq!(profile.name.as_deref(), Some("Anna"));
        assert_eq!(profile.age, Some(24));
        assert_eq!(profile.bio.as_deref(), Some("Likes hiking"));

        let no_age = Profile::from_heading("Anna", None);
        assert_eq!(no_age.age, None);
        assert_eq!(no_age.bio, None);
        assert_eq!(no_age.to_string(), "name=Anna age=unknown bio=none");
    }
}
