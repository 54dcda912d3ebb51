use crate::context::ConversationContext;
use crate::error::GeneratorError;
use crate::types::{OutgoingMessage, Profile};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy)]
pub struct ReplyRequest<'a> {
    pub partner_text: &'a str,
    pub user_profile: &'a Profile,
    pub partner_profile: &'a Profile,
    pub has_image: bool,
}

/// Produces the next user-side message.
///
/// Implementations append the partner text and their own reply to
/// `context` so the next call sees the whole history.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &mut ConversationContext,
        request: ReplyRequest<'_>,
    ) -> Result<OutgoingMessage, GeneratorError>;
}
