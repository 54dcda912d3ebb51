//! Scripted stand-ins for the chat page and the reply backend.

use crate::context::{ConversationContext, Role};
use crate::error::{GeneratorError, SurfaceError};
use crate::generator::{ReplyGenerator, ReplyRequest};
use crate::surface::ChatSurface;
use crate::types::{OutgoingMessage, RawIncoming};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceAction {
    Write(String),
    Submit,
    Reaction,
}

pub type Sample = Result<Option<RawIncoming>, SurfaceError>;

/// Plays back a fixed list of samples. Once the script runs out the page
/// reports itself as gone so a test can never hang.
#[derive(Default)]
pub struct FakeSurface {
    samples: Mutex<VecDeque<Sample>>,
    actions: Mutex<Vec<SurfaceAction>>,
    samples_taken: Mutex<usize>,
    fail_interactions: bool,
}

impl FakeSurface {
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            samples: Mutex::new(samples.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn failing_interactions() -> Self {
        Self {
            fail_interactions: true,
            ..Self::default()
        }
    }

    pub fn actions(&self) -> Vec<SurfaceAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn samples_taken(&self) -> usize {
        *self.samples_taken.lock().unwrap()
    }

    fn record(&self, action: SurfaceAction) -> Result<(), SurfaceError> {
        if self.fail_interactions {
            return Err(SurfaceError::Interaction(format!("{action:?} rejected")));
        }
        self.actions.lock().unwrap().push(action);
        Ok(())
    }
}

pub fn message(text: &str, time: &str) -> Sample {
    Ok(Some(RawIncoming {
        text: Some(text.to_string()),
        rendered_timestamp: Some(time.to_string()),
        image_src: None,
    }))
}

pub fn message_with_image(text: &str, time: &str, src: &str) -> Sample {
    Ok(Some(RawIncoming {
        text: Some(text.to_string()),
        rendered_timestamp: Some(time.to_string()),
        image_src: Some(src.to_string()),
    }))
}

pub fn blank() -> Sample {
    Ok(Some(RawIncoming::default()))
}

#[async_trait]
impl ChatSurface for FakeSurface {
    async fn render_current_incoming(&self) -> Result<Option<RawIncoming>, SurfaceError> {
        *self.samples_taken.lock().unwrap() += 1;
        self.samples
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SurfaceError::Gone("script exhausted".to_string())))
    }

    async fn write_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.record(SurfaceAction::Write(text.to_string()))
    }

    async fn submit_text(&self) -> Result<(), SurfaceError> {
        self.record(SurfaceAction::Submit)
    }

    async fn trigger_reaction(&self) -> Result<(), SurfaceError> {
        self.record(SurfaceAction::Reaction)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateCall {
    pub partner_text: String,
    pub has_image: bool,
    pub history_len: usize,
}

/// Returns canned replies in order and keeps the context the way a real
/// backend does.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<OutgoingMessage, GeneratorError>>>,
    calls: Mutex<Vec<GenerateCall>>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Result<OutgoingMessage, GeneratorError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        context: &mut ConversationContext,
        request: ReplyRequest<'_>,
    ) -> Result<OutgoingMessage, GeneratorError> {
        self.calls.lock().unwrap().push(GenerateCall {
            partner_text: request.partner_text.to_string(),
            has_image: request.has_image,
            history_len: context.len(),
        });
        context.push(Role::Partner, request.partner_text);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(OutgoingMessage::text("ok")))?;
        context.push(Role::User, reply.text.clone().unwrap_or_default());
        Ok(reply)
    }
}
