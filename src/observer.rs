use crate::error::{Error, Result};
use crate::poll::{PollError, PollPolicy, poll_until};
use crate::surface::ChatSurface;
use crate::transcript::{TranscriptEntry, TranscriptStore};
use crate::types::{IncomingMessage, RawIncoming};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Watches the chat page for the partner's next message.
pub struct MessageObserver {
    surface: Arc<dyn ChatSurface>,
    transcript: TranscriptStore,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl MessageObserver {
    pub fn new(
        surface: Arc<dyn ChatSurface>,
        transcript: TranscriptStore,
        policy: PollPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            surface,
            transcript,
            policy,
            cancel,
        }
    }

    /// Waits until a message different from `previous` is rendered, records
    /// it in the transcript and returns it.
    pub async fn observe(&self, previous: &IncomingMessage) -> Result<IncomingMessage> {
        let message = poll_until(self.policy, &self.cancel, move || self.sample(previous))
            .await
            .map_err(|err| match err {
                PollError::Failed(err) => err,
                PollError::Cancelled => Error::Cancelled,
                PollError::TimedOut(waited) => Error::NoNewMessage(waited),
            })?;

        self.transcript.append(TranscriptEntry::partner(
            message.text.clone(),
            message.image_reference.clone(),
        ))?;
        tracing::info!(
            text = message.text_or_empty(),
            has_image = message.has_image,
            "partner message accepted"
        );
        Ok(message)
    }

    async fn sample(&self, previous: &IncomingMessage) -> Result<Option<IncomingMessage>> {
        let raw = self.surface.render_current_incoming().await?;
        let candidate = raw.map(|raw| candidate_from(raw, previous));
        Ok(candidate.filter(|candidate| {
            let fresh = is_new_message(candidate, previous);
            if !fresh {
                tracing::trace!("no new partner message yet");
            }
            fresh
        }))
    }
}

/// Builds a candidate from a raw reading. The image only counts when its
/// reference differs from the one on the previously accepted message.
pub fn candidate_from(raw: RawIncoming, previous: &IncomingMessage) -> IncomingMessage {
    let new_image = raw
        .image_src
        .filter(|src| previous.image_reference.as_deref() != Some(src.as_str()));
    IncomingMessage {
        text: raw.text,
        has_image: new_image.is_some(),
        image_reference: new_image,
        rendered_timestamp: raw.rendered_timestamp,
    }
}

pub fn is_new_message(candidate: &IncomingMessage, previous: &IncomingMessage) -> bool {
    let has_text = candidate.text.as_deref().is_some_and(|t| !t.is_empty());
    has_text && !candidate.same_observed(previous)
}
