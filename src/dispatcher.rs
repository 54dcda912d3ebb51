use crate::error::Result;
use crate::surface::ChatSurface;
use crate::transcript::{TranscriptEntry, TranscriptStore};
use crate::types::{Delivery, OutgoingMessage};
use std::sync::Arc;
use std::time::Duration;

/// Sends the user's messages through the chat page.
pub struct MessageDispatcher {
    surface: Arc<dyn ChatSurface>,
    transcript: TranscriptStore,
    settle: Duration,
}

impl MessageDispatcher {
    pub fn new(surface: Arc<dyn ChatSurface>, transcript: TranscriptStore, settle: Duration) -> Self {
        Self {
            surface,
            transcript,
            settle,
        }
    }

    pub async fn dispatch(&self, message: &OutgoingMessage) -> Result<()> {
        match message.delivery()? {
            Delivery::Reaction => {
                self.surface.trigger_reaction().await?;
                tokio::time::sleep(self.settle).await;
                self.transcript.append(TranscriptEntry::user(None, true))?;
                tracing::info!("user reaction sent");
            }
            Delivery::Text(text) => {
                self.surface.write_text(text).await?;
                tokio::time::sleep(self.settle).await;
                self.surface.submit_text().await?;
                self.transcript
                    .append(TranscriptEntry::user(Some(text.to_string()), false))?;
                tracing::info!(text, "user message sent");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, GeneratorError, SurfaceError};
    use crate::testing::{FakeSurface, SurfaceAction};
    use crate::transcript::Origin;

    fn dispatcher(surface: Arc<FakeSurface>, transcript: TranscriptStore) -> MessageDispatcher {
        MessageDispatcher::new(surface, transcript, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn text_is_written_then_submitted() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = TranscriptStore::create(dir.path().join("logs.json")).unwrap();
        let surface = Arc::new(FakeSurface::default());

        dispatcher(surface.clone(), transcript.clone())
            .dispatch(&OutgoingMessage::text("Hi"))
            .await
            .unwrap();

        assert_eq!(
            surface.actions(),
            vec![SurfaceAction::Write("Hi".into()), SurfaceAction::Submit]
        );
        let entries = transcript.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].origin, Origin::User);
        assert_eq!(entries[0].text.as_deref(), Some("Hi"));
        assert_eq!(entries[0].reaction, Some(false));
    }

    #[tokio::test]
    async fn reaction_records_entry_without_text() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = TranscriptStore::create(dir.path().join("logs.json")).unwrap();
        let surface = Arc::new(FakeSurface::default());

        dispatcher(surface.clone(), transcript.clone())
            .dispatch(&OutgoingMessage::reaction())
            .await
            .unwrap();

        assert_eq!(surface.actions(), vec![SurfaceAction::Reaction]);
        let entries = transcript.entries();
        assert_eq!(entries[0].text, None);
        assert_eq!(entries[0].reaction, Some(true));
    }

    #[tokio::test]
    async fn invalid_message_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = TranscriptStore::create(dir.path().join("logs.json")).unwrap();
        let surface = Arc::new(FakeSurface::default());
        let bad = OutgoingMessage {
            text: None,
            send_reaction: false,
        };

        let err = dispatcher(surface.clone(), transcript.clone())
            .dispatch(&bad)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Generator(GeneratorError::InvalidReply(_))));
        assert!(surface.actions().is_empty());
        assert!(transcript.entries().is_empty());
    }

    #[tokio::test]
    async fn surface_failure_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = TranscriptStore::create(dir.path().join("logs.json")).unwrap();
        let surface = Arc::new(FakeSurface::failing_interactions());

        let err = dispatcher(surface, transcript.clone())
            .dispatch(&OutgoingMessage::text("Hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Surface(SurfaceError::Interaction(_))));
        assert!(transcript.entries().is_empty());
    }
}
