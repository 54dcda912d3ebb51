use crate::error::SurfaceError;
use crate::types::RawIncoming;
use async_trait::async_trait;

/// The remote chat page, as far as the conversation loop cares.
///
/// All calls must be safe to repeat. `Ok(None)` from
/// [`ChatSurface::render_current_incoming`] means "nothing rendered yet";
/// only a surface that is truly gone should return [`SurfaceError::Gone`].
#[async_trait]
pub trait ChatSurface: Send + Sync {
    async fn render_current_incoming(&self) -> Result<Option<RawIncoming>, SurfaceError>;

    async fn write_text(&self, text: &str) -> Result<(), SurfaceError>;

    async fn submit_text(&self) -> Result<(), SurfaceError>;

    async fn trigger_reaction(&self) -> Result<(), SurfaceError>;
}
