//! Error types for the conversation loop

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the remote chat surface. A message that is simply not
/// rendered yet is not an error and never shows up here.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The page or browser session is gone
    #[error("chat surface unreachable: {0}")]
    Gone(String),

    /// A click, keystroke or navigation failed
    #[error("surface interaction failed: {0}")]
    Interaction(String),

    /// A required element never appeared
    #[error("element `{selector}` did not appear within {waited:?}")]
    ElementMissing { selector: String, waited: Duration },
}

impl From<chromiumoxide::error::CdpError> for SurfaceError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        SurfaceError::Gone(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The reply breaks the text-xor-reaction rule
    #[error("Invalid reply: {0}")]
    InvalidReply(String),
}

/// Request urls can carry credentials, so they never reach error messages.
impl From<reqwest::Error> for GeneratorError {
    fn from(e: reqwest::Error) -> Self {
        GeneratorError::Http(e.without_url())
    }
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to write transcript {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode transcript: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fatal errors that end a conversation run
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("no new partner message within {0:?}")]
    NoNewMessage(Duration),

    #[error("run cancelled")]
    Cancelled,
}
