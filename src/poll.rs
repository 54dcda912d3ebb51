use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Wait before every sample, including the first.
    pub interval: Duration,
    /// Give up after this much time. `None` polls until cancelled.
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error("gave up after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(E),
}

/// Calls `sample` every `policy.interval` until it yields a value, fails,
/// the deadline passes or `cancel` fires.
pub async fn poll_until<T, E, F, Fut>(
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut sample: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(policy.interval) => {}
        }

        if let Some(value) = sample().await.map_err(PollError::Failed)? {
            return Ok(value);
        }

        if let Some(deadline) = policy.deadline {
            if started.elapsed() >= deadline {
                return Err(PollError::TimedOut(deadline));
            }
        }
    }
}
