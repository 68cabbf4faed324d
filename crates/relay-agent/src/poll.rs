//! Bounded, cancellable polling of a run until it settles.

use std::time::Duration;

use relay_ai::{AssistantsApi, Run, RunId, RunStatus, ThreadId};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::events::InteractionEvent;

/// Polling configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the second poll
    pub initial_interval: Duration,
    /// Upper bound on the delay between polls
    pub max_interval: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Give up after this long
    pub timeout: Duration,
    /// Consecutive retryable errors tolerated before failing
    pub max_transient_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            backoff_multiplier: 1.5,
            timeout: Duration::from_secs(300),
            max_transient_errors: 3,
        }
    }
}

impl PollConfig {
    /// Calculate the delay after a given poll (0-indexed)
    pub fn interval_for_attempt(&self, attempt: u32) -> Duration {
        let secs =
            self.initial_interval.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(secs.min(self.max_interval.as_secs_f64()))
    }
}

/// Poll a run until it completes.
///
/// Returns the completed run. Any other settled status (including
/// `requires_action`, which this client never satisfies) is a
/// [`Error::RunFailed`]. The wait is bounded by `config.timeout` and aborts
/// promptly when `cancel` fires.
pub async fn wait_for_run(
    api: &dyn AssistantsApi,
    thread: &ThreadId,
    run_id: &RunId,
    config: &PollConfig,
    cancel: &CancellationToken,
    events: Option<&broadcast::Sender<InteractionEvent>>,
) -> Result<Run> {
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut attempt = 0u32;
    let mut transient = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let polled = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            polled = api.get_run(thread, run_id) => polled,
        };
        attempt += 1;

        match polled {
            Ok(run) => {
                transient = 0;
                tracing::debug!(run = %run_id, status = %run.status, attempt, "polled run");
                if let Some(tx) = events {
                    let _ = tx.send(InteractionEvent::RunStatus {
                        run_id: run_id.clone(),
                        status: run.status,
                        attempt,
                    });
                }

                match run.status {
                    RunStatus::Completed => return Ok(run),
                    status if status.is_pending() => {}
                    status => {
                        return Err(Error::RunFailed {
                            run_id: run_id.clone(),
                            status,
                            reason: run.failure_reason(),
                        });
                    }
                }
            }
            Err(e) if e.is_retryable() && transient < config.max_transient_errors => {
                transient += 1;
                tracing::warn!(
                    "Polling run {} failed ({}/{}): {}",
                    run_id,
                    transient,
                    config.max_transient_errors,
                    e
                );
            }
            Err(e) => return Err(e.into()),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::PollTimeout {
                run_id: run_id.clone(),
                waited: now - started,
            });
        }

        let delay = config
            .interval_for_attempt(attempt - 1)
            .min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
