//! App-validation polling loop.
//!
//! Decoupled validations (the user approves the login inside a mobile app)
//! are resolved by polling a status endpoint at a fixed interval until the
//! site reports a terminal status. The loop always ends in one of exactly
//! three ways: approved, a terminal rejection, or the expiry error when the
//! wall-clock budget (or the optional check cap) runs out. It never returns
//! "not yet" silently.

use std::future::Future;

use tokio::time::Instant;

use crate::config::PollingConfig;
use crate::error::{Error, Result};

/// Remote status of a pending app validation, as classified by the flow's
/// status-check request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The user has not answered yet; keep polling.
    Pending,
    /// The user approved the login.
    Approved,
    /// The user explicitly refused the login.
    Cancelled,
    /// The site reports the validation window is over.
    Expired,
}

/// Poll `check` until the validation reaches a terminal status.
///
/// `check` issues one status request and classifies the answer; any error it
/// returns propagates immediately. `Cancelled` maps to
/// [`Error::ValidationCancelled`], `Expired` to [`Error::ValidationExpired`],
/// and exhausting the budget without a terminal status is itself an expiry.
pub async fn poll_app_validation<C, Fut>(config: &PollingConfig, mut check: C) -> Result<()>
where
    C: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<PollStatus>> + Send,
{
    let deadline = Instant::now() + config.timeout;
    let mut checks: u32 = 0;

    loop {
        checks += 1;
        match check().await? {
            PollStatus::Approved => {
                tracing::info!(checks, "app validation approved");
                return Ok(());
            }
            PollStatus::Cancelled => {
                tracing::info!(checks, "app validation cancelled by the user");
                return Err(Error::ValidationCancelled);
            }
            PollStatus::Expired => {
                tracing::info!(checks, "app validation reported expired by the site");
                return Err(Error::ValidationExpired);
            }
            PollStatus::Pending => {}
        }

        if let Some(max_checks) = config.max_checks {
            if checks >= max_checks {
                tracing::warn!(checks, "app validation still pending after check cap");
                return Err(Error::ValidationExpired);
            }
        }
        if Instant::now() + config.interval > deadline {
            tracing::warn!(checks, timeout = ?config.timeout, "app validation timed out");
            return Err(Error::ValidationExpired);
        }

        tracing::debug!(checks, interval = ?config.interval, "app validation still pending");
        tokio::time::sleep(config.interval).await;
    }
}
