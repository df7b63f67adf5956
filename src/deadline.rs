// SPDX-License-Identifier: MIT
//! Deadline race for bounding async operations.
//!
//! Provides [`with_deadline`] — races a future against a timer and yields a
//! distinct [`DeadlineExceeded`] outcome when the timer wins. Every bounded
//! fetch in this crate goes through this helper; timeouts are never handled
//! per call site.

use std::future::Future;
use std::time::Duration;

/// The operation did not settle within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation exceeded its {limit_ms}ms deadline")]
pub struct DeadlineExceeded {
    /// The budget that was exhausted, in milliseconds.
    pub limit_ms: u64,
}

/// Race `fut` against `limit`.
///
/// Returns the future's output if it settles first, or
/// `Err(DeadlineExceeded)` if the timer wins. The losing future is dropped
/// where it stands; callers that must survive a late-settling operation tag
/// attempts with a generation counter (see the reconciler).
pub async fn with_deadline<F, T>(limit: Duration, fut: F) -> Result<T, DeadlineExceeded>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => Ok(value),
        Err(_) => Err(DeadlineExceeded {
            limit_ms: limit.as_millis() as u64,
        }),
    }
}
