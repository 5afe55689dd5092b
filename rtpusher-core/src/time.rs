//! Time provider abstraction for paced replay.
//!
//! The scenario engine suspends at exactly two points: the bounded wait for
//! expected responses and the pacing sleep between entries. Both go through
//! [`TimeProvider`] so tests can observe pacing without waiting for it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Failure of a bounded wait.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The deadline passed before the future completed.
    #[error("deadline elapsed")]
    Elapsed,
}

/// Clock used by the engine for pacing and response deadlines.
///
/// Single flow of control, so no `Send` bounds are required on the futures.
#[async_trait(?Send)]
pub trait TimeProvider: Clone {
    /// Suspend the caller for the specified duration.
    async fn sleep(&self, duration: Duration);

    /// Current wall-clock time in UTC.
    ///
    /// Used as the last-resort timestamp for positioning sentences that
    /// carry neither an absolute timestamp nor a resolvable duration.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Drive `future` until it completes or `duration` passes.
    ///
    /// The future is dropped on expiry, so it must be cancel safe.
    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, TimeError>
    where
        F: std::future::Future<Output = T>;
}

/// Clock backed by the Tokio timer and the system wall clock.
#[derive(Debug, Clone, Default)]
pub struct TokioTimeProvider;

impl TokioTimeProvider {
    /// Create the provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl TimeProvider for TokioTimeProvider {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, TimeError>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(duration, future)
            .await
            .map_err(|_| TimeError::Elapsed)
    }
}
