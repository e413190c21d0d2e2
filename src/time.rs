//! Time abstraction for testability.
//!
//! This module provides a [`Sleeper`] trait that lets polling loops wait
//! between updates with the real tokio timer in production while tests
//! inject [`InstantSleeper`] and never block.

use std::future::Future;
use std::time::Duration;

/// Abstraction over async sleeping.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use urlclient::time::{InstantSleeper, Sleeper};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// InstantSleeper.sleep(Duration::from_secs(3600)).await;
/// # }
/// ```
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production sleeper backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {}
}
