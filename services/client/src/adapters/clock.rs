//! services/client/src/adapters/clock.rs
//!
//! Implements the `Sleeper` port on top of the tokio timer.

use async_trait::async_trait;
use std::time::Duration;
use theses_core::ports::Sleeper;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
