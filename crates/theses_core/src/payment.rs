//! crates/theses_core/src/payment.rs
//!
//! The payment confirmation poller. After a checkout the payment processor
//! redirects back with a `session_id`; this module asks the API for that
//! session's state until it is paid, expired, fails, or the attempt cap is hit.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ConfirmationParams, ConfirmationStatus};
use crate::ports::{CheckoutApi, Sleeper};

/// Default number of status queries before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default delay between two status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// How many times to poll, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollerConfig {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }
}

/// Where a confirmation run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: ConfirmationStatus,
    /// Number of status queries issued.
    pub attempts: u32,
}

/// Confirms a single checkout session.
///
/// Polls are strictly sequential: the next one is scheduled only after the
/// previous response (or failure) has been observed.
pub struct PaymentConfirmation {
    api: Arc<dyn CheckoutApi>,
    sleeper: Arc<dyn Sleeper>,
    config: PollerConfig,
    params: Option<ConfirmationParams>,
    attempts: u32,
    status: watch::Sender<ConfirmationStatus>,
}

impl PaymentConfirmation {
    /// Without both identifiers the confirmation starts, and stays, in `Error`.
    pub fn new(
        api: Arc<dyn CheckoutApi>,
        sleeper: Arc<dyn Sleeper>,
        config: PollerConfig,
        params: Option<ConfirmationParams>,
    ) -> Self {
        let initial = if params.is_some() {
            ConfirmationStatus::Checking
        } else {
            warn!("Payment confirmation opened without session_id and thesis_id");
            ConfirmationStatus::Error
        };
        let (status, _) = watch::channel(initial);

        Self {
            api,
            sleeper,
            config,
            params,
            attempts: 0,
            status,
        }
    }

    pub fn status(&self) -> ConfirmationStatus {
        *self.status.borrow()
    }

    /// Observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConfirmationStatus> {
        self.status.subscribe()
    }

    /// Polls until a terminal state is reached or `cancel` fires.
    ///
    /// On cancellation the status is left at `Checking` and a response that is
    /// still in flight is dropped without being applied.
    pub async fn run(&mut self, cancel: &CancellationToken) -> PollOutcome {
        let Some(params) = self.params.clone() else {
            return self.outcome();
        };

        while !self.status().is_terminal() {
            self.attempts += 1;
            let attempt = self.attempts;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt, "Payment confirmation cancelled while waiting for a response");
                    return self.outcome();
                }
                response = self.api.checkout_status(&params.session_id) => response,
            };

            let next = match response {
                Ok(checkout) if checkout.is_paid() => ConfirmationStatus::Success,
                Ok(checkout) if checkout.is_expired() => ConfirmationStatus::Expired,
                Ok(_) if attempt >= self.config.max_attempts => ConfirmationStatus::Timeout,
                Ok(checkout) => {
                    debug!(
                        attempt,
                        payment_status = %checkout.payment_status,
                        "Payment still pending"
                    );
                    ConfirmationStatus::Checking
                }
                Err(e) => {
                    warn!(attempt, "Checking payment status failed: {}", e);
                    ConfirmationStatus::Error
                }
            };

            if next.is_terminal() {
                self.status.send_replace(next);
                info!(
                    session_id = %params.session_id,
                    thesis_id = %params.thesis_id,
                    status = %next,
                    attempts = attempt,
                    "Payment confirmation finished"
                );
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt, "Payment confirmation cancelled before the next poll");
                    return self.outcome();
                }
                _ = self.sleeper.sleep(self.config.interval) => {}
            }
        }

        self.outcome()
    }

    fn outcome(&self) -> PollOutcome {
        PollOutcome {
            status: self.status(),
            attempts: self.attempts,
        }
    }
}
