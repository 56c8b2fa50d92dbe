//! crates/theses_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! The HTTP API, the persisted token slot and the timer all sit behind these
//! traits so the session manager and the poller can be driven by mocks in tests.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{
    AccessToken, Acknowledgement, CheckoutSession, CheckoutStatus, ClaimRequest, ClaimReview,
    Credentials, NewUser, ProfileUpdate, ReportRequest, ThesisClaim, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The server refused the credentials (HTTP 401 or 403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The server answered with an error status and a `detail` payload.
    #[error("Request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The human-readable reason to show a user, taken from the API payload when there is one.
    pub fn reason(&self) -> String {
        match self {
            PortError::Unauthorized(detail) | PortError::Rejected { detail, .. } => detail.clone(),
            PortError::Transport(_) => "Unable to reach the server".to_string(),
            other => other.to_string(),
        }
    }

    /// True when the server explicitly rejected the credentials.
    pub fn is_authorization(&self) -> bool {
        matches!(self, PortError::Unauthorized(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthApi: Send + Sync {
    // --- Account ---
    async fn login(&self, email: &str, password: &str) -> PortResult<AccessToken>;

    async fn fetch_profile(&self, credentials: &Credentials) -> PortResult<UserProfile>;

    async fn register(&self, user: &NewUser) -> PortResult<UserProfile>;

    async fn update_profile(
        &self,
        credentials: &Credentials,
        update: &ProfileUpdate,
    ) -> PortResult<UserProfile>;

    // --- Thesis Claims & Reports ---
    async fn claim_thesis(
        &self,
        credentials: &Credentials,
        claim: &ClaimRequest,
    ) -> PortResult<Acknowledgement>;

    async fn report_thesis(
        &self,
        credentials: &Credentials,
        report: &ReportRequest,
    ) -> PortResult<Acknowledgement>;

    async fn my_claims(&self, credentials: &Credentials) -> PortResult<Vec<ThesisClaim>>;

    // --- Administration ---
    async fn list_users(
        &self,
        credentials: &Credentials,
        skip: u32,
        limit: u32,
    ) -> PortResult<Vec<UserProfile>>;

    async fn list_claims(
        &self,
        credentials: &Credentials,
        status_filter: Option<&str>,
    ) -> PortResult<Vec<ThesisClaim>>;

    async fn review_claim(
        &self,
        credentials: &Credentials,
        claim_id: &str,
        review: ClaimReview,
    ) -> PortResult<Acknowledgement>;
}

#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// Reads the payment state of a checkout session.
    async fn checkout_status(&self, session_id: &str) -> PortResult<CheckoutStatus>;

    /// Opens a checkout session for a paywalled thesis.
    async fn create_checkout(&self, thesis_id: &str, origin_url: &str)
        -> PortResult<CheckoutSession>;
}

/// The single persisted slot holding the bearer token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> PortResult<Option<String>>;

    /// Replaces any previously stored token.
    async fn save(&self, token: &str) -> PortResult<()>;

    async fn clear(&self) -> PortResult<()>;
}

/// The timer used between polls.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}
