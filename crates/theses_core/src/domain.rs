//! crates/theses_core/src/domain.rs
//!
//! Defines the core data structures shared by the session manager and the
//! payment confirmation poller. The serde shapes match the REST API payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//=========================================================================================
// Users
//=========================================================================================

/// The role a user account was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Visitor,
    Author,
    University,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Visitor => "visitor",
            UserRole::Author => "author",
            UserRole::University => "university",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical user profile as returned by `GET /api/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimed_theses: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Fields submitted to `POST /api/auth/register`. Contains the plaintext password.
#[derive(Clone, Serialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

// Keep the password out of logs.
impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("institution", &self.institution)
            .field("country", &self.country)
            .field("orcid", &self.orcid)
            .finish_non_exhaustive()
    }
}

/// A partial profile for `PUT /api/auth/me`. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ProfileUpdate::default()
    }
}

//=========================================================================================
// Credentials & Session
//=========================================================================================

/// Body of a successful `POST /api/auth/login`.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Request options derived from the current session, built fresh for every call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    bearer: Option<String>,
}

impl Credentials {
    /// Credentials for an unauthenticated request.
    pub fn anonymous() -> Self {
        Self { bearer: None }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// The value of the `Authorization` header, if any.
    pub fn authorization(&self) -> Option<String> {
        self.bearer.as_ref().map(|t| format!("Bearer {}", t))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.bearer.is_some() { "Bearer <redacted>" } else { "anonymous" };
        f.write_str(shown)
    }
}

/// A read-only view of the session state at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub loading: bool,
}

//=========================================================================================
// Claims & Reports
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Ownership,
    Correction,
    Supervisor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Copyright,
    MetadataError,
    InappropriateContent,
    Duplicate,
    Other,
}

/// Body of `POST /api/auth/claim-thesis`.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimRequest {
    pub thesis_id: String,
    pub claim_type: ClaimType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST /api/auth/report-thesis`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    pub thesis_id: String,
    pub report_type: ReportType,
    pub description: String,
}

/// The server's acknowledgement of a claim or report submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Acknowledgement {
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// A thesis claim as stored on the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThesisClaim {
    #[serde(default)]
    pub id: Option<String>,
    pub thesis_id: String,
    pub user_id: String,
    pub claim_type: String,
    #[serde(default)]
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// The decision an admin takes on a pending claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimReview {
    Approve,
    Reject,
}

impl ClaimReview {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimReview::Approve => "approve",
            ClaimReview::Reject => "reject",
        }
    }
}

//=========================================================================================
// Checkout
//=========================================================================================

/// Body of `GET /api/checkout/status/{session_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutStatus {
    pub status: String,
    pub payment_status: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub thesis_id: Option<String>,
}

impl CheckoutStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn is_expired(&self) -> bool {
        self.status == "expired"
    }
}

/// Body of `POST /api/checkout/session`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub url: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Identifiers carried by the purchase confirmation page's query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationParams {
    pub session_id: String,
    pub thesis_id: String,
}

impl ConfirmationParams {
    /// Builds the params from decoded query pairs.
    ///
    /// Returns `None` unless both `session_id` and `thesis_id` are present and non-empty.
    pub fn from_pairs<I, K, V>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut session_id = None;
        let mut thesis_id = None;
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "session_id" => session_id = Some(value.to_string()),
                "thesis_id" => thesis_id = Some(value.to_string()),
                _ => {}
            }
        }
        Some(Self {
            session_id: session_id?,
            thesis_id: thesis_id?,
        })
    }
}

/// The state of a payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Checking,
    Success,
    Expired,
    Timeout,
    Error,
}

impl ConfirmationStatus {
    /// Terminal states are sticky: no poll follows them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationStatus::Checking)
    }

    /// The user-facing text for this state.
    pub fn message(&self) -> &'static str {
        match self {
            ConfirmationStatus::Checking => "Checking your payment...",
            ConfirmationStatus::Success => "Payment confirmed. You now have access to the thesis.",
            ConfirmationStatus::Expired => "The payment session has expired. Please try again.",
            ConfirmationStatus::Timeout => {
                "Payment confirmation is taking longer than expected. Please check your email for confirmation."
            }
            ConfirmationStatus::Error => "We could not verify your payment. Please contact support.",
        }
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfirmationStatus::Checking => "checking",
            ConfirmationStatus::Success => "success",
            ConfirmationStatus::Expired => "expired",
            ConfirmationStatus::Timeout => "timeout",
            ConfirmationStatus::Error => "error",
        };
        f.write_str(name)
    }
}
