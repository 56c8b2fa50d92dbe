//! crates/theses_core/src/session.rs
//!
//! The session manager: owns the bearer token lifecycle, caches the current
//! user profile, and mediates every credentialed call to the auth API.
//!
//! There is no global instance. The binary creates one `SessionManager` at
//! startup and passes it (usually as `Arc<SessionManager>`) to whatever needs it.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{
    Acknowledgement, ClaimRequest, ClaimReview, ClaimType, Credentials, NewUser, ProfileUpdate,
    ReportRequest, ReportType, SessionSnapshot, ThesisClaim, UserProfile, UserRole,
};
use crate::ports::{AuthApi, PortError, TokenStore};

//=========================================================================================
// Session Errors
//=========================================================================================

/// The failure result of a session operation. `Display` is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The server refused the request; carries the reason it gave.
    #[error("{0}")]
    Rejected(String),
    #[error("You must be logged in to do this")]
    NotAuthenticated,
    #[error("Admin access required")]
    Forbidden,
    /// The server could not be reached.
    #[error("{0}")]
    Unavailable(String),
}

impl SessionError {
    fn from_port(err: PortError, fallback: &str) -> Self {
        let reason = err.reason();
        let reason = if reason.trim().is_empty() {
            fallback.to_string()
        } else {
            reason
        };
        match err {
            PortError::Transport(_) => SessionError::Unavailable(reason),
            _ => SessionError::Rejected(reason),
        }
    }
}

//=========================================================================================
// Session State
//=========================================================================================

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<UserProfile>,
    loading: bool,
}

/// The process-wide session handle.
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// Creates the manager from the persisted token, if any.
    ///
    /// A restored token is unconfirmed: `is_loading()` stays true until
    /// [`SessionManager::hydrate`] has validated it.
    pub async fn restore(api: Arc<dyn AuthApi>, store: Arc<dyn TokenStore>) -> Self {
        let token = match store.load().await {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!("Failed to read the persisted token: {}", e);
                None
            }
        };
        let loading = token.is_some();
        debug!(restored = loading, "Session manager created");

        Self {
            api,
            store,
            state: RwLock::new(SessionState {
                token,
                user: None,
                loading,
            }),
        }
    }

    /// Validates the restored token by fetching the current profile.
    ///
    /// An authorization rejection logs the session out silently. A transport
    /// failure keeps the token so a later call can retry.
    pub async fn hydrate(&self) {
        let credentials = self.credentials().await;
        let Some(token) = credentials.token().map(str::to_string) else {
            self.state.write().await.loading = false;
            return;
        };

        match self.api.fetch_profile(&credentials).await {
            Ok(user) => {
                let mut state = self.state.write().await;
                if state.token.as_deref() == Some(token.as_str()) {
                    info!(user_id = %user.id, "Session restored");
                    state.user = Some(user);
                }
                state.loading = false;
            }
            Err(e) if e.is_authorization() => {
                info!("Persisted token was rejected, logging out");
                let cleared = {
                    let mut state = self.state.write().await;
                    let unchanged = state.token.as_deref() == Some(token.as_str());
                    if unchanged {
                        state.token = None;
                        state.user = None;
                    }
                    state.loading = false;
                    unchanged
                };
                if cleared {
                    self.forget_persisted_token().await;
                }
            }
            Err(e) => {
                warn!("Could not validate the persisted token, keeping it: {}", e);
                self.state.write().await.loading = false;
            }
        }
    }

    /// Builds the request options for the next call from the current token.
    pub async fn credentials(&self) -> Credentials {
        match &self.state.read().await.token {
            Some(token) => Credentials::bearer(token.clone()),
            None => Credentials::anonymous(),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            token: state.token.clone(),
            user: state.user.clone(),
            loading: state.loading,
        }
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.state.read().await.user.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.read().await;
        state.token.is_some() && state.user.is_some()
    }

    //=====================================================================================
    // Account Operations
    //=====================================================================================

    /// Logs in and caches the user's profile.
    ///
    /// Token and profile are committed together, only once both calls have
    /// succeeded. On failure the previous session is left as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, SessionError> {
        let access = self
            .api
            .login(email, password)
            .await
            .map_err(|e| SessionError::from_port(e, "Login failed"))?;

        let credentials = Credentials::bearer(access.access_token.clone());
        let user = self
            .api
            .fetch_profile(&credentials)
            .await
            .map_err(|e| SessionError::from_port(e, "Login failed"))?;

        if let Err(e) = self.store.save(&access.access_token).await {
            warn!("Failed to persist the session token: {}", e);
        }

        let mut state = self.state.write().await;
        state.token = Some(access.access_token);
        state.user = Some(user.clone());
        state.loading = false;
        info!(user_id = %user.id, role = %user.role, "Logged in");

        Ok(user)
    }

    /// Creates an account. The caller is not logged in by this.
    pub async fn register(&self, user: &NewUser) -> Result<UserProfile, SessionError> {
        let created = self
            .api
            .register(user)
            .await
            .map_err(|e| SessionError::from_port(e, "Registration failed"))?;
        info!(user_id = %created.id, role = %created.role, "Account registered");
        Ok(created)
    }

    /// Clears the session locally. Calling it again is a no-op.
    pub async fn logout(&self) {
        {
            let mut state = self.state.write().await;
            state.token = None;
            state.user = None;
            state.loading = false;
        }
        self.forget_persisted_token().await;
        info!("Logged out");
    }

    /// Sends the changed profile fields and caches the server's answer.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, SessionError> {
        let credentials = self.require_credentials().await?;
        let user = self
            .api
            .update_profile(&credentials, update)
            .await
            .map_err(|e| SessionError::from_port(e, "Profile update failed"))?;

        // A logout that raced this call wins: never resurrect a cleared session.
        let mut state = self.state.write().await;
        if state.token.as_deref() == credentials.token() {
            state.user = Some(user.clone());
        }
        Ok(user)
    }

    //=====================================================================================
    // Thesis Claims & Reports
    //=====================================================================================

    pub async fn claim_thesis(
        &self,
        thesis_id: &str,
        claim_type: ClaimType,
        message: Option<String>,
    ) -> Result<Acknowledgement, SessionError> {
        let credentials = self.require_credentials().await?;
        let claim = ClaimRequest {
            thesis_id: thesis_id.to_string(),
            claim_type,
            message: message.filter(|m| !m.trim().is_empty()),
        };
        let ack = self
            .api
            .claim_thesis(&credentials, &claim)
            .await
            .map_err(|e| SessionError::from_port(e, "Claim submission failed"))?;
        info!(thesis_id, ?claim_type, "Thesis claim submitted");
        Ok(ack)
    }

    /// Reports a thesis. Works without a session; the token is attached when there is one.
    pub async fn report_thesis(
        &self,
        thesis_id: &str,
        report_type: ReportType,
        description: &str,
    ) -> Result<Acknowledgement, SessionError> {
        let credentials = self.credentials().await;
        let report = ReportRequest {
            thesis_id: thesis_id.to_string(),
            report_type,
            description: description.to_string(),
        };
        let ack = self
            .api
            .report_thesis(&credentials, &report)
            .await
            .map_err(|e| SessionError::from_port(e, "Report submission failed"))?;
        info!(thesis_id, ?report_type, "Thesis report submitted");
        Ok(ack)
    }

    pub async fn my_claims(&self) -> Result<Vec<ThesisClaim>, SessionError> {
        let credentials = self.require_credentials().await?;
        self.api
            .my_claims(&credentials)
            .await
            .map_err(|e| SessionError::from_port(e, "Failed to get claims"))
    }

    //=====================================================================================
    // Administration
    //=====================================================================================

    pub async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<UserProfile>, SessionError> {
        let credentials = self.require_admin().await?;
        self.api
            .list_users(&credentials, skip, limit)
            .await
            .map_err(|e| SessionError::from_port(e, "Failed to get users"))
    }

    pub async fn list_claims(
        &self,
        status_filter: Option<&str>,
    ) -> Result<Vec<ThesisClaim>, SessionError> {
        let credentials = self.require_admin().await?;
        self.api
            .list_claims(&credentials, status_filter)
            .await
            .map_err(|e| SessionError::from_port(e, "Failed to get claims"))
    }

    pub async fn review_claim(
        &self,
        claim_id: &str,
        review: ClaimReview,
    ) -> Result<Acknowledgement, SessionError> {
        let credentials = self.require_admin().await?;
        let ack = self
            .api
            .review_claim(&credentials, claim_id, review)
            .await
            .map_err(|e| SessionError::from_port(e, "Failed to review claim"))?;
        info!(claim_id, action = review.as_str(), "Claim reviewed");
        Ok(ack)
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    async fn require_credentials(&self) -> Result<Credentials, SessionError> {
        let credentials = self.credentials().await;
        if credentials.token().is_none() {
            return Err(SessionError::NotAuthenticated);
        }
        Ok(credentials)
    }

    async fn require_admin(&self) -> Result<Credentials, SessionError> {
        let state = self.state.read().await;
        let token = state.token.clone().ok_or(SessionError::NotAuthenticated)?;
        match &state.user {
            Some(user) if user.role == UserRole::Admin => Ok(Credentials::bearer(token)),
            Some(_) => Err(SessionError::Forbidden),
            None => Err(SessionError::NotAuthenticated),
        }
    }

    async fn forget_persisted_token(&self) {
        if let Err(e) = self.store.clear().await {
            warn!("Failed to remove the persisted token: {}", e);
        }
    }
}
