//! In-memory port implementations shared by the unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

use crate::domain::{
    AccessToken, Acknowledgement, CheckoutSession, CheckoutStatus, ClaimRequest, ClaimReview,
    Credentials, NewUser, ProfileUpdate, ReportRequest, ThesisClaim, UserProfile, UserRole,
};
use crate::ports::{AuthApi, CheckoutApi, PortError, PortResult, Sleeper, TokenStore};

pub fn profile(id: &str, name: &str, role: UserRole) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        email: format!("{}@example.org", id),
        name: name.to_string(),
        role,
        is_active: true,
        is_verified: false,
        orcid: None,
        institution: None,
        country: None,
        bio: None,
        website: None,
        profile_picture: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        last_login: None,
        claimed_theses: Vec::new(),
    }
}

//=========================================================================================
// Token Store
//=========================================================================================

#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Some(token.to_string())),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.slot.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> PortResult<Option<String>> {
        Ok(self.current())
    }

    async fn save(&self, token: &str) -> PortResult<()> {
        *self.slot.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        *self.slot.lock().unwrap() = None;
        Ok(())
    }
}

//=========================================================================================
// Auth API
//=========================================================================================

struct Account {
    password: String,
    profile: UserProfile,
}

/// A fake auth server that keeps accounts, tokens and claims in memory.
#[derive(Default)]
pub struct MockAuthApi {
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<String, String>>,
    claims: Mutex<Vec<ThesisClaim>>,
    update_rejection: Mutex<Option<String>>,
    offline: AtomicBool,
    profile_fetches: AtomicUsize,
    profile_updates: AtomicUsize,
    held: AtomicBool,
    gate: Notify,
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account and returns the token a login for it yields.
    pub fn add_account(&self, email: &str, password: &str, mut profile: UserProfile) -> String {
        profile.email = email.to_string();
        let token = format!("token-{}", profile.id);
        self.tokens
            .lock()
            .unwrap()
            .insert(token.clone(), email.to_string());
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                profile,
            },
        );
        token
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn reject_updates(&self, detail: &str) {
        *self.update_rejection.lock().unwrap() = Some(detail.to_string());
    }

    pub fn set_role(&self, email: &str, role: UserRole) {
        if let Some(account) = self.accounts.lock().unwrap().get_mut(email) {
            account.profile.role = role;
        }
    }

    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    pub fn profile_updates(&self) -> usize {
        self.profile_updates.load(Ordering::SeqCst)
    }

    /// From now on, profile fetches and updates block until `release` is called.
    pub fn hold_profile_calls(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    async fn wait_if_held(&self) {
        if self.held.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
    }

    fn reachable(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn authenticate(&self, credentials: &Credentials) -> PortResult<String> {
        self.reachable()?;
        credentials
            .token()
            .and_then(|t| self.tokens.lock().unwrap().get(t).cloned())
            .ok_or_else(|| PortError::Unauthorized("Invalid authentication credentials".to_string()))
    }

    fn current_profile(&self, email: &str) -> PortResult<UserProfile> {
        self.accounts
            .lock()
            .unwrap()
            .get(email)
            .map(|a| a.profile.clone())
            .ok_or_else(|| PortError::Unauthorized("User not found".to_string()))
    }

    fn require_admin(&self, credentials: &Credentials) -> PortResult<UserProfile> {
        let email = self.authenticate(credentials)?;
        let user = self.current_profile(&email)?;
        if user.role != UserRole::Admin {
            return Err(PortError::Unauthorized("Admin access required".to_string()));
        }
        Ok(user)
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, email: &str, password: &str) -> PortResult<AccessToken> {
        self.reachable()?;
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some(account) if account.password == password => Ok(AccessToken {
                access_token: format!("token-{}", account.profile.id),
                token_type: "bearer".to_string(),
            }),
            _ => Err(PortError::Unauthorized(
                "Incorrect email or password".to_string(),
            )),
        }
    }

    async fn fetch_profile(&self, credentials: &Credentials) -> PortResult<UserProfile> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;
        let email = self.authenticate(credentials)?;
        self.current_profile(&email)
    }

    async fn register(&self, user: &NewUser) -> PortResult<UserProfile> {
        self.reachable()?;
        if self.accounts.lock().unwrap().contains_key(&user.email) {
            return Err(PortError::Rejected {
                status: 400,
                detail: "Email already registered".to_string(),
            });
        }
        let id = format!("u{}", self.accounts.lock().unwrap().len() + 100);
        let mut created = profile(&id, &user.name, user.role);
        created.institution = user.institution.clone();
        created.country = user.country.clone();
        created.orcid = user.orcid.clone();
        self.add_account(&user.email, &user.password, created);
        self.current_profile(&user.email)
    }

    async fn update_profile(
        &self,
        credentials: &Credentials,
        update: &ProfileUpdate,
    ) -> PortResult<UserProfile> {
        self.profile_updates.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;
        let email = self.authenticate(credentials)?;
        if let Some(detail) = self.update_rejection.lock().unwrap().clone() {
            return Err(PortError::Rejected { status: 500, detail });
        }
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&email)
            .ok_or_else(|| PortError::Unauthorized("User not found".to_string()))?;
        let p = &mut account.profile;
        if let Some(name) = &update.name {
            p.name = name.clone();
        }
        if let Some(bio) = &update.bio {
            p.bio = Some(bio.clone());
        }
        if let Some(website) = &update.website {
            p.website = Some(website.clone());
        }
        if let Some(institution) = &update.institution {
            p.institution = Some(institution.clone());
        }
        Ok(p.clone())
    }

    async fn claim_thesis(
        &self,
        credentials: &Credentials,
        claim: &ClaimRequest,
    ) -> PortResult<Acknowledgement> {
        let email = self.authenticate(credentials)?;
        let user = self.current_profile(&email)?;
        let mut claims = self.claims.lock().unwrap();
        if claims
            .iter()
            .any(|c| c.thesis_id == claim.thesis_id && c.user_id == user.id)
        {
            return Err(PortError::Rejected {
                status: 400,
                detail: "You have already claimed this thesis".to_string(),
            });
        }
        let next_id = claims.len() + 1;
        claims.push(ThesisClaim {
            id: Some(format!("c{}", next_id)),
            thesis_id: claim.thesis_id.clone(),
            user_id: user.id,
            claim_type: serde_json::to_value(claim.claim_type)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            message: claim.message.clone(),
            status: "pending".to_string(),
            created_at: Utc::now(),
        });
        Ok(Acknowledgement {
            message: "Thesis claim submitted successfully".to_string(),
            status: Some("pending".to_string()),
        })
    }

    async fn report_thesis(
        &self,
        _credentials: &Credentials,
        _report: &ReportRequest,
    ) -> PortResult<Acknowledgement> {
        self.reachable()?;
        Ok(Acknowledgement {
            message: "Report submitted successfully".to_string(),
            status: Some("pending".to_string()),
        })
    }

    async fn my_claims(&self, credentials: &Credentials) -> PortResult<Vec<ThesisClaim>> {
        let email = self.authenticate(credentials)?;
        let user = self.current_profile(&email)?;
        Ok(self
            .claims
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user.id)
            .cloned()
            .collect())
    }

    async fn list_users(
        &self,
        credentials: &Credentials,
        skip: u32,
        limit: u32,
    ) -> PortResult<Vec<UserProfile>> {
        self.require_admin(credentials)?;
        let mut users: Vec<UserProfile> = self
            .accounts
            .lock()
            .unwrap()
            .values()
            .map(|a| a.profile.clone())
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_claims(
        &self,
        credentials: &Credentials,
        status_filter: Option<&str>,
    ) -> PortResult<Vec<ThesisClaim>> {
        self.require_admin(credentials)?;
        Ok(self
            .claims
            .lock()
            .unwrap()
            .iter()
            .filter(|c| status_filter.map_or(true, |s| c.status == s))
            .cloned()
            .collect())
    }

    async fn review_claim(
        &self,
        credentials: &Credentials,
        claim_id: &str,
        review: ClaimReview,
    ) -> PortResult<Acknowledgement> {
        self.require_admin(credentials)?;
        let mut claims = self.claims.lock().unwrap();
        let claim = claims
            .iter_mut()
            .find(|c| c.id.as_deref() == Some(claim_id))
            .ok_or_else(|| PortError::Rejected {
                status: 404,
                detail: "Claim not found".to_string(),
            })?;
        claim.status = match review {
            ClaimReview::Approve => "approved".to_string(),
            ClaimReview::Reject => "rejected".to_string(),
        };
        Ok(Acknowledgement {
            message: format!("Claim {}d successfully", review.as_str()),
            status: None,
        })
    }
}

//=========================================================================================
// Checkout API & Sleepers
//=========================================================================================

pub fn checkout(status: &str, payment_status: &str) -> CheckoutStatus {
    CheckoutStatus {
        status: status.to_string(),
        payment_status: payment_status.to_string(),
        amount_total: Some(500),
        currency: Some("eur".to_string()),
        thesis_id: Some("t1".to_string()),
    }
}

pub fn pending() -> PortResult<CheckoutStatus> {
    Ok(checkout("open", "unpaid"))
}

/// Replays scripted status responses, then answers "pending" forever.
#[derive(Default)]
pub struct ScriptedCheckoutApi {
    script: Mutex<VecDeque<PortResult<CheckoutStatus>>>,
    queries: AtomicUsize,
    hold: Option<Notify>,
}

impl ScriptedCheckoutApi {
    pub fn new(script: Vec<PortResult<CheckoutStatus>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    /// Every query blocks until `release` is called.
    pub fn held(script: Vec<PortResult<CheckoutStatus>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            hold: Some(Notify::new()),
            ..Default::default()
        }
    }

    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.notify_one();
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckoutApi for ScriptedCheckoutApi {
    async fn checkout_status(&self, _session_id: &str) -> PortResult<CheckoutStatus> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        self.script.lock().unwrap().pop_front().unwrap_or_else(pending)
    }

    async fn create_checkout(
        &self,
        thesis_id: &str,
        origin_url: &str,
    ) -> PortResult<CheckoutSession> {
        Ok(CheckoutSession {
            url: format!("{}/pay/{}", origin_url, thesis_id),
            session_id: Some("cs_test".to_string()),
            amount: Some(5.0),
            currency: Some("eur".to_string()),
        })
    }
}

/// Returns immediately and remembers each requested delay.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Never wakes up.
pub struct StalledSleeper;

#[async_trait]
impl Sleeper for StalledSleeper {
    async fn sleep(&self, _duration: Duration) {
        std::future::pending::<()>().await
    }
}
