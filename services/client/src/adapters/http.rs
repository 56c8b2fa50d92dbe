//! services/client/src/adapters/http.rs
//!
//! This module contains the REST adapter for the theses API.
//! It implements the `AuthApi` and `CheckoutApi` ports from the `core` crate.

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use theses_core::domain::{
    AccessToken, Acknowledgement, CheckoutSession, CheckoutStatus, ClaimRequest, ClaimReview,
    Credentials, NewUser, ProfileUpdate, ReportRequest, ThesisClaim, UserProfile,
};
use theses_core::ports::{AuthApi, CheckoutApi, PortError, PortResult};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the API ports over HTTP using `reqwest`.
#[derive(Clone)]
pub struct HttpApiAdapter {
    client: Client,
    base_url: Url,
}

impl HttpApiAdapter {
    /// Creates a new `HttpApiAdapter` rooted at `base_url`.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.clone(),
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one so an id
    /// can never add a segment, a query or a fragment of its own.
    fn url(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Attaches the bearer token, if the credentials carry one.
    fn authorize(builder: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        match credentials.authorization() {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> PortResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;
        let status = response.status();
        debug!(%status, url = %response.url().path(), "API response");

        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Decode(e.to_string()))
    }
}

//=========================================================================================
// Wire Payloads & Error Mapping
//=========================================================================================

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CheckoutBody<'a> {
    thesis_id: &'a str,
    origin_url: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Value,
}

async fn error_from_response(status: StatusCode, response: Response) -> PortError {
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| detail_text(&body.detail))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized(detail),
        _ => PortError::Rejected {
            status: status.as_u16(),
            detail,
        },
    }
}

/// Extracts a readable message from a `detail` field.
///
/// The API sends either a plain string or, for validation failures, a list of
/// objects each carrying a `msg`.
fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

//=========================================================================================
// `AuthApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthApi for HttpApiAdapter {
    async fn login(&self, email: &str, password: &str) -> PortResult<AccessToken> {
        let request = self
            .client
            .post(self.url(&["api", "auth", "login"])?)
            .json(&LoginBody { email, password });
        Self::send(request).await
    }

    async fn fetch_profile(&self, credentials: &Credentials) -> PortResult<UserProfile> {
        let url = self.url(&["api", "auth", "me"])?;
        let request = Self::authorize(self.client.get(url), credentials);
        Self::send(request).await
    }

    async fn register(&self, user: &NewUser) -> PortResult<UserProfile> {
        let url = self.url(&["api", "auth", "register"])?;
        let request = self.client.post(url).json(user);
        Self::send(request).await
    }

    async fn update_profile(
        &self,
        credentials: &Credentials,
        update: &ProfileUpdate,
    ) -> PortResult<UserProfile> {
        let url = self.url(&["api", "auth", "me"])?;
        let request = Self::authorize(self.client.put(url), credentials).json(update);
        Self::send(request).await
    }

    async fn claim_thesis(
        &self,
        credentials: &Credentials,
        claim: &ClaimRequest,
    ) -> PortResult<Acknowledgement> {
        let request = Self::authorize(
            self.client.post(self.url(&["api", "auth", "claim-thesis"])?),
            credentials,
        )
        .json(claim);
        Self::send(request).await
    }

    async fn report_thesis(
        &self,
        credentials: &Credentials,
        report: &ReportRequest,
    ) -> PortResult<Acknowledgement> {
        let request = Self::authorize(
            self.client.post(self.url(&["api", "auth", "report-thesis"])?),
            credentials,
        )
        .json(report);
        Self::send(request).await
    }

    async fn my_claims(&self, credentials: &Credentials) -> PortResult<Vec<ThesisClaim>> {
        let url = self.url(&["api", "auth", "my-claims"])?;
        let request = Self::authorize(self.client.get(url), credentials);
        Self::send(request).await
    }

    async fn list_users(
        &self,
        credentials: &Credentials,
        skip: u32,
        limit: u32,
    ) -> PortResult<Vec<UserProfile>> {
        let request = Self::authorize(
            self.client.get(self.url(&["api", "auth", "admin", "users"])?),
            credentials,
        )
        .query(&[("skip", skip), ("limit", limit)]);
        Self::send(request).await
    }

    async fn list_claims(
        &self,
        credentials: &Credentials,
        status_filter: Option<&str>,
    ) -> PortResult<Vec<ThesisClaim>> {
        let mut request = Self::authorize(
            self.client.get(self.url(&["api", "auth", "admin", "claims"])?),
            credentials,
        );
        if let Some(status) = status_filter {
            request = request.query(&[("status_filter", status)]);
        }
        Self::send(request).await
    }

    async fn review_claim(
        &self,
        credentials: &Credentials,
        claim_id: &str,
        review: ClaimReview,
    ) -> PortResult<Acknowledgement> {
        let url = self.url(&["api", "auth", "admin", "claims", claim_id, "review"])?;
        let request = Self::authorize(self.client.put(url), credentials)
            .query(&[("action", review.as_str())]);
        Self::send(request).await
    }
}

//=========================================================================================
// `CheckoutApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl CheckoutApi for HttpApiAdapter {
    async fn checkout_status(&self, session_id: &str) -> PortResult<CheckoutStatus> {
        let url = self.url(&["api", "checkout", "status", session_id])?;
        Self::send(self.client.get(url)).await
    }

    async fn create_checkout(
        &self,
        thesis_id: &str,
        origin_url: &str,
    ) -> PortResult<CheckoutSession> {
        let request = self
            .client
            .post(self.url(&["api", "checkout", "session"])?)
            .json(&CheckoutBody {
                thesis_id,
                origin_url,
            });
        Self::send(request).await
    }
}
