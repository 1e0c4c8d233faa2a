//! REST API client for the Litflix backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `ApiClient` is created per front end and cloned into every store.
//! Clones share the bearer-token slot, so the auth store setting or clearing
//! the token changes the `Authorization` header of all later requests made
//! through any clone.
//!
//! ERROR HANDLING
//! ==============
//! Every call returns `Result<_, ApiError>`. Non-success statuses keep the
//! backend's message (see [`parse_error_message`]) so stores can surface it.
//! Nothing here retries.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{ApiError, parse_error_message};
use super::types::{
    CheckSavedResponse, LoginRequest, Preferences, Recommendations, RegisterRequest, SavedItem, SearchRequest,
    SearchResponse, TokenResponse, UserProfile,
};
use crate::config::{ClientConfig, ClientTimeouts};

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Build a client for `base_url` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is unusable or the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeouts(base_url, ClientTimeouts::default())
    }

    /// Build a client from parsed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is unusable or the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_timeouts(&config.api_base_url, config.timeouts)
    }

    /// # Errors
    ///
    /// Returns an error if the URL is unusable or the HTTP client fails to build.
    pub fn with_timeouts(base_url: &str, timeouts: ClientTimeouts) -> Result<Self, ApiError> {
        let base = parse_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base, token: Arc::new(RwLock::new(None)) })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    // =========================================================================
    // TOKEN
    // =========================================================================

    /// Set or clear the bearer token used by this client and all its clones.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token.filter(|t| !t.is_empty());
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// `POST /api/auth/login`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a rejected login.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let body = LoginRequest { username, password };
        self.send_json(Method::POST, &["api", "auth", "login"], Some(&body)).await
    }

    /// `POST /api/auth/register`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a rejected registration.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let body = RegisterRequest { username, email, password };
        self.send_json(Method::POST, &["api", "auth", "register"], Some(&body)).await
    }

    /// `GET /api/auth/me`: identity check for the current token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotAuthenticated`] without a token, or the backend rejection.
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        self.require_token()?;
        self.send_json::<(), _>(Method::GET, &["api", "auth", "me"], None).await
    }

    /// `POST /api/auth/preferences`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotAuthenticated`] without a token, or the backend rejection.
    pub async fn save_preferences(&self, prefs: &Preferences) -> Result<(), ApiError> {
        self.require_token()?;
        self.send_unit(Method::POST, &["api", "auth", "preferences"], Some(prefs)).await
    }

    /// `GET /api/auth/preferences`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotAuthenticated`] without a token, or the backend rejection.
    pub async fn get_preferences(&self) -> Result<Preferences, ApiError> {
        self.require_token()?;
        self.send_json::<(), _>(Method::GET, &["api", "auth", "preferences"], None).await
    }

    // =========================================================================
    // SAVED ITEMS
    // =========================================================================

    /// `GET /api/saved/list`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotAuthenticated`] without a token, or the backend rejection.
    pub async fn list_saved(&self) -> Result<Vec<SavedItem>, ApiError> {
        self.require_token()?;
        self.send_json::<(), _>(Method::GET, &["api", "saved", "list"], None).await
    }

    /// `POST /api/saved/save`: returns the backend's stored copy.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotAuthenticated`] without a token, or the backend rejection.
    pub async fn save_item(&self, item: &SavedItem) -> Result<SavedItem, ApiError> {
        self.require_token()?;
        self.send_json(Method::POST, &["api", "saved", "save"], Some(item)).await
    }

    /// `DELETE /api/saved/remove/{item_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotAuthenticated`] without a token, or the backend rejection
    /// (404 when the item is not on the list).
    pub async fn remove_saved(&self, item_id: &str) -> Result<(), ApiError> {
        self.require_token()?;
        self.send_unit::<()>(Method::DELETE, &["api", "saved", "remove", item_id], None).await
    }

    /// `GET /api/saved/check/{item_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotAuthenticated`] without a token, or the backend rejection.
    pub async fn check_saved(&self, item_id: &str) -> Result<bool, ApiError> {
        self.require_token()?;
        let resp: CheckSavedResponse =
            self.send_json::<(), _>(Method::GET, &["api", "saved", "check", item_id], None).await?;
        Ok(resp.is_saved)
    }

    // =========================================================================
    // RECOMMENDATIONS
    // =========================================================================

    /// `POST /api/search`: entity search by name and type.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a backend rejection.
    pub async fn search(&self, query: &str, entity_type: &str) -> Result<Vec<serde_json::Value>, ApiError> {
        let body = SearchRequest { query, entity_type };
        let resp: SearchResponse = self.send_json(Method::POST, &["api", "search"], Some(&body)).await?;
        Ok(resp.results)
    }

    /// `POST /api/recommendations`. Sends the token when one is set; the backend
    /// then blends the user's favorites into the seed signals.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a backend rejection.
    pub async fn recommendations(&self, prefs: &Preferences) -> Result<Recommendations, ApiError> {
        self.send_json(Method::POST, &["api", "recommendations"], Some(prefs)).await
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    fn require_token(&self) -> Result<(), ApiError> {
        if self.has_token() { Ok(()) } else { Err(ApiError::NotAuthenticated) }
    }

    /// Build the URL for `segments` under the base URL. Segments are
    /// percent-encoded individually.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "api request");

        let mut req = self.http.request(method, url);
        if let Some(token) = self.token() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req)
    }

    async fn send_raw<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let response = self.request(method, segments, body)?.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), message: parse_error_message(&text) });
        }
        Ok(text)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let text = self.send_raw(method, segments, body).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        self.send_raw(method, segments, body).await.map(|_| ())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim()).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidUrl(raw.to_owned()));
    }
    Ok(url)
}
