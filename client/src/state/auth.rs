//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! `AuthStore` is the only owner of the session. It persists the bearer token
//! in [`Storage`], installs it on the shared [`ApiClient`] and publishes an
//! [`AuthSnapshot`] on every change so dependent stores (saved items) can
//! reload or clear.
//!
//! ERROR HANDLING
//! ==============
//! Operations return `Result<_, AuthError>`. Backend rejections carry the
//! backend's message; anything else maps to a per-operation fallback string.
//! A 401 is only acted on in [`AuthStore::restore`], where a failed identity
//! check logs the session out. There is no refresh or retry.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::net::api::ApiClient;
use crate::net::error::ApiError;
use crate::net::types::{Preferences, TokenResponse, UserProfile};
use crate::util::storage::{Storage, StorageError};

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Storage key set once the user has saved or skipped onboarding preferences.
pub const HAS_SEEN_PREFERENCES_KEY: &str = "hasSeenPreferences";

const LOGIN_FAILED: &str = "Login failed";
const REGISTER_FAILED: &str = "Registration failed";
const SAVE_PREFERENCES_FAILED: &str = "Failed to save preferences";
const LOAD_PREFERENCES_FAILED: &str = "Failed to load preferences";
const NOT_AUTHENTICATED: &str = "Not authenticated";

// =============================================================================
// TYPES
// =============================================================================

/// An authenticated session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
    /// The user has not yet saved or skipped onboarding preferences.
    pub is_new_user: bool,
    /// The session was created by `register` rather than `login`/`restore`.
    pub is_registration: bool,
}

/// What dependent stores observe: the authentication flag and the token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    pub token: Option<String>,
}

impl AuthSnapshot {
    fn of(session: Option<&Session>) -> Self {
        Self { authenticated: session.is_some(), token: session.map(|s| s.token.clone()) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// User-facing failure message (backend detail or fallback).
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    fn from_api(op: &str, err: &ApiError, fallback: &str) -> Self {
        warn!(error = %err, "{op} failed");
        Self::Failed(err.server_message().unwrap_or(fallback).to_owned())
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct AuthStore {
    api: ApiClient,
    storage: Arc<dyn Storage>,
    session: RwLock<Option<Session>>,
    loading: AtomicBool,
    changes: watch::Sender<AuthSnapshot>,
}

impl AuthStore {
    #[must_use]
    pub fn new(api: ApiClient, storage: Arc<dyn Storage>) -> Self {
        let (changes, _) = watch::channel(AuthSnapshot::default());
        Self { api, storage, session: RwLock::new(None), loading: AtomicBool::new(false), changes }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }

    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.session().map(|s| s.user)
    }

    #[must_use]
    pub fn is_new_user(&self) -> bool {
        self.session().is_some_and(|s| s.is_new_user)
    }

    #[must_use]
    pub fn is_registration(&self) -> bool {
        self.session().is_some_and(|s| s.is_registration)
    }

    /// True while [`AuthStore::restore`] is checking a stored token.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Receiver that yields the current snapshot and every later change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.changes.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.changes.borrow().clone()
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Log in with username and password.
    ///
    /// # Errors
    ///
    /// Returns the backend's message (or "Login failed") when the login is
    /// rejected, or a storage error if the token cannot be persisted.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .api
            .login(username, password)
            .await
            .map_err(|e| AuthError::from_api("login", &e, LOGIN_FAILED))?;

        let is_new_user = !self.has_seen_preferences();
        let session = self.establish(response, UserProfile::named(username, None), is_new_user, false).await?;
        info!(username = %session.user.username, "logged in");
        Ok(session)
    }

    /// Create an account and log in.
    ///
    /// # Errors
    ///
    /// Returns the backend's message (or "Registration failed") when the
    /// registration is rejected, or a storage error if the token cannot be
    /// persisted.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .api
            .register(username, email, password)
            .await
            .map_err(|e| AuthError::from_api("register", &e, REGISTER_FAILED))?;

        let session = self.establish(response, UserProfile::named(username, Some(email)), true, true).await?;
        info!(username = %session.user.username, "registered");
        Ok(session)
    }

    /// Drop the session, the stored token and the shared authorization header.
    pub fn logout(&self) {
        if let Err(e) = self.storage.remove(TOKEN_KEY) {
            warn!(error = %e, "failed to remove stored token");
        }
        self.api.set_token(None);
        let had_session = self.session.write().unwrap_or_else(PoisonError::into_inner).take().is_some();
        self.publish();
        if had_session {
            info!("logged out");
        }
    }

    /// Re-establish a session from the stored token.
    ///
    /// Calls `/api/auth/me`; any failure logs out. Returns the restored
    /// session, or `None` when there is no usable token.
    pub async fn restore(&self) -> Option<Session> {
        let token = match self.storage.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "failed to read stored token");
                return None;
            }
        };

        self.loading.store(true, Ordering::SeqCst);
        self.api.set_token(Some(token.clone()));
        let result = self.api.me().await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(user) => {
                let session = Session { token, user, is_new_user: !self.has_seen_preferences(), is_registration: false };
                self.replace_session(session.clone());
                info!(username = %session.user.username, "session restored");
                Some(session)
            }
            Err(e) => {
                warn!(error = %e, "identity check failed; logging out");
                self.logout();
                None
            }
        }
    }

    /// Save onboarding preferences and mark onboarding as seen.
    ///
    /// # Errors
    ///
    /// Returns "Not authenticated" without a session, otherwise the backend's
    /// message or "Failed to save preferences".
    pub async fn save_preferences(&self, prefs: &Preferences) -> Result<(), AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::Failed(NOT_AUTHENTICATED.to_owned()));
        }
        self.api
            .save_preferences(prefs)
            .await
            .map_err(|e| AuthError::from_api("save preferences", &e, SAVE_PREFERENCES_FAILED))?;
        self.mark_preferences_seen();
        Ok(())
    }

    /// Fetch the saved onboarding preferences.
    ///
    /// # Errors
    ///
    /// Returns "Not authenticated" without a session, otherwise the backend's
    /// message or "Failed to load preferences".
    pub async fn get_preferences(&self) -> Result<Preferences, AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::Failed(NOT_AUTHENTICATED.to_owned()));
        }
        self.api
            .get_preferences()
            .await
            .map_err(|e| AuthError::from_api("load preferences", &e, LOAD_PREFERENCES_FAILED))
    }

    /// Mark onboarding as seen without saving preferences.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the flag cannot be persisted.
    pub fn skip_preferences(&self) -> Result<(), AuthError> {
        self.storage.set(HAS_SEEN_PREFERENCES_KEY, "true")?;
        self.clear_new_user();
        Ok(())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn has_seen_preferences(&self) -> bool {
        matches!(self.storage.get(HAS_SEEN_PREFERENCES_KEY), Ok(Some(v)) if v == "true")
    }

    fn mark_preferences_seen(&self) {
        if let Err(e) = self.storage.set(HAS_SEEN_PREFERENCES_KEY, "true") {
            warn!(error = %e, "failed to persist preferences flag");
        }
        self.clear_new_user();
    }

    fn clear_new_user(&self) {
        if let Some(session) = self.session.write().unwrap_or_else(PoisonError::into_inner).as_mut() {
            session.is_new_user = false;
        }
    }

    /// Persist the token, install it on the client and resolve the user.
    async fn establish(
        &self,
        response: TokenResponse,
        fallback_user: UserProfile,
        is_new_user: bool,
        is_registration: bool,
    ) -> Result<Session, AuthError> {
        let token = response.access_token;
        self.storage.set(TOKEN_KEY, &token)?;
        self.api.set_token(Some(token.clone()));

        let user = match response.user {
            Some(user) => user,
            None => self.api.me().await.unwrap_or_else(|e| {
                warn!(error = %e, "profile lookup after sign-in failed");
                fallback_user
            }),
        };

        let session = Session { token, user, is_new_user, is_registration };
        self.replace_session(session.clone());
        Ok(session)
    }

    fn replace_session(&self, session: Session) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        self.publish();
    }

    fn publish(&self) {
        let snapshot = AuthSnapshot::of(self.session.read().unwrap_or_else(PoisonError::into_inner).as_ref());
        self.changes.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}
