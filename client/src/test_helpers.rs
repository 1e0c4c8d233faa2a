//! In-process mock of the Litflix backend for HTTP contract tests.
//!
//! Binds an axum router to `127.0.0.1:0` and implements the auth, saved-item
//! and recommendation endpoints against in-memory maps. Every handled request
//! bumps a counter so tests can assert that a call stayed local.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::net::types::{Preferences, SavedItem};

#[derive(Default)]
struct MockData {
    /// username -> (email, password)
    users: HashMap<String, (String, String)>,
    /// token -> username
    tokens: HashMap<String, String>,
    /// username -> saved list
    saved: HashMap<String, Vec<SavedItem>>,
    preferences: HashMap<String, Preferences>,
    next_row_id: i64,
}

#[derive(Clone, Default)]
struct MockState {
    data: Arc<Mutex<MockData>>,
    hits: Arc<AtomicUsize>,
    /// When set, every saved-item mutation answers 500.
    fail_mutations: Arc<AtomicBool>,
    /// Artificial latency of `GET /api/saved/list`, in milliseconds.
    list_delay_ms: Arc<AtomicU64>,
}

impl MockState {
    fn data(&self) -> MutexGuard<'_, MockData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;
        self.data().tokens.get(token).cloned()
    }

    fn issue_token(&self, username: &str) -> String {
        let token = format!("tok-{}", uuid::Uuid::new_v4());
        self.data().tokens.insert(token.clone(), username.to_owned());
        token
    }
}

pub struct MockBackend {
    pub base_url: String,
    state: MockState,
    handle: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let state = MockState::default();
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock backend should bind");
        let addr = listener.local_addr().expect("mock backend should have an address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { base_url: format!("http://{addr}"), state, handle }
    }

    /// Number of requests the backend has handled so far.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn add_user(&self, username: &str, email: &str, password: &str) {
        self.state.data().users.insert(username.to_owned(), (email.to_owned(), password.to_owned()));
    }

    /// Register `username` and hand out a valid token without an HTTP call.
    pub fn token_for(&self, username: &str) -> String {
        self.add_user(username, &format!("{username}@litflix.test"), "pw");
        self.state.issue_token(username)
    }

    pub fn revoke_all_tokens(&self) {
        self.state.data().tokens.clear();
    }

    pub fn seed_saved(&self, username: &str, items: Vec<SavedItem>) {
        let mut data = self.state.data();
        let mut rows = Vec::with_capacity(items.len());
        for mut item in items {
            data.next_row_id += 1;
            item.id = Some(data.next_row_id);
            item.saved_at = Some("2025-07-20T10:00:00".to_owned());
            rows.push(item);
        }
        data.saved.insert(username.to_owned(), rows);
    }

    pub fn saved_for(&self, username: &str) -> Vec<SavedItem> {
        self.state.data().saved.get(username).cloned().unwrap_or_default()
    }

    pub fn preferences_for(&self, username: &str) -> Option<Preferences> {
        self.state.data().preferences.get(username).cloned()
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.state.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Hold every saved-list response for `delay` before answering.
    pub fn delay_list(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.list_delay_ms.store(millis, Ordering::SeqCst);
    }
}

// =============================================================================
// ROUTER
// =============================================================================

fn router(state: MockState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
        .route("/api/auth/preferences", post(save_preferences).get(get_preferences))
        .route("/api/saved/list", get(list_saved))
        .route("/api/saved/save", post(save_item))
        .route("/api/saved/remove/{item_id}", delete(remove_item))
        .route("/api/saved/check/{item_id}", get(check_item))
        .route("/api/search", post(search))
        .route("/api/recommendations", post(recommendations))
        .with_state(state)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    username: String,
    email: String,
    password: String,
}

async fn login(State(state): State<MockState>, Json(body): Json<LoginBody>) -> Response {
    state.hit();
    let valid = state
        .data()
        .users
        .get(&body.username)
        .is_some_and(|(_, password)| *password == body.password);
    if !valid {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect username or password");
    }
    let token = state.issue_token(&body.username);
    Json(json!({ "access_token": token, "token_type": "bearer" })).into_response()
}

async fn register(State(state): State<MockState>, Json(body): Json<RegisterBody>) -> Response {
    state.hit();
    {
        let mut data = state.data();
        if data.users.contains_key(&body.username) {
            return detail(StatusCode::BAD_REQUEST, "Username already registered");
        }
        data.users.insert(body.username.clone(), (body.email.clone(), body.password));
    }
    let token = state.issue_token(&body.username);
    Json(json!({
        "access_token": token,
        "token_type": "bearer",
        "user": { "id": 1, "username": body.username, "email": body.email }
    }))
    .into_response()
}

async fn me(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.hit();
    let Some(username) = state.user_for(&headers) else {
        return unauthorized();
    };
    let email = state.data().users.get(&username).map(|(email, _)| email.clone());
    Json(json!({ "id": 1, "username": username, "email": email })).into_response()
}

async fn save_preferences(State(state): State<MockState>, headers: HeaderMap, Json(prefs): Json<Preferences>) -> Response {
    state.hit();
    let Some(username) = state.user_for(&headers) else {
        return unauthorized();
    };
    state.data().preferences.insert(username, prefs);
    Json(json!({ "message": "Preferences saved" })).into_response()
}

async fn get_preferences(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.hit();
    let Some(username) = state.user_for(&headers) else {
        return unauthorized();
    };
    let prefs = state.data().preferences.get(&username).cloned().unwrap_or_default();
    Json(prefs).into_response()
}

async fn list_saved(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.hit();
    let Some(username) = state.user_for(&headers) else {
        return unauthorized();
    };
    let delay = state.list_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let items = state.data().saved.get(&username).cloned().unwrap_or_default();
    Json(items).into_response()
}

async fn save_item(State(state): State<MockState>, headers: HeaderMap, Json(item): Json<SavedItem>) -> Response {
    state.hit();
    let Some(username) = state.user_for(&headers) else {
        return unauthorized();
    };
    if state.fail_mutations.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }

    let mut data = state.data();
    data.next_row_id += 1;
    let row_id = data.next_row_id;
    let list = data.saved.entry(username).or_default();
    if let Some(existing) = list.iter_mut().find(|i| i.item_id == item.item_id) {
        existing.favorited = item.favorited;
        return Json(existing.clone()).into_response();
    }
    let mut stored = item;
    stored.id = Some(row_id);
    stored.saved_at = Some("2025-07-20T10:00:00".to_owned());
    list.push(stored.clone());
    Json(stored).into_response()
}

async fn remove_item(State(state): State<MockState>, headers: HeaderMap, Path(item_id): Path<String>) -> Response {
    state.hit();
    let Some(username) = state.user_for(&headers) else {
        return unauthorized();
    };
    if state.fail_mutations.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }

    let mut data = state.data();
    let list = data.saved.entry(username).or_default();
    let before = list.len();
    list.retain(|i| i.item_id != item_id);
    if list.len() == before {
        return detail(StatusCode::NOT_FOUND, "Saved item not found");
    }
    Json(json!({ "message": "Item removed from saved list" })).into_response()
}

async fn check_item(State(state): State<MockState>, headers: HeaderMap, Path(item_id): Path<String>) -> Response {
    state.hit();
    let Some(username) = state.user_for(&headers) else {
        return unauthorized();
    };
    let is_saved = state
        .data()
        .saved
        .get(&username)
        .is_some_and(|list| list.iter().any(|i| i.item_id == item_id));
    Json(json!({ "is_saved": is_saved })).into_response()
}

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    entity_type: String,
}

async fn search(State(state): State<MockState>, Json(body): Json<SearchBody>) -> Response {
    state.hit();
    Json(json!({
        "results": [{ "entity_id": "E-SEARCH", "name": body.query, "type": body.entity_type }]
    }))
    .into_response()
}

async fn recommendations(State(state): State<MockState>, headers: HeaderMap, Json(prefs): Json<Value>) -> Response {
    state.hit();
    let favorites: Vec<Value> = state
        .user_for(&headers)
        .and_then(|u| state.data().saved.get(&u).cloned())
        .unwrap_or_default()
        .into_iter()
        .filter(|i| i.favorited)
        .map(|i| json!({ "entity_id": i.item_id }))
        .collect();
    Json(json!({
        "book_recs": [{ "name": prefs.get("book_name").cloned().unwrap_or(Value::Null) }],
        "popular_books": [],
        "movie_recs": favorites,
        "tv_show_recs": []
    }))
    .into_response()
}
