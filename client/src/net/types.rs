//! Shared wire-protocol DTOs for the client/backend boundary.
//!
//! DESIGN
//! ======
//! These types mirror the backend's request and response models. Fields the
//! backend fills in (`id`, `saved_at`) are optional so locally built values
//! serialize cleanly into save requests.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// USERS
// =============================================================================

/// Profile of the authenticated user as returned by `/api/auth/me`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend row id, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl UserProfile {
    /// Minimal profile used when the backend returns a token without a user.
    #[must_use]
    pub fn named(username: &str, email: Option<&str>) -> Self {
        Self { id: None, username: username.to_owned(), email: email.map(str::to_owned), created_at: None }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of a successful login or register call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

// =============================================================================
// PREFERENCES
// =============================================================================

/// Seed preferences used for recommendations. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    /// Age bucket such as `"24_and_younger"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl Preferences {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.book_name.is_none()
            && self.movie_name.is_none()
            && self.place_name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
    }
}

// =============================================================================
// SAVED ITEMS
// =============================================================================

/// A media item on the user's saved list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedItem {
    /// Backend row id; absent on items built locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Upstream entity id; the identity used for upserts and removals.
    pub item_id: String,
    pub item_name: String,
    /// Entity kind, e.g. `"book"`, `"movie"`, `"tv_show"`.
    pub item_type: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub item_image: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub item_description: String,
    #[serde(default)]
    pub favorited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl SavedItem {
    #[must_use]
    pub fn new(item_id: impl Into<String>, item_name: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            id: None,
            item_id: item_id.into(),
            item_name: item_name.into(),
            item_type: item_type.into(),
            item_image: String::new(),
            item_description: String::new(),
            favorited: false,
            saved_at: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.item_image = image.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.item_description = description.into();
        self
    }

    #[must_use]
    pub fn with_favorited(mut self, favorited: bool) -> Self {
        self.favorited = favorited;
        self
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckSavedResponse {
    pub is_saved: bool,
}

// =============================================================================
// RECOMMENDATIONS
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub query: &'a str,
    pub entity_type: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// Recommendation lists keyed by domain. Entities are passed through as the
/// upstream insights API shaped them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub book_recs: Vec<serde_json::Value>,
    #[serde(default)]
    pub popular_books: Vec<serde_json::Value>,
    #[serde(default)]
    pub movie_recs: Vec<serde_json::Value>,
    #[serde(default)]
    pub tv_show_recs: Vec<serde_json::Value>,
}

impl Recommendations {
    /// Total number of entities across all lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.book_recs.len() + self.popular_books.len() + self.movie_recs.len() + self.tv_show_recs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// SERDE HELPERS
// =============================================================================

fn deserialize_string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
