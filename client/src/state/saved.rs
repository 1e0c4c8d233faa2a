//! Saved-items list for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SavedItemsStore` caches the user's saved list in memory and mirrors
//! add/remove calls to the backend, which stays authoritative. It follows the
//! auth store through an [`AuthSnapshot`] receiver: a change of flag or token
//! reloads the list, and losing authentication clears it.
//!
//! DESIGN
//! ======
//! - Mutations touch the local list only after the backend call succeeds; on
//!   failure the list is left as it was, not reconciled.
//! - Concurrent calls are not ordered against each other. The list reflects
//!   whichever response landed last.
//! - Failures are logged and reported as `false` / empty list.

#[cfg(test)]
#[path = "saved_test.rs"]
mod saved_test;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::auth::AuthSnapshot;
use crate::net::api::ApiClient;
use crate::net::types::SavedItem;

pub struct SavedItemsStore {
    api: ApiClient,
    auth: watch::Receiver<AuthSnapshot>,
    items: RwLock<Vec<SavedItem>>,
    /// Number of list fetches in flight.
    loading: AtomicUsize,
}

impl SavedItemsStore {
    /// Create a store that shares `api` with the auth store and reads the
    /// authentication flag from `auth` (see [`super::auth::AuthStore::subscribe`]).
    #[must_use]
    pub fn new(api: ApiClient, auth: watch::Receiver<AuthSnapshot>) -> Self {
        Self { api, auth, items: RwLock::new(Vec::new()), loading: AtomicUsize::new(0) }
    }

    // =========================================================================
    // LOCAL READS
    // =========================================================================

    #[must_use]
    pub fn items(&self) -> Vec<SavedItem> {
        self.items.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Saved items flagged as favorites.
    #[must_use]
    pub fn favorites(&self) -> Vec<SavedItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|i| i.favorited)
            .cloned()
            .collect()
    }

    /// Local lookup; never touches the network.
    #[must_use]
    pub fn is_item_saved(&self, item_id: &str) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|i| i.item_id == item_id)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    fn is_authenticated(&self) -> bool {
        self.auth.borrow().authenticated
    }

    // =========================================================================
    // BACKEND OPERATIONS
    // =========================================================================

    /// Replace the list with the backend's copy. Clears it when logged out or
    /// when the fetch fails. Returns whether the fetch succeeded.
    pub async fn load_saved_items(&self) -> bool {
        if !self.is_authenticated() {
            self.clear();
            return false;
        }

        self.loading.fetch_add(1, Ordering::SeqCst);
        let result = self.api.list_saved().await;
        self.loading.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(items) => {
                debug!(count = items.len(), "saved items loaded");
                *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to load saved items");
                self.clear();
                false
            }
        }
    }

    /// Save `item` on the backend, then upsert the stored copy locally:
    /// an entry with the same `item_id` is replaced, otherwise appended.
    pub async fn save_item(&self, item: SavedItem) -> bool {
        if !self.is_authenticated() {
            warn!(item_id = %item.item_id, "save skipped: not authenticated");
            return false;
        }

        match self.api.save_item(&item).await {
            Ok(stored) => {
                upsert(&mut self.items.write().unwrap_or_else(PoisonError::into_inner), stored);
                true
            }
            Err(e) => {
                warn!(item_id = %item.item_id, error = %e, "failed to save item");
                false
            }
        }
    }

    /// Remove `item_id` on the backend, then drop exactly that entry locally.
    pub async fn remove_item(&self, item_id: &str) -> bool {
        if !self.is_authenticated() {
            warn!(item_id, "remove skipped: not authenticated");
            return false;
        }

        match self.api.remove_saved(item_id).await {
            Ok(()) => {
                self.items
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|i| i.item_id != item_id);
                true
            }
            Err(e) => {
                warn!(item_id, error = %e, "failed to remove item");
                false
            }
        }
    }

    /// Ask the backend whether `item_id` is saved. `false` when logged out
    /// (no request is made) or when the call fails.
    pub async fn check_if_saved(&self, item_id: &str) -> bool {
        if !self.is_authenticated() {
            return false;
        }

        match self.api.check_saved(item_id).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!(item_id, error = %e, "failed to check saved status");
                false
            }
        }
    }

    /// Flip the favorite flag of a locally known item and save it.
    /// Returns `false` when the item is not on the local list.
    pub async fn toggle_favorite(&self, item_id: &str) -> bool {
        let current = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|i| i.item_id == item_id)
            .cloned();
        let Some(item) = current else {
            return false;
        };
        let favorited = !item.favorited;
        self.save_item(item.with_favorited(favorited)).await
    }

    // =========================================================================
    // AUTH FOLLOWING
    // =========================================================================

    /// Reload for an authenticated snapshot, clear otherwise.
    pub async fn on_auth_change(&self, snapshot: &AuthSnapshot) {
        if snapshot.authenticated {
            self.load_saved_items().await;
        } else {
            self.clear();
        }
    }

    /// Spawn a task that applies the current snapshot and then every change.
    /// The task ends when the auth store is dropped.
    pub fn spawn_auth_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut rx = self.auth.clone();
        tokio::spawn(async move {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                store.on_auth_change(&snapshot).await;
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn clear(&self) {
        self.items.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Replace the entry with the same `item_id`, or append.
pub(crate) fn upsert(items: &mut Vec<SavedItem>, item: SavedItem) {
    match items.iter_mut().find(|i| i.item_id == item.item_id) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}
