//! Litflix client state layer.
//!
//! SYSTEM CONTEXT
//! ==============
//! Holds the authenticated session and the saved-items list for a Litflix
//! front end, mirroring both against the backend REST API. Front ends (the
//! `litflix-cli` binary, UI shells) own an `AuthStore` and a
//! `SavedItemsStore` that share one `ApiClient`.
//!
//! DESIGN
//! ======
//! - `net` is the HTTP boundary: wire DTOs, errors and the shared client.
//! - `state` owns in-memory session and saved-item state.
//! - `util` holds the persistent key/value storage used for the token.

pub mod config;
pub mod net;
pub mod state;
pub mod util;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::ClientConfig;
pub use net::api::ApiClient;
pub use net::error::ApiError;
pub use state::auth::{AuthError, AuthSnapshot, AuthStore, Session};
pub use state::saved::SavedItemsStore;
pub use util::storage::{FileStorage, MemoryStorage, Storage, StorageError};
