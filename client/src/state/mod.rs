//! Shared client-side state modules.
//!
//! DESIGN
//! ======
//! State is split by domain (`auth`, `saved`) so front ends can depend on
//! small focused stores. `saved` follows `auth` through a watch channel and
//! never mutates the session itself.

pub mod auth;
pub mod saved;
