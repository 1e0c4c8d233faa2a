//! Networking modules for the Litflix REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` issues HTTP calls through one shared client, `error` classifies
//! failures, and `types` defines the wire schema.

pub mod api;
pub mod error;
pub mod types;
