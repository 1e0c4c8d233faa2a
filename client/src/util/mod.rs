//! Utility helpers shared across client state modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Utility modules isolate environment concerns (persistent storage) from the
//! session and saved-item logic to improve reuse and testability.

pub mod storage;
