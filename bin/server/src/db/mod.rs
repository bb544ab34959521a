//! Database repositories for parley.
//!
//! This module provides data access for:
//! - Conversation-to-session mappings

pub mod session_map;

pub use session_map::PgKeyValueStore;
