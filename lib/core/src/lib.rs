//! Core domain types and utilities for parley.
//!
//! This crate provides the strongly-typed identifiers shared by every layer
//! of the relay, for both provider-issued and locally-issued ids.

pub mod id;

pub use id::{AssistantId, InvocationId, RunId, SessionId};
