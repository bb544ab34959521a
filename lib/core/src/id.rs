//! Strongly-typed ID types.
//!
//! Two families of identifiers flow through the relay:
//!
//! - Ids issued by the assistant provider (sessions, runs, assistants). These
//!   are opaque strings; we never parse or generate them, only carry them.
//! - Ids issued locally (event invocations). These use ULID format, giving
//!   both uniqueness and temporal ordering in the logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }
    };
}

/// Macro to generate a wrapper around an opaque, provider-issued string id.
macro_rules! define_remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a provider-issued id.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper, returning the raw id.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    /// Identifier for the handling of one inbound event.
    InvocationId,
    "inv"
);

define_remote_id!(
    /// Identifier of an assistant session (an OpenAI thread).
    SessionId
);

define_remote_id!(
    /// Identifier of a single assistant run against a session.
    RunId
);

define_remote_id!(
    /// Identifier of the configured assistant.
    AssistantId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_id_display_format() {
        let id = InvocationId::new();
        assert!(id.to_string().starts_with("inv_"));
    }

    #[test]
    fn invocation_ids_are_unique() {
        assert_ne!(InvocationId::new(), InvocationId::new());
    }

    #[test]
    fn remote_ids_are_opaque() {
        let id = SessionId::new("thread_abc123");
        assert_eq!(id.as_str(), "thread_abc123");
        assert_eq!(id.to_string(), "thread_abc123");
        assert_eq!(SessionId::from("thread_abc123"), id);
    }

    #[test]
    fn remote_id_serializes_transparently() {
        let id = RunId::new("run_1");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"run_1\"");
    }
}
