//! Conversation orchestration engine for parley.
//!
//! This crate provides:
//!
//! - **Events**: Parsing Slack Events API payloads into inbound messages
//! - **Addressing**: Deciding which messages the bot should answer
//! - **Context**: Conversation keys and reply targets
//! - **Sessions**: The durable conversation-to-session mapping
//! - **Relay**: The end-to-end event handler

pub mod addressing;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod session;
pub mod store;

pub use addressing::{Addressing, AddressingFilter, DropReason, mention};
pub use context::{ContextResolver, ConversationKey, ReplyTarget, strip_addressing_token};
pub use dispatch::ReplyDispatcher;
pub use engine::{DEFAULT_APOLOGY, EventOutcome, Relay, RelayConfig};
pub use error::{RelayError, SessionError, StoreError};
pub use event::{InboundMessage, SlackEnvelope, SlackEvent, SurfaceKind};
pub use session::SessionStore;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
