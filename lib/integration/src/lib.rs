//! External integrations for parley.
//!
//! This crate provides:
//!
//! - **Messaging**: Posting replies to, and reading threads from, Slack
//! - **Search**: Web search through Google Programmable Search

pub mod error;
pub mod messaging;
pub mod search;

pub use error::{MessagingError, SearchError};
pub use messaging::{DeliveryReceipt, MessagingApi, SlackClient, SlackConfig};
pub use search::{GoogleSearchClient, GoogleSearchConfig, SearchApi, SearchResult};
