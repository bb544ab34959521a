//! Conversation context derivation.
//!
//! A conversation is one actor talking to the bot in one surface. Each
//! direct-message user has one conversation; each (user, channel) pair in
//! multi-party surfaces has another.

use crate::event::{InboundMessage, SurfaceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Surface component of the key for direct messages.
const DIRECT_SURFACE: &str = "DM";

/// Stable identifier of one (actor, surface) conversation.
///
/// Formatted as `{actor}-{surface}`. Slack ids never contain `-`, so distinct
/// pairs never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Derives the key for `actor` in a surface.
    #[must_use]
    pub fn derive(actor: &str, surface: SurfaceKind, channel: &str) -> Self {
        let surface_id = match surface {
            SurfaceKind::Direct => DIRECT_SURFACE,
            SurfaceKind::MultiParty => channel,
        };
        Self(format!("{actor}-{surface_id}"))
    }

    /// Wraps a previously persisted key.
    #[must_use]
    pub fn from_persisted(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a reply should be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    /// Channel (or user id, for direct messages) to post to.
    pub channel: String,
    /// Thread to reply in, if any.
    pub thread_ts: Option<String>,
}

/// Derives conversation keys and reply targets from inbound messages.
pub struct ContextResolver;

impl ContextResolver {
    /// Returns the conversation key for a message.
    #[must_use]
    pub fn key(message: &InboundMessage) -> ConversationKey {
        ConversationKey::derive(&message.actor, message.surface, &message.channel)
    }

    /// Returns where the reply to a message goes.
    ///
    /// Direct messages get a top-level message to the actor. Multi-party
    /// messages get a threaded reply, anchored at the existing thread when
    /// there is one and at the message itself otherwise.
    #[must_use]
    pub fn reply_target(message: &InboundMessage) -> ReplyTarget {
        match message.surface {
            SurfaceKind::Direct => ReplyTarget {
                channel: message.actor.clone(),
                thread_ts: None,
            },
            SurfaceKind::MultiParty => ReplyTarget {
                channel: message.channel.clone(),
                thread_ts: Some(
                    message
                        .thread_ts
                        .clone()
                        .unwrap_or_else(|| message.ts.clone()),
                ),
            },
        }
    }
}

/// Removes every `<@BOT_USER_ID>` token from `text` and trims the result.
#[must_use]
pub fn strip_addressing_token(text: &str, bot_user_id: &str) -> String {
    text.replace(&format!("<@{bot_user_id}>"), "")
        .trim()
        .to_string()
}
