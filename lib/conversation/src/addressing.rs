//! Deciding which messages deserve a reply.
//!
//! Direct messages are always answered. In multi-party surfaces the bot only
//! answers messages carrying its mention token, and replies inside a thread
//! inherit their addressing from the thread's root post.

use crate::event::{InboundMessage, SurfaceKind};
use parley_integration::MessagingError;
use std::fmt;
use tracing::warn;

/// Subtypes that are still ordinary user posts.
const USER_POST_SUBTYPES: &[&str] = &["thread_broadcast", "file_share"];

/// Why an inbound event was not answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Posted by a bot, including this one.
    FromBot,
    /// Not a `message` event.
    UnsupportedEvent(String),
    /// A message subtype that is not a user post (edits, deletions, joins).
    UnsupportedSubtype(String),
    /// Required fields were missing.
    Malformed(&'static str),
    /// Multi-party message without the mention token.
    NotAddressed,
    /// The thread root could not be fetched.
    ThreadRootUnavailable,
    /// Nothing left to ask once the mention token is removed.
    EmptyText,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromBot => write!(f, "posted by a bot"),
            Self::UnsupportedEvent(kind) => write!(f, "unsupported event type '{kind}'"),
            Self::UnsupportedSubtype(subtype) => {
                write!(f, "unsupported message subtype '{subtype}'")
            }
            Self::Malformed(reason) => write!(f, "malformed event: {reason}"),
            Self::NotAddressed => write!(f, "not addressed to the bot"),
            Self::ThreadRootUnavailable => write!(f, "thread root unavailable"),
            Self::EmptyText => write!(f, "empty message"),
        }
    }
}

/// Verdict of the addressing filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    /// Answer the message.
    Respond,
    /// Ignore the message.
    Drop(DropReason),
    /// The verdict depends on the thread root; fetch it and call
    /// [`AddressingFilter::assess_with_root`].
    NeedsThreadRoot { channel: String, thread_ts: String },
}

/// Mention-based message filter.
#[derive(Debug, Clone)]
pub struct AddressingFilter {
    bot_user_id: String,
    token: String,
}

impl AddressingFilter {
    /// Creates a filter for the bot with the given user id.
    #[must_use]
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        let bot_user_id = bot_user_id.into();
        let token = mention(&bot_user_id);
        Self { bot_user_id, token }
    }

    /// The bot's user id.
    #[must_use]
    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    /// The mention token, `<@BOT_USER_ID>`.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns true if `text` carries the mention token.
    #[must_use]
    pub fn is_addressed(&self, text: &str) -> bool {
        text.contains(&self.token)
    }

    /// First-pass verdict for a message.
    #[must_use]
    pub fn assess(&self, message: &InboundMessage) -> Addressing {
        if message.from_bot || message.actor == self.bot_user_id {
            return Addressing::Drop(DropReason::FromBot);
        }

        if let Some(subtype) = &message.subtype
            && !USER_POST_SUBTYPES.contains(&subtype.as_str())
        {
            return Addressing::Drop(DropReason::UnsupportedSubtype(subtype.clone()));
        }

        match message.surface {
            SurfaceKind::Direct => Addressing::Respond,
            SurfaceKind::MultiParty => match &message.thread_ts {
                Some(thread_ts) if message.is_thread_reply() => Addressing::NeedsThreadRoot {
                    channel: message.channel.clone(),
                    thread_ts: thread_ts.clone(),
                },
                _ if self.is_addressed(&message.text) => Addressing::Respond,
                _ => Addressing::Drop(DropReason::NotAddressed),
            },
        }
    }

    /// Final verdict for a thread reply, given the outcome of fetching the
    /// thread root. A failed fetch counts as not addressed.
    #[must_use]
    pub fn assess_with_root(&self, root: Result<Option<String>, MessagingError>) -> Addressing {
        match root {
            Ok(Some(text)) if self.is_addressed(&text) => Addressing::Respond,
            Ok(_) => Addressing::Drop(DropReason::NotAddressed),
            Err(error) => {
                warn!(error = %error, "Failed to fetch thread root; ignoring message");
                Addressing::Drop(DropReason::ThreadRootUnavailable)
            }
        }
    }
}

/// Formats a user mention, `<@USER_ID>`.
#[must_use]
pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}
