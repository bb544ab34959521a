//! Inbound Slack events.
//!
//! The Events API wraps each event in an envelope. Only `event_callback`
//! envelopes carrying `message` events reach the relay; everything else is
//! answered or dropped at the edge.

use crate::addressing::DropReason;
use serde::{Deserialize, Serialize};

/// An Events API request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    /// Endpoint ownership check; the challenge must be echoed back.
    UrlVerification { challenge: String },
    /// A subscribed event.
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: SlackEvent,
    },
    /// Any other envelope type (rate-limit notices, app lifecycle).
    #[serde(other)]
    Unsupported,
}

/// The inner event of an `event_callback` envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: Option<String>,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub channel: Option<String>,
    pub channel_type: Option<String>,
    pub text: Option<String>,
    pub ts: Option<String>,
    pub thread_ts: Option<String>,
}

/// The venue a message was posted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// One-to-one conversation with the bot (`im`).
    Direct,
    /// Channel, private group or multi-person DM.
    MultiParty,
}

impl SurfaceKind {
    /// Classifies a Slack `channel_type`, falling back to the channel id
    /// prefix (`D…` ids are direct messages) when the type is absent.
    #[must_use]
    pub fn classify(channel_type: Option<&str>, channel: &str) -> Self {
        match channel_type {
            Some("im") => Self::Direct,
            Some(_) => Self::MultiParty,
            None if channel.starts_with('D') => Self::Direct,
            None => Self::MultiParty,
        }
    }
}

/// A normalized inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Author's user id (or bot id for bot posts without a user).
    pub actor: String,
    /// Channel the message was posted in.
    pub channel: String,
    /// Venue kind.
    pub surface: SurfaceKind,
    /// Raw message text, including any mention tokens.
    pub text: String,
    /// Timestamp id of the message.
    pub ts: String,
    /// Timestamp id of the thread root, when the message is in a thread.
    pub thread_ts: Option<String>,
    /// Message subtype, absent for ordinary user posts.
    pub subtype: Option<String>,
    /// Whether the message was posted by a bot integration.
    pub from_bot: bool,
}

impl InboundMessage {
    /// Returns true if this message is a reply inside an existing thread.
    #[must_use]
    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts
            .as_deref()
            .is_some_and(|thread_ts| thread_ts != self.ts)
    }
}

impl TryFrom<SlackEvent> for InboundMessage {
    type Error = DropReason;

    fn try_from(event: SlackEvent) -> Result<Self, Self::Error> {
        if event.kind != "message" {
            return Err(DropReason::UnsupportedEvent(event.kind));
        }

        let from_bot = event.bot_id.is_some() || event.subtype.as_deref() == Some("bot_message");
        let actor = event
            .user
            .or(event.bot_id)
            .ok_or(DropReason::Malformed("missing user"))?;
        let channel = event.channel.ok_or(DropReason::Malformed("missing channel"))?;
        let ts = event.ts.ok_or(DropReason::Malformed("missing ts"))?;
        let surface = SurfaceKind::classify(event.channel_type.as_deref(), &channel);

        Ok(Self {
            actor,
            channel,
            surface,
            text: event.text.unwrap_or_default(),
            ts,
            thread_ts: event.thread_ts,
            subtype: event.subtype,
            from_bot,
        })
    }
}
