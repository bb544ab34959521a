//! The relay engine.
//!
//! [`Relay::handle_event`] takes one inbound event through the whole
//! pipeline:
//!
//! ```text
//! event -> addressing filter -> conversation key -> session
//!       -> assistant run -> search escalation -> reply
//! ```
//!
//! Every event runs in its own span carrying an invocation id. Failures are
//! logged and end the event; nothing propagates to the caller.

use crate::addressing::{Addressing, AddressingFilter, DropReason, mention};
use crate::context::{ContextResolver, strip_addressing_token};
use crate::dispatch::ReplyDispatcher;
use crate::error::RelayError;
use crate::event::{InboundMessage, SlackEvent};
use crate::session::SessionStore;
use parley_ai::{RunOrchestrator, SearchEscalator};
use parley_core::InvocationId;
use parley_integration::{DeliveryReceipt, MessagingApi};
use rootcause::prelude::ResultExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

/// Sent in place of an answer when web-search escalation fails.
pub const DEFAULT_APOLOGY: &str =
    "Sorry, I couldn't look that up right now. Please try again in a little while.";

/// Relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// The bot's own user id; its mention token addresses the bot.
    pub bot_user_id: String,
    /// Reply used when escalation fails.
    pub apology_message: String,
}

impl RelayConfig {
    /// Creates a configuration with the default apology.
    #[must_use]
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            apology_message: DEFAULT_APOLOGY.to_string(),
        }
    }
}

/// How an event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event did not warrant a reply.
    Dropped(DropReason),
    /// The assistant's answer was delivered.
    Replied(DeliveryReceipt),
    /// Escalation failed and the apology was delivered.
    ApologySent(DeliveryReceipt),
    /// The event warranted a reply but none was delivered.
    NoReply,
}

/// Relays chat messages to the assistant and posts its answers.
pub struct Relay {
    filter: AddressingFilter,
    messaging: Arc<dyn MessagingApi>,
    sessions: Arc<SessionStore>,
    runs: RunOrchestrator,
    escalator: SearchEscalator,
    dispatcher: ReplyDispatcher,
    apology_message: String,
    tasks: TaskTracker,
}

impl Relay {
    /// Creates a relay.
    #[must_use]
    pub fn new(
        config: RelayConfig,
        messaging: Arc<dyn MessagingApi>,
        sessions: Arc<SessionStore>,
        runs: RunOrchestrator,
        escalator: SearchEscalator,
    ) -> Self {
        Self {
            filter: AddressingFilter::new(config.bot_user_id),
            dispatcher: ReplyDispatcher::new(Arc::clone(&messaging)),
            messaging,
            sessions,
            runs,
            escalator,
            apology_message: config.apology_message,
            tasks: TaskTracker::new(),
        }
    }

    /// The session store backing this relay.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handles one inbound event to completion.
    pub async fn handle_event(&self, event: SlackEvent) -> EventOutcome {
        let span = info_span!(
            "relay_event",
            invocation_id = %InvocationId::new(),
            conversation_key = tracing::field::Empty,
        );
        self.process(event).instrument(span).await
    }

    /// Handles an event on its own task.
    ///
    /// The task is tracked so [`Relay::drain`] can wait for it.
    pub fn spawn_event(self: &Arc<Self>, event: SlackEvent) -> JoinHandle<EventOutcome> {
        let relay = Arc::clone(self);
        self.tasks.spawn(async move { relay.handle_event(event).await })
    }

    /// Number of spawned events still in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Waits up to `grace` for in-flight events to finish.
    ///
    /// Returns true if every event finished. Events spawned after this call
    /// are still tracked.
    pub async fn drain(&self, grace: Duration) -> bool {
        let pending = self.tasks.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight events");
        }

        self.tasks.close();
        let finished = tokio::time::timeout(grace, self.tasks.wait()).await.is_ok();
        self.tasks.reopen();

        if !finished {
            warn!(
                pending = self.tasks.len(),
                "In-flight events abandoned; their replies will not be sent"
            );
        }
        finished
    }

    async fn process(&self, event: SlackEvent) -> EventOutcome {
        let message = match InboundMessage::try_from(event) {
            Ok(message) => message,
            Err(reason) => return Self::dropped(reason),
        };

        let verdict = match self.filter.assess(&message) {
            Addressing::NeedsThreadRoot { channel, thread_ts } => {
                let root = self.messaging.fetch_thread_root(&channel, &thread_ts).await;
                self.filter.assess_with_root(root)
            }
            verdict => verdict,
        };
        match verdict {
            Addressing::Respond => {}
            Addressing::Drop(reason) => return Self::dropped(reason),
            Addressing::NeedsThreadRoot { .. } => {
                return Self::dropped(DropReason::ThreadRootUnavailable);
            }
        }

        let question = strip_addressing_token(&message.text, self.filter.bot_user_id());
        if question.is_empty() {
            return Self::dropped(DropReason::EmptyText);
        }

        let key = ContextResolver::key(&message);
        let target = ContextResolver::reply_target(&message);
        Span::current().record("conversation_key", key.as_str());
        info!(actor = %message.actor, channel = %message.channel, "Handling message");

        let session_id = match self
            .sessions
            .ensure(&key)
            .await
            .context(RelayError::SessionUnavailable { key: key.clone() })
        {
            Ok(session_id) => session_id,
            Err(report) => {
                error!(error = %report, "Dropping message without a session");
                return EventOutcome::NoReply;
            }
        };

        let reply = match self
            .runs
            .execute(&session_id, &question, &mention(&message.actor))
            .await
            .context(RelayError::RunFailed { key: key.clone() })
        {
            Ok(reply) => reply,
            Err(report) => {
                error!(error = %report, session_id = %session_id, "Assistant produced no reply");
                return EventOutcome::NoReply;
            }
        };

        let answer = match self
            .escalator
            .transform(reply, &question)
            .await
            .context(RelayError::EscalationFailed { key: key.clone() })
        {
            Ok(answer) => answer,
            Err(report) => {
                error!(error = %report, "Sending apology instead of an answer");
                return match self.dispatcher.send(&target, &self.apology_message).await {
                    Some(receipt) => EventOutcome::ApologySent(receipt),
                    None => EventOutcome::NoReply,
                };
            }
        };

        match self.dispatcher.send(&target, &answer).await {
            Some(receipt) => {
                info!(ts = %receipt.ts, "Reply delivered");
                EventOutcome::Replied(receipt)
            }
            None => EventOutcome::NoReply,
        }
    }

    fn dropped(reason: DropReason) -> EventOutcome {
        debug!(reason = %reason, "Dropping event");
        EventOutcome::Dropped(reason)
    }
}
