//! Outbound reply delivery.

use crate::context::ReplyTarget;
use parley_integration::{DeliveryReceipt, MessagingApi};
use std::sync::Arc;
use tracing::{error, instrument};

/// Sends replies through the messaging API.
///
/// Delivery failures are logged and swallowed; there is no retry.
#[derive(Clone)]
pub struct ReplyDispatcher {
    messaging: Arc<dyn MessagingApi>,
}

impl ReplyDispatcher {
    /// Creates a new dispatcher.
    #[must_use]
    pub fn new(messaging: Arc<dyn MessagingApi>) -> Self {
        Self { messaging }
    }

    /// Posts `text` to `target`. Returns the receipt, or `None` if delivery failed.
    #[instrument(skip(self, text), fields(channel = %target.channel))]
    pub async fn send(&self, target: &ReplyTarget, text: &str) -> Option<DeliveryReceipt> {
        match self
            .messaging
            .post_message(&target.channel, text, target.thread_ts.as_deref())
            .await
        {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                error!(error = %e, thread_ts = ?target.thread_ts, "Failed to deliver reply");
                None
            }
        }
    }
}
