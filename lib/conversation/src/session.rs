//! Conversation-to-session mapping.
//!
//! Each conversation key maps to at most one assistant session. The mapping
//! lives in memory and is written through to a [`KeyValueStore`] on every
//! change. Sessions the provider no longer knows are replaced in place; the
//! old history is not migrated.
//!
//! `ensure` calls for the same key are serialized so that concurrent events
//! from one conversation create a single session. Different keys never wait
//! on each other.

use crate::context::ConversationKey;
use crate::error::SessionError;
use crate::store::KeyValueStore;
use dashmap::DashMap;
use parley_ai::AssistantApi;
use parley_core::SessionId;
use rootcause::prelude::{Report, ResultExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Resolves and maintains the assistant session for each conversation.
pub struct SessionStore {
    api: Arc<dyn AssistantApi>,
    store: Arc<dyn KeyValueStore>,
    mappings: DashMap<ConversationKey, SessionId>,
    /// One lock per key ever ensured. Never pruned; grows with `mappings`.
    locks: DashMap<ConversationKey, Arc<Mutex<()>>>,
}

impl SessionStore {
    /// Creates an empty session store.
    #[must_use]
    pub fn new(api: Arc<dyn AssistantApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api,
            store,
            mappings: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Creates a session store seeded with every mapping persisted in `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn load(
        api: Arc<dyn AssistantApi>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, Report<SessionError>> {
        let entries = store.get_all().await.context(SessionError::Load)?;
        let sessions = Self::new(api, store);
        for (key, session_id) in entries {
            sessions.mappings.insert(
                ConversationKey::from_persisted(key),
                SessionId::new(session_id),
            );
        }
        info!(mappings = sessions.len(), "Loaded session mappings");
        Ok(sessions)
    }

    /// Number of known mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Returns true if no mappings are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Looks up the stored session for `key` without contacting the provider.
    #[must_use]
    pub fn resolve(&self, key: &ConversationKey) -> Option<SessionId> {
        self.mappings.get(key).map(|entry| entry.value().clone())
    }

    /// Returns a live session for `key`, creating one if there is none or the
    /// stored one has disappeared upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached to verify or create
    /// the session. The mapping is left unchanged in that case.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn ensure(&self, key: &ConversationKey) -> Result<SessionId, Report<SessionError>> {
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let _guard = lock.lock().await;

        if let Some(session_id) = self.resolve(key) {
            let live = self
                .api
                .get_session(&session_id)
                .await
                .context(SessionError::Verify {
                    key: key.clone(),
                    session_id: session_id.clone(),
                })?;

            if live.is_some() {
                debug!(session_id = %session_id, "Reusing session");
                return Ok(session_id);
            }
            info!(session_id = %session_id, "Stored session is gone; replacing it");
        }

        let session_id = self
            .api
            .create_session()
            .await
            .context(SessionError::Create { key: key.clone() })?;
        self.mappings.insert(key.clone(), session_id.clone());
        info!(session_id = %session_id, "Created session");

        if let Err(e) = self.store.set(key.as_str(), session_id.as_str()).await {
            error!(error = %e, "Failed to persist session mapping");
        }

        Ok(session_id)
    }
}
