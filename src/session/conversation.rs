//! Conversation handles and their store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::brainlink::ConnectionService;
use crate::chat::{ChatController, ChatSettings, ChatView};

/// One chat conversation.
///
/// The controller sits behind an async mutex, so submits on the same
/// conversation run one after another.
#[derive(Debug)]
pub struct Conversation {
    id: String,
    controller: Mutex<ChatController>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl Conversation {
    fn new(id: String, controller: ChatController) -> Self {
        Self {
            id,
            controller: Mutex::new(controller),
            last_activity: RwLock::new(Utc::now()),
        }
    }

    /// Get the conversation ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Exclusive access to the controller. Waits for any in-flight submit.
    pub async fn lock(&self) -> MutexGuard<'_, ChatController> {
        self.touch();
        self.controller.lock().await
    }

    /// Snapshot of the conversation.
    pub async fn view(&self) -> ChatView {
        self.lock().await.view(&self.id)
    }

    fn touch(&self) {
        *self
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }

    /// Check if the conversation has been idle longer than `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        let last = *self
            .last_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match (Utc::now() - last).to_std() {
            Ok(idle) => idle > timeout,
            // Negative duration means clock skew.
            Err(_) => false,
        }
    }
}

/// Thread-safe store for conversations.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    conversations: RwLock<HashMap<String, Arc<Conversation>>>,
    connection: Arc<dyn ConnectionService>,
    settings: ChatSettings,
    http: reqwest::Client,
}

impl std::fmt::Debug for StoreInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInner")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ConversationStore {
    /// Create an empty store whose conversations share `connection`.
    #[must_use]
    pub fn new(connection: Arc<dyn ConnectionService>, settings: ChatSettings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                conversations: RwLock::new(HashMap::new()),
                connection,
                settings,
                http: reqwest::Client::new(),
            }),
        }
    }

    /// Create a new conversation and return it.
    #[must_use]
    pub fn create(&self) -> Arc<Conversation> {
        self.create_with_id(Uuid::new_v4().to_string())
    }

    /// Create a new conversation with a specific ID, replacing any existing one.
    #[must_use]
    pub fn create_with_id(&self, id: impl Into<String>) -> Arc<Conversation> {
        let id = id.into();
        let conversation = self.build(id.clone());
        self.inner
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&conversation));
        conversation
    }

    fn build(&self, id: String) -> Arc<Conversation> {
        let controller = ChatController::with_http(
            Arc::clone(&self.inner.connection),
            self.inner.settings.clone(),
            self.inner.http.clone(),
        );
        Arc::new(Conversation::new(id, controller))
    }

    /// Get a conversation by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Conversation>> {
        self.inner
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Look up `id`, creating the conversation if it is missing or blank.
    #[must_use]
    pub fn get_or_create(&self, id: Option<&str>) -> Arc<Conversation> {
        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            return self.create();
        };

        if let Some(existing) = self.get(id) {
            return existing;
        }

        // Re-check under the write lock so concurrent first requests share one conversation.
        let mut conversations = self
            .inner
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            conversations
                .entry(id.to_string())
                .or_insert_with(|| self.build(id.to_string())),
        )
    }

    /// Remove a conversation by ID.
    pub fn remove(&self, id: &str) -> Option<Arc<Conversation>> {
        self.inner
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Get the number of live conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if there are no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached API client, e.g. after the user disconnects.
    pub async fn invalidate_clients(&self) {
        let conversations: Vec<Arc<Conversation>> = self
            .inner
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for conversation in conversations {
            conversation.controller.lock().await.invalidate_client();
        }
    }

    /// Remove conversations that have been idle longer than `timeout`.
    ///
    /// Returns the number of conversations removed.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut guard = self
            .inner
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, conversation| !conversation.is_expired_with_timeout(timeout));
        before - guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brainlink::{ConnectionError, ConnectionPhase};

    struct Offline;

    #[async_trait::async_trait]
    impl ConnectionService for Offline {
        fn initialize(&self) {}

        fn phase(&self) -> ConnectionPhase {
            ConnectionPhase::Disconnected
        }

        async fn user_token(&self) -> Result<String, ConnectionError> {
            Err(ConnectionError::NotConnected)
        }

        async fn exchange_code_for_tokens(&self, _code: &str, _state: &str) -> bool {
            false
        }

        fn start_code_exchange(&self) -> Result<url::Url, ConnectionError> {
            Err(ConnectionError::NotInitialized)
        }

        fn disconnect(&self) {}
    }

    fn store() -> ConversationStore {
        ConversationStore::new(
            Arc::new(Offline),
            ChatSettings {
                api_base_url: "http://127.0.0.1:9".to_string(),
                model: "test-model".to_string(),
                persist_user_messages: false,
            },
        )
    }

    #[test]
    fn test_conversation_store() {
        let store = store();
        assert!(store.is_empty());

        let conversation = store.create();
        assert_eq!(store.len(), 1);

        let retrieved = store.get(conversation.id()).unwrap();
        assert_eq!(retrieved.id(), conversation.id());

        store.remove(conversation.id());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_or_create_reuses_and_creates() {
        let store = store();
        let first = store.get_or_create(None);
        let again = store.get_or_create(Some(first.id()));
        assert!(Arc::ptr_eq(&first, &again));

        let blank = store.get_or_create(Some("  "));
        assert_ne!(blank.id(), first.id());

        let named = store.get_or_create(Some("abc"));
        assert_eq!(named.id(), "abc");
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_concurrent_get_or_create_shares_one_conversation() {
        let store = store();
        let barrier = std::sync::Barrier::new(8);

        let conversations: Vec<Arc<Conversation>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        store.get_or_create(Some("shared"))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(store.len(), 1);
        let stored = store.get("shared").unwrap();
        for conversation in &conversations {
            assert!(Arc::ptr_eq(conversation, &stored));
        }
    }

    #[test]
    fn test_cleanup_expired() {
        let store = store();
        let _ = store.create();
        assert_eq!(store.cleanup_expired_with_timeout(Duration::from_secs(60)), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.cleanup_expired_with_timeout(Duration::ZERO), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_view_carries_id() {
        let store = store();
        let conversation = store.create_with_id("fixed");
        conversation.lock().await.set_prompt("draft");
        let view = conversation.view().await;
        assert_eq!(view.session_id, "fixed");
        assert_eq!(view.prompt, "draft");
        assert!(view.transcript.is_empty());
    }
}
