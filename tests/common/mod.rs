#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use brainlink_demo::brainlink::{ConnectionError, ConnectionPhase, ConnectionService};
use brainlink_demo::chat::ChatSettings;
use url::Url;

/// In-memory connection service that records what it was asked to do.
#[derive(Debug)]
pub struct FakeConnection {
    phase: Mutex<ConnectionPhase>,
    token: Mutex<Option<String>>,
    exchanges: Mutex<Vec<(String, String)>>,
    initialize_calls: AtomicUsize,
    token_calls: AtomicUsize,
}

impl FakeConnection {
    /// Initialized but not connected.
    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self {
            phase: Mutex::new(ConnectionPhase::Disconnected),
            token: Mutex::new(None),
            exchanges: Mutex::new(Vec::new()),
            initialize_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
        })
    }

    /// Connected with `token`.
    pub fn connected(token: &str) -> Arc<Self> {
        let fake = Self::disconnected();
        fake.set_token(token);
        fake
    }

    pub fn set_token(&self, token: &str) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = ConnectionPhase::Connected;
    }

    /// Stay "connected" but fail every token lookup.
    pub fn break_token(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn exchanges(&self) -> Vec<(String, String)> {
        self.exchanges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionService for FakeConnection {
    fn initialize(&self) {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn phase(&self) -> ConnectionPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn user_token(&self) -> Result<String, ConnectionError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ConnectionError::NotConnected)
    }

    async fn exchange_code_for_tokens(&self, code: &str, state: &str) -> bool {
        self.exchanges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((code.to_string(), state.to_string()));
        true
    }

    fn start_code_exchange(&self) -> Result<Url, ConnectionError> {
        Ok(Url::parse("https://connect.example.test/authorize?state=fixed")?)
    }

    fn disconnect(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = ConnectionPhase::Disconnected;
    }
}

pub fn chat_settings(api_base_url: &str) -> ChatSettings {
    ChatSettings {
        api_base_url: api_base_url.to_string(),
        model: "test-model".to_string(),
        persist_user_messages: false,
    }
}
