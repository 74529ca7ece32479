//! BrainLink demo server
//!
//! Shows how to embed the BrainLink connection flow and a downstream LLM chat
//! call into a web application. The user connects their BrainLink account
//! once; the chat page then calls an OpenAI-compatible endpoint with the
//! user's own token.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server rendering HTML pages and a small JSON API
//! - **Connection**: injected [`brainlink::ConnectionService`], initialized once at startup
//! - **Chat**: per-conversation [`chat::ChatController`] behind an async mutex
//!
//! # Modules
//!
//! - [`brainlink`]: connection service trait and HTTP adapter
//! - [`callback`]: homepage / OAuth callback controller
//! - [`chat`]: chat controller and transcript
//! - [`llm`]: chat completion client
//! - [`session`]: in-memory conversation store

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::unused_async)]

pub mod brainlink;
pub mod callback;
pub mod chat;
pub mod config;
pub mod llm;
pub mod pages;
pub mod security;
pub mod server;
pub mod session;
pub mod telemetry;

use std::sync::Arc;

use crate::brainlink::ConnectionService;
use crate::callback::CallbackHandler;
use crate::config::AppConfig;
use crate::security::AppRateLimiter;
use crate::session::ConversationStore;

/// Application state shared across all handlers.
///
/// There is one BrainLink connection per process, not per browser: once a
/// visitor connects, every conversation on this server chats with that
/// user's token, and any visitor can disconnect it. This is a single-user
/// demo server.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide BrainLink connection.
    pub connection: Arc<dyn ConnectionService>,
    /// Homepage callback controller.
    pub callback: CallbackHandler,
    /// Live chat conversations.
    pub conversations: ConversationStore,
    /// Global Rate Limiter
    pub rate_limiter: Arc<AppRateLimiter>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire the shared state around an already-built connection service.
    #[must_use]
    pub fn new(config: Arc<AppConfig>, connection: Arc<dyn ConnectionService>) -> Self {
        let conversations = ConversationStore::new(Arc::clone(&connection), config.chat_settings());
        let rate_limiter = Arc::new(AppRateLimiter::new(
            config.resilience.requests_per_second,
            config.resilience.burst_size,
        ));

        Self {
            callback: CallbackHandler::new(Arc::clone(&connection)),
            connection,
            conversations,
            rate_limiter,
            config,
        }
    }
}
