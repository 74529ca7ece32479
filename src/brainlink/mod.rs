//! BrainLink connection service.
//!
//! A BrainLink connection grants the application a per-user credential for
//! calling the hosted inference API on the user's behalf. The rest of the
//! application only sees the [`ConnectionService`] trait: one instance is
//! built at startup and shared through [`crate::AppState`].
//!
//! # Lifecycle
//!
//! ```text
//! uninitialized -> disconnected -> pending -> connected
//!                                         \-> failed
//! ```
//!
//! [`ConnectionService::initialize`] moves out of `uninitialized` and is safe
//! to call more than once. [`ConnectionService::start_code_exchange`] issues a
//! code and moves to `pending`; the callback page then redeems it with
//! [`ConnectionService::exchange_code_for_tokens`].

pub mod connection;
pub mod pkce;

pub use connection::{BrainLinkConnection, BrainLinkSettings, TokenSet};

use serde::Serialize;
use url::Url;

/// Where the connection currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// `initialize` has not run yet.
    Uninitialized,
    /// Initialized, no user connection.
    Disconnected,
    /// A code exchange was started and has not been redeemed.
    Pending,
    /// Tokens are held for the user.
    Connected,
    /// The last exchange or refresh was rejected.
    Failed,
}

/// Errors raised by the connection service.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection service used before initialize()")]
    NotInitialized,
    #[error("no active BrainLink connection")]
    NotConnected,
    #[error("invalid BrainLink URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Process-wide connection session.
#[async_trait::async_trait]
pub trait ConnectionService: Send + Sync {
    /// One-time setup. Later calls are no-ops.
    fn initialize(&self);

    /// Current lifecycle phase.
    fn phase(&self) -> ConnectionPhase;

    /// Whether a user connection is active.
    fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Connected
    }

    /// Access token for the connected user, refreshed if needed.
    async fn user_token(&self) -> Result<String, ConnectionError>;

    /// Redeem an authorization code. Returns whether tokens were stored.
    async fn exchange_code_for_tokens(&self, code: &str, state: &str) -> bool;

    /// Begin a code exchange and return the external connection page URL.
    fn start_code_exchange(&self) -> Result<Url, ConnectionError>;

    /// Drop any held tokens.
    fn disconnect(&self);
}
