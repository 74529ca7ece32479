//! HTTP-backed [`ConnectionService`] using an authorization-code + PKCE grant.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::pkce::{generate_pkce_pair, generate_state};
use super::{ConnectionError, ConnectionPhase, ConnectionService};

/// Tokens are treated as expired this long before their stated expiry.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Unredeemed code exchanges older than this are dropped.
const PENDING_TTL_SECS: i64 = 10 * 60;

/// Most unredeemed code exchanges held at once; the oldest is evicted first.
const MAX_PENDING: usize = 256;

/// Endpoints and client identity for the BrainLink connection.
#[derive(Debug, Clone)]
pub struct BrainLinkSettings {
    /// Application client id shown on the connect button.
    pub client_id: String,
    /// External page the user is sent to for approval.
    pub connect_url: String,
    /// Token endpoint for code redemption and refresh.
    pub token_url: String,
    /// Callback URL registered for this application.
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Tokens held for the connected user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response
                .expires_in
                .map(|secs| now + Duration::seconds(secs)),
        }
    }

    /// Whether the access token should no longer be used at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| now + Duration::seconds(EXPIRY_SKEW_SECS) >= at)
    }
}

#[derive(Debug)]
struct PendingExchange {
    verifier: String,
    issued_at: DateTime<Utc>,
}

impl PendingExchange {
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at >= Duration::seconds(PENDING_TTL_SECS)
    }
}

#[derive(Debug)]
struct ConnectionState {
    phase: ConnectionPhase,
    /// state -> PKCE verifier for exchanges not yet redeemed.
    pending: HashMap<String, PendingExchange>,
    tokens: Option<TokenSet>,
}

impl ConnectionState {
    /// Drop stale exchanges and make room for one more.
    fn prune_pending(&mut self, now: DateTime<Utc>) {
        self.pending.retain(|_, exchange| !exchange.is_stale(now));

        while self.pending.len() >= MAX_PENDING {
            let oldest = self
                .pending
                .iter()
                .min_by_key(|(_, exchange)| exchange.issued_at)
                .map(|(state, _)| state.clone());
            match oldest {
                Some(state) => {
                    self.pending.remove(&state);
                }
                None => break,
            }
        }
    }
}

/// Connection service talking to the BrainLink authorization server.
#[derive(Debug)]
pub struct BrainLinkConnection {
    http: reqwest::Client,
    settings: BrainLinkSettings,
    state: Mutex<ConnectionState>,
}

impl BrainLinkConnection {
    #[must_use]
    pub fn new(settings: BrainLinkSettings) -> Self {
        Self::with_http(reqwest::Client::new(), settings)
    }

    #[must_use]
    pub fn with_http(http: reqwest::Client, settings: BrainLinkSettings) -> Self {
        Self {
            http,
            settings,
            state: Mutex::new(ConnectionState {
                phase: ConnectionPhase::Uninitialized,
                pending: HashMap::new(),
                tokens: None,
            }),
        }
    }

    /// Snapshot of the held tokens.
    #[must_use]
    pub fn tokens(&self) -> Option<TokenSet> {
        self.lock().tokens.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ConnectionError> {
        let response = self
            .http
            .post(&self.settings.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(ConnectionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<TokenResponse>().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, ConnectionError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];

        match self.request_tokens(&form).await {
            Ok(response) => {
                let mut tokens = TokenSet::from_response(response, Utc::now());
                if tokens.refresh_token.is_none() {
                    tokens.refresh_token = Some(refresh_token.to_string());
                }
                let access = tokens.access_token.clone();
                let mut state = self.lock();
                state.tokens = Some(tokens);
                state.phase = ConnectionPhase::Connected;
                debug!(name: "brainlink.token.refreshed", "Access token refreshed");
                Ok(access)
            }
            Err(e) => {
                warn!(name: "brainlink.token.refresh_failed", error = %e, "Token refresh failed");
                let mut state = self.lock();
                state.tokens = None;
                state.phase = ConnectionPhase::Failed;
                Err(e)
            }
        }
    }
}

#[async_trait::async_trait]
impl ConnectionService for BrainLinkConnection {
    fn initialize(&self) {
        let mut state = self.lock();
        if state.phase != ConnectionPhase::Uninitialized {
            debug!(name: "brainlink.initialize.skipped", "Connection service already initialized");
            return;
        }
        state.phase = ConnectionPhase::Disconnected;
        info!(
            name: "brainlink.initialized",
            client_id = %self.settings.client_id,
            "BrainLink connection service initialized"
        );
    }

    fn phase(&self) -> ConnectionPhase {
        self.lock().phase
    }

    fn is_connected(&self) -> bool {
        let state = self.lock();
        state.phase == ConnectionPhase::Connected && state.tokens.is_some()
    }

    async fn user_token(&self) -> Result<String, ConnectionError> {
        let refresh_token = {
            let mut state = self.lock();
            let Some(tokens) = &state.tokens else {
                return Err(ConnectionError::NotConnected);
            };
            if !tokens.is_expired(Utc::now()) {
                return Ok(tokens.access_token.clone());
            }
            match tokens.refresh_token.clone() {
                Some(refresh) => refresh,
                None => {
                    state.tokens = None;
                    state.phase = ConnectionPhase::Disconnected;
                    return Err(ConnectionError::NotConnected);
                }
            }
        };

        self.refresh(&refresh_token).await
    }

    async fn exchange_code_for_tokens(&self, code: &str, state: &str) -> bool {
        let verifier = self
            .lock()
            .pending
            .remove(state)
            .filter(|exchange| !exchange.is_stale(Utc::now()))
            .map(|exchange| exchange.verifier);
        let Some(verifier) = verifier else {
            warn!(
                name: "brainlink.exchange.unknown_state",
                "Ignoring code exchange for an unknown or expired state value"
            );
            return false;
        };

        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", verifier.as_str()),
        ];

        match self.request_tokens(&form).await {
            Ok(response) => {
                let mut guard = self.lock();
                guard.tokens = Some(TokenSet::from_response(response, Utc::now()));
                guard.phase = ConnectionPhase::Connected;
                info!(name: "brainlink.exchange.succeeded", "BrainLink connected");
                true
            }
            Err(e) => {
                warn!(name: "brainlink.exchange.failed", error = %e, "Code exchange failed");
                self.lock().phase = ConnectionPhase::Failed;
                false
            }
        }
    }

    fn start_code_exchange(&self) -> Result<Url, ConnectionError> {
        let mut state = self.lock();
        if state.phase == ConnectionPhase::Uninitialized {
            return Err(ConnectionError::NotInitialized);
        }

        let pkce = generate_pkce_pair();
        let exchange_state = generate_state();

        let mut url = Url::parse(&self.settings.connect_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &exchange_state);

        let now = Utc::now();
        state.prune_pending(now);
        state.pending.insert(
            exchange_state,
            PendingExchange {
                verifier: pkce.verifier,
                issued_at: now,
            },
        );
        if state.phase != ConnectionPhase::Connected {
            state.phase = ConnectionPhase::Pending;
        }

        debug!(name: "brainlink.exchange.started", "Code exchange started");
        Ok(url)
    }

    fn disconnect(&self) {
        let mut state = self.lock();
        state.tokens = None;
        state.pending.clear();
        state.phase = ConnectionPhase::Disconnected;
        info!(name: "brainlink.disconnected", "BrainLink disconnected");
    }
}
