//! Callback page controller.
//!
//! The homepage doubles as the OAuth-style redirect target: when the user
//! comes back from the BrainLink connection page the URL carries `code` and
//! `state`, which are redeemed once for tokens.

use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use crate::brainlink::{ConnectionError, ConnectionService};

/// `code` and `state` from the page query string. Missing values are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

impl CallbackParams {
    #[must_use]
    pub fn new(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: state.into(),
        }
    }

    /// Parse a raw query string. The first occurrence of each key wins.
    #[must_use]
    pub fn from_query(raw: Option<&str>) -> Self {
        let mut code = None;
        let mut state = None;
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "code" if code.is_none() => code = Some(value.into_owned()),
                "state" if state.is_none() => state = Some(value.into_owned()),
                _ => {}
            }
        }
        Self {
            code: code.unwrap_or_default(),
            state: state.unwrap_or_default(),
        }
    }

    /// Both values are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.code.is_empty() && !self.state.is_empty()
    }
}

/// What a page load did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// `code` or `state` was missing; nothing was sent.
    Skipped,
    /// One exchange was issued. `accepted` is not shown to the user.
    Exchanged { accepted: bool },
}

#[derive(Clone)]
pub struct CallbackHandler {
    connection: Arc<dyn ConnectionService>,
}

impl std::fmt::Debug for CallbackHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandler")
            .field("phase", &self.connection.phase())
            .finish()
    }
}

impl CallbackHandler {
    #[must_use]
    pub fn new(connection: Arc<dyn ConnectionService>) -> Self {
        Self { connection }
    }

    /// Run the page-load effect: make sure the service is initialized, then
    /// redeem `code`/`state` if both are present.
    pub async fn on_page_load(&self, params: &CallbackParams) -> CallbackOutcome {
        self.connection.initialize();

        if !params.is_complete() {
            debug!(name: "callback.skipped", "No code/state on page load");
            return CallbackOutcome::Skipped;
        }

        let accepted = self
            .connection
            .exchange_code_for_tokens(&params.code, &params.state)
            .await;
        info!(name: "callback.exchange", accepted, "Code exchange finished");
        CallbackOutcome::Exchanged { accepted }
    }

    /// Where the "Get Access Token" button sends the browser.
    pub fn start_code_exchange(&self) -> Result<Url, ConnectionError> {
        self.connection.start_code_exchange()
    }
}
