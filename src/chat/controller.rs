//! Chat controller: prompt, transcript and the submit operation.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::brainlink::{ConnectionError, ConnectionService};
use crate::llm::{CompletionClient, Message};

use super::Transcript;

pub const NOT_CONNECTED_MESSAGE: &str = "Please connect BrainLink before chatting";
pub const EMPTY_PROMPT_MESSAGE: &str = "A prompt is required";
pub const NO_RESPONSE_FALLBACK: &str = "no response received from the model";
const REQUEST_ERROR_PREFIX: &str = "There was an error with your request";

/// Holds `is_loading` up until dropped, including when the submit future is
/// cancelled mid-request.
struct LoadingFlag<'a>(&'a mut bool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Model endpoint settings for the chat page.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Base URL of the OpenAI-compatible API.
    pub api_base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Also record the user's own turn in the transcript.
    pub persist_user_messages: bool,
}

/// Result of one [`ChatController::submit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No active connection; nothing was sent.
    NotConnected,
    /// The prompt was empty; nothing was sent.
    EmptyPrompt,
    /// The model answered and the reply was appended.
    Replied,
    /// Token retrieval or the completion request failed.
    Failed,
}

/// Serializable snapshot of a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatView {
    pub session_id: String,
    pub prompt: String,
    pub transcript: Transcript,
    pub reply: String,
    pub is_loading: bool,
    pub error_message: String,
}

/// State and behaviour behind the chat page.
pub struct ChatController {
    connection: Arc<dyn ConnectionService>,
    settings: ChatSettings,
    http: reqwest::Client,
    client: Option<CompletionClient>,
    prompt: String,
    transcript: Transcript,
    reply: String,
    is_loading: bool,
    error_message: String,
}

impl std::fmt::Debug for ChatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field("settings", &self.settings)
            .field("has_client", &self.client.is_some())
            .field("transcript_len", &self.transcript.len())
            .field("is_loading", &self.is_loading)
            .finish()
    }
}

impl ChatController {
    #[must_use]
    pub fn new(connection: Arc<dyn ConnectionService>, settings: ChatSettings) -> Self {
        Self::with_http(connection, settings, reqwest::Client::new())
    }

    /// Build a controller whose API clients share `http`.
    #[must_use]
    pub fn with_http(
        connection: Arc<dyn ConnectionService>,
        settings: ChatSettings,
        http: reqwest::Client,
    ) -> Self {
        Self {
            connection,
            settings,
            http,
            client: None,
            prompt: String::new(),
            transcript: Transcript::new(),
            reply: String::new(),
            is_loading: false,
            error_message: String::new(),
        }
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn reply(&self) -> &str {
        &self.reply
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    #[must_use]
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Drop the cached API client so the next submit builds a fresh one.
    pub fn invalidate_client(&mut self) {
        if self.client.take().is_some() {
            debug!(name: "chat.client.invalidated", "Cached API client dropped");
        }
    }

    #[must_use]
    pub fn view(&self, session_id: &str) -> ChatView {
        ChatView {
            session_id: session_id.to_string(),
            prompt: self.prompt.clone(),
            transcript: self.transcript.clone(),
            reply: self.reply.clone(),
            is_loading: self.is_loading,
            error_message: self.error_message.clone(),
        }
    }

    /// Send the pending prompt, with the transcript as context, to the model.
    ///
    /// `is_loading` is false again whenever this returns.
    pub async fn submit(&mut self) -> SubmitOutcome {
        if !self.connection.is_connected() {
            self.error_message = NOT_CONNECTED_MESSAGE.to_string();
            return SubmitOutcome::NotConnected;
        }

        let client = match self.ensure_client().await {
            Ok(client) => client,
            Err(e) => {
                warn!(name: "chat.token.failed", error = %e, "Could not obtain user token");
                let detail = serde_json::json!({ "kind": "connection", "message": e.to_string() });
                self.error_message = format!("{REQUEST_ERROR_PREFIX} {detail}");
                return SubmitOutcome::Failed;
            }
        };

        self.error_message.clear();
        let loading = LoadingFlag::raise(&mut self.is_loading);

        if self.prompt.is_empty() {
            self.error_message = EMPTY_PROMPT_MESSAGE.to_string();
            return SubmitOutcome::EmptyPrompt;
        }

        let user_message = Message::user(self.prompt.clone());
        let outbound = self.transcript.outbound_with(user_message.clone());

        info!(
            name: "chat.submit",
            model = %self.settings.model,
            messages = outbound.len(),
            "Sending chat completion"
        );

        let result = client.create(&self.settings.model, &outbound).await;
        drop(loading);

        match result {
            Ok(completion) => {
                let content = completion
                    .first_content()
                    .unwrap_or(NO_RESPONSE_FALLBACK)
                    .to_string();
                self.reply.clone_from(&content);
                if self.settings.persist_user_messages {
                    self.transcript.push(user_message);
                }
                self.transcript.push(Message::assistant(content));
                SubmitOutcome::Replied
            }
            Err(e) => {
                warn!(name: "chat.completion.failed", error = %e, "Chat completion failed");
                self.error_message = format!("{REQUEST_ERROR_PREFIX} {}", e.to_json());
                SubmitOutcome::Failed
            }
        }
    }

    async fn ensure_client(&mut self) -> Result<CompletionClient, ConnectionError> {
        let token = self.connection.user_token().await?;

        if let Some(client) = &self.client {
            if client.token() == token {
                return Ok(client.clone());
            }
            debug!(name: "chat.client.token_changed", "User token changed, rebuilding client");
        }

        let client = CompletionClient::with_http(
            self.http.clone(),
            self.settings.api_base_url.clone(),
            token,
        );
        info!(
            name: "chat.client.created",
            base_url = %self.settings.api_base_url,
            "API client created"
        );
        self.client = Some(client.clone());
        Ok(client)
    }
}
