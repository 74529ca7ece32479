//! Non-streaming client for the `/chat/completions` endpoint.

use serde::{Deserialize, Serialize};

use super::Message;

/// Errors returned by [`CompletionClient::create`].
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint answered with a non-success status.
    #[error("chat completion returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body was not a chat completion.
    #[error("invalid chat completion payload: {0}")]
    Decode(#[source] reqwest::Error),
}

impl CompletionError {
    /// JSON rendering of the error, shown verbatim on the chat page.
    #[must_use]
    pub fn to_json(&self) -> String {
        let value = match self {
            Self::Transport { url, source } => serde_json::json!({
                "kind": "transport",
                "url": url,
                "message": source.to_string(),
            }),
            Self::Status { status, body } => serde_json::json!({
                "kind": "status",
                "status": status,
                "body": serde_json::from_str::<serde_json::Value>(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.clone())),
            }),
            Self::Decode(source) => serde_json::json!({
                "kind": "decode",
                "message": source.to_string(),
            }),
        };
        value.to_string()
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

/// Response body of a chat completion. Only the fields the app reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Content of the first choice, if it is present and non-empty.
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()?
            .message
            .as_ref()?
            .content
            .as_deref()
            .filter(|content| !content.is_empty())
    }
}

/// Bearer-authenticated client bound to one base URL and one user token.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CompletionClient {
    /// Create a client with its own connection pool.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, token)
    }

    /// Create a client sharing an existing connection pool.
    #[must_use]
    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Token this client authenticates with.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Full URL of the completions endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Issue one non-streaming completion request.
    pub async fn create(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ChatCompletion, CompletionError> {
        let url = self.endpoint();
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&ChatCompletionRequest { model, messages })
            .send()
            .await
            .map_err(|source| CompletionError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ChatCompletion>()
            .await
            .map_err(CompletionError::Decode)
    }
}
