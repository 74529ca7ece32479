use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Path, Query, RawQuery, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::brainlink::{BrainLinkConnection, ConnectionPhase, ConnectionService};
use crate::callback::CallbackParams;
use crate::chat::ChatView;
use crate::config::AppConfig;
use crate::llm::Message;
use crate::pages;
use crate::security;

/// How often idle conversations are swept.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    info!(
        name: "brainlink.config.loaded",
        client_id = %config.brainlink.client_id,
        api_base_url = %config.brainlink.api_base_url,
        model = %config.chat.model,
        "BrainLink configuration loaded"
    );

    // Connection service: built and initialized once per process
    let connection: Arc<dyn ConnectionService> =
        Arc::new(BrainLinkConnection::new(config.brainlink_settings()));
    connection.initialize();

    let state = AppState::new(Arc::clone(&config), connection);

    let conversations = state.conversations.clone();
    let idle_timeout = Duration::from_secs(config.server.conversation_timeout_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = conversations.cleanup_expired_with_timeout(idle_timeout);
            if removed > 0 {
                info!(name: "session.cleanup", removed, "Dropped idle conversations");
            }
        }
    });

    let app = build_app(state)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the router with all routes and middleware.
pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let config = Arc::clone(&state.config);

    // Timeout configuration
    let timeout_duration = if config.resilience.timeout_disabled {
        Duration::from_secs(365 * 24 * 60 * 60) // 1 year
    } else {
        Duration::from_secs(config.resilience.request_timeout_secs)
    };

    let app = Router::new()
        // HTML pages
        .route("/", get(index_handler))
        .route("/connect", get(connect_handler))
        .route("/disconnect", post(disconnect_handler))
        .route("/chat", get(chat_page_handler).post(chat_submit_handler))
        // API routes
        .route("/api/chat", post(api_chat))
        .route("/api/sessions/{id}/messages", get(api_get_messages))
        .route("/api/connection", get(api_connection))
        .route("/api/connection/disconnect", post(api_disconnect))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            security::rate_limit_middleware,
        ))
        .layer(security::csp_layer(&config.security.csp_script_origin)?)
        .with_state(state);

    Ok(app)
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET / - Homepage and OAuth callback target.
async fn index_handler(State(state): State<AppState>, RawQuery(query): RawQuery) -> Html<String> {
    let params = CallbackParams::from_query(query.as_deref());
    state.callback.on_page_load(&params).await;
    Html(pages::home_page())
}

/// GET /connect - Start the code exchange and send the browser away.
async fn connect_handler(State(state): State<AppState>) -> Response {
    match state.callback.start_code_exchange() {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            tracing::error!(name: "brainlink.connect.failed", error = %e, "Could not start code exchange");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(pages::connect_error_page(&e.to_string())),
            )
                .into_response()
        }
    }
}

/// POST /disconnect - Drop the connection and return to the chat page.
async fn disconnect_handler(State(state): State<AppState>) -> Redirect {
    disconnect(&state).await;
    Redirect::to("/chat")
}

/// Query parameters for the chat page.
#[derive(Debug, Deserialize)]
struct ChatPageQuery {
    #[serde(default)]
    session_id: Option<String>,
}

/// GET /chat - Chat page for a new or existing conversation.
async fn chat_page_handler(
    State(state): State<AppState>,
    Query(query): Query<ChatPageQuery>,
) -> Html<String> {
    let conversation = state.conversations.get_or_create(query.session_id.as_deref());
    let view = conversation.view().await;
    Html(render_chat_page(&state, &view))
}

/// POST /chat - Form submit from the chat page.
async fn chat_submit_handler(
    State(state): State<AppState>,
    Form(req): Form<ChatRequest>,
) -> Html<String> {
    let view = submit(&state, req).await;
    Html(render_chat_page(&state, &view))
}

fn render_chat_page(state: &AppState, view: &ChatView) -> String {
    pages::chat_page(
        view,
        &state.config.brainlink.client_id,
        state.connection.is_connected(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat submits (form or JSON).
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// Conversation to continue (creates new if missing).
    #[serde(default)]
    session_id: Option<String>,
    /// Prompt text.
    #[serde(default)]
    prompt: String,
}

/// Connection status for API responses.
#[derive(Debug, Serialize)]
struct ConnectionStatus {
    connected: bool,
    phase: ConnectionPhase,
}

async fn submit(state: &AppState, req: ChatRequest) -> ChatView {
    let conversation = state.conversations.get_or_create(req.session_id.as_deref());
    let mut controller = conversation.lock().await;
    controller.set_prompt(req.prompt);
    let outcome = controller.submit().await;
    tracing::debug!(
        name: "chat.submit.finished",
        session_id = %conversation.id(),
        outcome = ?outcome,
        "Submit finished"
    );
    controller.view(conversation.id())
}

async fn disconnect(state: &AppState) {
    state.connection.disconnect();
    state.conversations.invalidate_clients().await;
}

fn connection_status(state: &AppState) -> ConnectionStatus {
    ConnectionStatus {
        connected: state.connection.is_connected(),
        phase: state.connection.phase(),
    }
}

/// POST /api/chat - Submit a prompt and get the conversation back.
async fn api_chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Json<ChatView> {
    Json(submit(&state, req).await)
}

/// GET /api/sessions/:id/messages - Get conversation transcript.
async fn api_get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, StatusCode> {
    match state.conversations.get(&id) {
        Some(conversation) => {
            let controller = conversation.lock().await;
            Ok(Json(controller.transcript().messages().to_vec()))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /api/connection - Current connection status.
async fn api_connection(State(state): State<AppState>) -> Json<ConnectionStatus> {
    Json(connection_status(&state))
}

/// POST /api/connection/disconnect - Drop the connection.
async fn api_disconnect(State(state): State<AppState>) -> Json<ConnectionStatus> {
    disconnect(&state).await;
    Json(connection_status(&state))
}

async fn health() -> &'static str {
    "ok"
}
