//! Server-rendered HTML pages.
//!
//! Pages are plain HTML strings. The chat form degrades to a normal form post;
//! when htmx is available it swaps only the chat panel and shows the loading
//! indicator while the request is in flight.

use std::fmt::Write as _;

use crate::chat::ChatView;
use crate::llm::MessageRole;

const HTMX_SRC: &str = "https://unpkg.com/htmx.org@2.0.4";
const EXAMPLES_URL: &str = "https://github.com/miguelaeh/brainlink-examples";

/// Escape text for use inside HTML element content or quoted attributes.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Generate the HTML shell for the application.
#[must_use]
pub fn html_shell(title: &str, content: &str) -> String {
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} - BrainLink Demo</title>
    <script src="{HTMX_SRC}"></script>
    <style>
        .htmx-indicator {{ display: none; }}
        .htmx-request .htmx-indicator, .htmx-request.htmx-indicator {{ display: flex; }}
    </style>
</head>
<body>
    <header>
        <nav>
            <a href="/">Home</a>
            <a href="/chat">Chat</a>
        </nav>
    </header>
    <main id="app">
        {content}
    </main>
</body>
</html>"#
    )
}

/// Connect widget, configured with the application client id.
#[must_use]
pub fn connect_button(client_id: &str, connected: bool) -> String {
    let client_id = escape_html(client_id);
    if connected {
        format!(
            r#"<div class="brainlink-button" data-client-id="{client_id}">
            <span class="brainlink-status">BrainLink connected</span>
            <form method="post" action="/disconnect"><button type="submit">Disconnect</button></form>
        </div>"#
        )
    } else {
        format!(
            r#"<div class="brainlink-button" data-client-id="{client_id}">
            <a href="/connect" class="brainlink-connect">Connect BrainLink</a>
        </div>"#
        )
    }
}

/// Homepage / OAuth callback target.
#[must_use]
pub fn home_page() -> String {
    let content = r#"
    <div class="home">
        <form method="get" action="/connect">
            <button type="submit">Get Access Token</button>
        </form>
    </div>
    "#;
    html_shell("Home", content)
}

/// Page shown when the connection flow cannot be started.
#[must_use]
pub fn connect_error_page(message: &str) -> String {
    let content = format!(
        r#"<div class="error"><p>Could not start the BrainLink connection: {}</p><a href="/">Back</a></div>"#,
        escape_html(message)
    );
    html_shell("Connection error", &content)
}

/// Chat panel: transcript, loading indicator, input and error line.
#[must_use]
pub fn chat_panel(view: &ChatView) -> String {
    let mut messages = String::new();
    for message in view.transcript.messages() {
        let align = match message.role {
            MessageRole::Assistant => "justify-start",
            MessageRole::User => "justify-end",
        };
        let _ = write!(
            messages,
            r#"<div class="message {align}" data-role="{role}"><p>{content}</p></div>"#,
            role = message.role,
            content = escape_html(&message.content),
        );
    }

    let loading_class = if view.is_loading {
        "loading"
    } else {
        "loading htmx-indicator"
    };

    let error = if view.error_message.is_empty() {
        String::new()
    } else {
        format!(
            r#"<p class="error" role="alert">{}</p>"#,
            escape_html(&view.error_message)
        )
    };

    format!(
        r##"<div id="chat-panel">
        <div class="transcript" aria-live="polite">
            {messages}
            <div id="chat-loading" class="{loading_class}">
                <p class="reply">{reply}</p>
                <span class="spinner" aria-label="Waiting for the model">...</span>
            </div>
        </div>
        <form class="chat-input" method="post" action="/chat"
              hx-post="/chat" hx-target="#chat-panel" hx-select="#chat-panel"
              hx-swap="outerHTML" hx-indicator="#chat-loading">
            <input type="hidden" name="session_id" value="{session_id}">
            <textarea name="prompt" rows="1">{prompt}</textarea>
            <button type="submit" aria-label="Send">Send</button>
        </form>
        {error}
    </div>"##,
        reply = escape_html(&view.reply),
        session_id = escape_html(&view.session_id),
        prompt = escape_html(&view.prompt),
    )
}

/// Full chat page.
#[must_use]
pub fn chat_page(view: &ChatView, client_id: &str, connected: bool) -> String {
    let content = format!(
        r#"
    <div class="chat">
        <p class="title">BrainLink Demo</p>
        <p>BrainLink is a one-click solution for Bring Your Own Key (BYOK) AI applications. You can integrate BrainLink in your app to allow each user pay for their inference spend.</p>
        <p>As the application developer <b>you remain in control of the models used for each task</b> providing a consistent UX.</p>
        <p>Most people don't know what an API key is, increase your conversion by integrating BrainLink.</p>
        <p class="hint">Click the button below and type something on the chat bar after connecting</p>
        {button}
        {panel}
        <a href="{EXAMPLES_URL}" target="_blank">Click here to find examples for different frameworks on GitHub</a>
    </div>
    "#,
        button = connect_button(client_id, connected),
        panel = chat_panel(view),
    );
    html_shell("Chat", &content)
}
