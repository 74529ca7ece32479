use std::path::Path;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::brainlink::BrainLinkSettings;
use crate::chat::ChatSettings;

/// Client id of the public BrainLink demo application.
pub const DEFAULT_CLIENT_ID: &str = "58c5ee00-4799-4a0b-88dd-2ff99702a298";
pub const DEFAULT_API_BASE_URL: &str = "https://www.brainlink.dev/api/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick:free";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// BrainLink application client id
    #[arg(long)]
    pub client_id: Option<String>,

    /// Model identifier for chat completions
    #[arg(long, env = "CHAT_MODEL")]
    pub model: Option<String>,

    /// Enable rate limiting
    #[arg(long, env = "RATE_LIMIT_ENABLED")]
    pub rate_limit_enabled: Option<bool>,

    /// Disable timeout middleware
    #[arg(long, env = "TIMEOUT_DISABLED")]
    pub timeout_disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub brainlink: BrainLinkConfig,
    pub chat: ChatConfig,
    pub security: SecurityConfig,
    pub resilience: ResilienceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Idle conversations are dropped after this many seconds.
    pub conversation_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrainLinkConfig {
    pub client_id: String,
    pub api_base_url: String,
    pub connect_url: String,
    pub token_url: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub model: String,
    pub persist_user_messages: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    /// External origin allowed for scripts and workers.
    pub csp_script_origin: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceConfig {
    pub rate_limit_enabled: bool,
    pub timeout_disabled: bool,
    pub requests_per_second: f32,
    pub burst_size: u32,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.conversation_timeout_secs", 30 * 60)?
            .set_default("brainlink.client_id", DEFAULT_CLIENT_ID)?
            .set_default("brainlink.api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("brainlink.connect_url", "https://www.brainlink.dev/connect")?
            .set_default("brainlink.token_url", "https://www.brainlink.dev/api/oauth/token")?
            .set_default("brainlink.redirect_uri", "http://localhost:3000/")?
            .set_default("chat.model", DEFAULT_MODEL)?
            .set_default("chat.persist_user_messages", false)?
            .set_default("security.csp_script_origin", "https://unpkg.com")?
            .set_default("resilience.rate_limit_enabled", true)?
            .set_default("resilience.timeout_disabled", false)?
            .set_default("resilience.requests_per_second", 5.0)?
            .set_default("resilience.burst_size", 10)?
            .set_default("resilience.request_timeout_secs", 30)?;

        // 2. Config file: explicit path, else ./config.yaml when present
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None if Path::new("config.yaml").exists() => {
                builder.add_source(File::with_name("config.yaml"))
            }
            None => builder,
        };

        // 3. Environment, e.g. BRAINLINK_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("BRAINLINK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags (and their env aliases) win
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(client_id) = cli.client_id {
            builder = builder.set_override("brainlink.client_id", client_id)?;
        }
        if let Some(model) = cli.model {
            builder = builder.set_override("chat.model", model)?;
        }
        if let Some(rl) = cli.rate_limit_enabled {
            builder = builder.set_override("resilience.rate_limit_enabled", rl)?;
        }
        if let Some(td) = cli.timeout_disabled {
            builder = builder.set_override("resilience.timeout_disabled", td)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    #[must_use]
    pub fn brainlink_settings(&self) -> BrainLinkSettings {
        BrainLinkSettings {
            client_id: self.brainlink.client_id.clone(),
            connect_url: self.brainlink.connect_url.clone(),
            token_url: self.brainlink.token_url.clone(),
            redirect_uri: self.brainlink.redirect_uri.clone(),
        }
    }

    #[must_use]
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            api_base_url: self.brainlink.api_base_url.clone(),
            model: self.chat.model.clone(),
            persist_user_messages: self.chat.persist_user_messages,
        }
    }
}
