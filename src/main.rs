//! BrainLink demo server
//!
//! Entry point: loads `.env`, configures logging and configuration, then
//! serves the demo pages.

use std::sync::Arc;

use mimalloc::MiMalloc;

use brainlink_demo::config::AppConfig;
use brainlink_demo::{server, telemetry};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before reading RUST_LOG and config
    let _ = dotenvy::dotenv();

    telemetry::init();

    let config = Arc::new(AppConfig::load()?);

    server::start_server(config).await
}
