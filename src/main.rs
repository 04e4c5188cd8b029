mod config;
mod fingerprint;
mod http;
mod models;
mod scoring;
mod storage;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::settings::Settings;
use crate::http::server;
use crate::http::AppState;
use crate::scoring::oracle::{MlOracle, RandomOracle};
use crate::storage::memory::MemoryStore;
use crate::storage::sqlite::SqliteStore;
use crate::storage::Store;

/// Parse the `--config` CLI flag. Defaults to `lurebox.toml` in the working
/// directory; the demo runs on built-in defaults when the file is absent.
fn parse_config_path() -> String {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = String::from("lurebox.toml");

    let mut i = 1;
    while i < args.len() {
        if args[i] == "--config" {
            if let Some(path) = args.get(i + 1) {
                config_path = path.clone();
            }
            i += 2;
        } else {
            i += 1;
        }
    }

    config_path
}

/// Initialise the `tracing` subscriber on stdout. The request audit feed
/// shares this output, so everything a WAF needs ends up on one stream.
fn init_tracing(level: &str) {
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},lurebox=debug", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ---------------------------------------------------------------
    // 1. Configuration
    // ---------------------------------------------------------------
    let config_path = parse_config_path();
    let mut settings = Settings::load_or_default(&config_path)?;

    // PORT override for container platforms that inject it.
    if let Ok(port) = std::env::var("PORT") {
        if let Ok(port) = port.parse::<u16>() {
            settings.server.port = port;
        }
    }
    let settings = Arc::new(settings);

    // ---------------------------------------------------------------
    // 2. Logging
    // ---------------------------------------------------------------
    init_tracing(&settings.logging.level);
    info!("Starting lurebox vulnerable demo target");
    info!("Config loaded from {}", config_path);

    // ---------------------------------------------------------------
    // 3. Storage
    // ---------------------------------------------------------------
    let store: Arc<dyn Store> = match settings.storage.backend.as_str() {
        "sqlite" => Arc::new(SqliteStore::new(&settings.storage.sqlite_path)?),
        "memory" => Arc::new(MemoryStore::new()),
        other => {
            return Err(format!(
                "Unknown storage backend {:?} (expected \"memory\" or \"sqlite\")",
                other
            )
            .into());
        }
    };
    store.seed()?;
    info!("Storage backend {} seeded", store.backend_name());

    // ---------------------------------------------------------------
    // 4. Scoring and HTTP
    // ---------------------------------------------------------------
    let oracle: Arc<dyn MlOracle> = Arc::new(RandomOracle);
    let state = AppState::new(store, oracle, settings);

    server::run(state).await?;

    info!("lurebox shut down");
    Ok(())
}
