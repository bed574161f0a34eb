//! eitxtd: EITXT encryption service
//!
//! Usage:
//!   eitxtd [--config /etc/eitxt/config.toml] [--listen 0.0.0.0:8080]

mod error;
mod metrics;
mod server;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use eitxt_core::config::EitxtConfig;

#[derive(Parser, Debug)]
#[command(name = "eitxtd", version, about = "EITXT encryption service")]
struct Cli {
    /// Path to eitxt.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "EITXT_CONFIG",
        default_value = "/etc/eitxt/config.toml"
    )]
    config: PathBuf,

    /// Listen address (overrides server.listen)
    #[arg(long, env = "EITXT_LISTEN")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides server.log_level
    #[arg(long, env = "EITXT_LOG")]
    log: Option<String>,

    /// Log format; overrides server.log_format
    #[arg(long, env = "EITXT_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Read the file before logging is up so its level and format apply.
    let file_exists = cli.config.exists();
    let mut config = EitxtConfig::load(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.server.log_level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.server.log_format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    if !file_exists {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
        config.validate()?;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        listen = %config.server.listen,
        iterations = config.crypto.iterations,
        chunk_bytes = config.crypto.chunk_bytes,
        "eitxtd starting"
    );

    server::run(config).await
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
