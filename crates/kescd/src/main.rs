//! kescd: kesc keystore daemon
//!
//! Usage:
//!   kescd [--config /etc/kesc/config.toml] [--host 0.0.0.0] [--port 5000]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kesc_core::config::KescConfig;
use kesc_store::EscrowStore;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kescd", version, about = "kesc split-key escrow keystore")]
struct Cli {
    /// Path to kesc.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "KESC_CONFIG",
        default_value = "/etc/kesc/config.toml"
    )]
    config: PathBuf,

    /// Listening host (overrides [server].listen)
    #[arg(long, short = 'H')]
    host: Option<String>,

    /// Listening port (overrides [server].listen)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error); defaults to [server].log_level
    #[arg(long, env = "KESC_LOG")]
    log: Option<String>,

    /// Log format; defaults to [server].log_format
    #[arg(long, env = "KESC_LOG_FORMAT")]
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

    let loaded = load_config(&cli.config).await?;
    let config_missing = loaded.is_none();
    let config = loaded.unwrap_or_default();

    let level = cli.log.clone().unwrap_or_else(|| config.server.log_level.clone());
    let format = cli.log_format.clone().unwrap_or_else(|| {
        if config.server.log_format == "json" {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    });
    init_logging(&level, &format);

    if config_missing {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }

    let addr = listen_addr(&config.server.listen, cli.host.as_deref(), cli.port);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        addr = %addr,
        shards = config.server.shards,
        "kescd starting"
    );

    let state = kescd::AppState::new(EscrowStore::with_shards(config.server.shards));
    kescd::serve(&addr, state, config.server.metrics).await
}

async fn load_config(path: &PathBuf) -> Result<Option<KescConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config: {}", path.display()))?;
    KescConfig::from_toml_str(&content)
        .map(Some)
        .with_context(|| format!("parsing config: {}", path.display()))
}

/// Apply `--host`/`--port` overrides to a `host:port` listen address.
fn listen_addr(listen: &str, host: Option<&str>, port: Option<u16>) -> String {
    let (cfg_host, cfg_port) = listen.rsplit_once(':').unwrap_or((listen, "5000"));
    let host = host.unwrap_or(cfg_host);
    match port {
        Some(p) => format!("{host}:{p}"),
        None => format!("{host}:{cfg_port}"),
    }
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
