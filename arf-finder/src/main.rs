//! arf-finder - Asset Relationship Finder service
//!
//! Answers "what uses this asset?" for data extensions, cloud pages, emails
//! and automation activities by fanning out over the marketing platform's
//! SOAP and REST APIs.

use anyhow::{Context, Result};
use arf_common::config::{resolve_config, CliOverrides};
use arf_finder::auth::{OAuthSettings, TokenCache};
use arf_finder::sfmc::{FanoutLimits, SfmcClient, SfmcSource};
use arf_finder::AppState;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "arf-finder", version, about = "Asset relationship finder service")]
struct Cli {
    /// Config file (defaults to <config_dir>/arf/config.toml)
    #[arg(long, env = "ARF_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Log level when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// Directory with index.html and /static assets
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

impl From<Cli> for CliOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            config_path: cli.config,
            host: cli.host,
            port: cli.port,
            log_level: cli.log_level,
            static_dir: cli.static_dir,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let overrides = CliOverrides::from(Cli::parse());

    // Logging must come up before config resolution so its warnings show;
    // the configured level is applied once the config is known.
    let early_level = overrides.log_level.clone().unwrap_or_else(|| "info".to_string());
    let (filter, reload) = tracing_subscriber::reload::Layer::new(env_filter(&early_level));
    {
        use tracing_subscriber::prelude::*;
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = resolve_config(&overrides).context("Failed to resolve configuration")?;
    reload
        .reload(env_filter(&config.logging.level))
        .context("Failed to apply log level")?;

    info!("Starting arf-finder (Asset Relationship Finder)");
    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("ARF_GIT_HASH"),
        built = env!("ARF_BUILD_TIMESTAMP"),
        profile = env!("ARF_BUILD_PROFILE"),
        "Build info"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    let tokens = Arc::new(TokenCache::new(
        http.clone(),
        OAuthSettings::from(&config.sfmc),
    ));
    let client = SfmcClient::new(
        http,
        tokens.clone(),
        &config.sfmc,
        FanoutLimits::from(&config.aggregation),
    );
    let source = Arc::new(SfmcSource::new(client));

    let state = AppState::new(
        source,
        tokens,
        config.cache.ttl(),
        config.aggregation.deadline(),
        config.server.static_dir.clone(),
    );

    let shutdown = CancellationToken::new();
    let sweepers = state.spawn_cache_sweepers(config.cache.sweep_interval(), &shutdown);

    let app = arf_finder::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    for sweeper in sweepers {
        let _ = sweeper.await;
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the given level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
