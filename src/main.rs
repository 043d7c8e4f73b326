use clap::Parser;
use onemin_proxy::config::config_search_paths;
use onemin_proxy::{build_router, AppState, ProxyConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "onemin-proxy",
    about = "OpenAI-compatible proxy for the 1min.ai API",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log file path
    #[arg(long, default_value = "onemin-proxy.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onemin_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env_overrides()?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let logger = SharedLogger::new(&cli.log_file)?;
    let shutdown = CancellationToken::new();
    let state = AppState::new(config.clone(), logger.clone(), shutdown.clone())?;

    info!("onemin-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", config.upstream.base_url);
    info!("  Assets:    {}", config.upstream.asset_base_url);
    info!("  Port:      {}", config.port);
    info!("  CORS:      {}", config.cors_origins.join(", "));
    info!("  Log file:  {}", cli.log_file.display());
    if state.fallback_api_key.is_none() {
        warn!(
            "{} is not set; requests without an Authorization header will be rejected",
            config.api_key_env
        );
    }

    logger.info(
        "startup",
        format!(
            "Starting onemin-proxy base_url={} port={}",
            config.upstream.base_url, config.port
        ),
    );

    let app = build_router(Arc::new(state));
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OpenAI base URL: http://localhost:{}/v1", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    logger.info("shutdown", "Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C, cancelling every in-flight stream relay.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    shutdown.cancel();
}
