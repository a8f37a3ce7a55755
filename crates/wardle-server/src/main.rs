// Wardle backend entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr)
// 2. Load config
// 3. Build the query service and warm the dataset cache
// 4. Bind the listener and serve until Ctrl+C

use wardle_baseball::config;
use wardle_baseball::query::QueryService;
use wardle_server::http;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Wardle backend starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: data dir={}, min_at_bats={}, min_year={}",
        config.data.dir, config.rules.min_at_bats, config.rules.min_year
    );

    // 3. Build the query service. A failed warm-up is not fatal: queries
    // answer with empty results and the next request retries the load.
    let service = Arc::new(QueryService::from_config(&config));
    let warm = Arc::clone(&service);
    match tokio::task::spawn_blocking(move || warm.load()).await {
        Ok(Ok(dataset)) => info!(
            "Loaded {} players across {} teams",
            dataset.players.len(),
            dataset.teams.len()
        ),
        Ok(Err(e)) => warn!("Dataset load failed, serving empty results: {e}"),
        Err(e) => error!("Dataset load task panicked: {e}"),
    }

    // 4. Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tokio::select! {
        result = http::run(
            listener,
            service,
            config.server.cors_origin.clone(),
            Duration::from_secs(config.server.read_timeout_secs),
        ) => {
            if let Err(e) = result {
                error!("HTTP server exited with error: {e}");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    info!("Wardle backend shut down");
    Ok(())
}

/// Initialize the tracing subscriber, writing to stderr.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wardle_server=info,wardle_baseball=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
