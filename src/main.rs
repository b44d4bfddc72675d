use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nestbook::auth::{AuthSource, TokenDirectory};
use nestbook::config::Config;
use nestbook::engine::Engine;
use nestbook::http::{create_router, AppState, RouterLimits};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    nestbook::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let engine = Arc::new(Engine::new(config.wal_path())?);
    let directory = match &config.users_file {
        Some(path) => TokenDirectory::load(path)?,
        None => {
            tracing::warn!("NESTBOOK_USERS_FILE not set, every protected endpoint will answer 401");
            TokenDirectory::new()
        }
    };
    let auth: Arc<dyn AuthSource> = Arc::new(directory);

    let compactor_engine = engine.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        nestbook::compactor::run_compactor(compactor_engine, threshold).await;
    });

    let app = create_router(
        AppState::new(engine.clone(), auth),
        RouterLimits {
            max_in_flight: config.max_connections,
            request_timeout: config.request_timeout,
        },
    );

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("nestbook listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  listings: {}", engine.listing_count());
    info!("  max_connections: {}", config.max_connections);
    info!("  request_timeout: {:?}", config.request_timeout);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, let in-flight requests finish
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("nestbook stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, draining requests");
}
