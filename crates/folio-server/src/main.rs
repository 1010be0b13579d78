use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use folio_server::state::AppState;

/// `folio health`: liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$FOLIO_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("FOLIO_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio=info".parse()?),
        )
        .json()
        .init();

    let cfg = folio_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/folio.db", cfg.data_dir);
    let db = folio_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    let state = Arc::new(AppState::new(db, cfg.clone()));
    info!(
        providers = ?state.geo.resolver().provider_names(),
        accuracy = ?cfg.geo.accuracy,
        "Geo provider chain ready"
    );

    let sweeper = state
        .geo
        .cache()
        .spawn_sweeper(cfg.geo_cache_sweep_interval());

    if !cfg.rate_limits.disabled {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_rate_limit_purge_loop().await;
        });
    } else {
        info!("Rate limiting disabled (FOLIO_RATE_LIMIT_DISABLE)");
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = folio_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "Folio listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    sweeper.stop().await;
    info!("Shutdown complete");

    Ok(())
}
