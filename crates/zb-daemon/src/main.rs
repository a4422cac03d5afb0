//! zb-daemon entry point.
//!
//! Thin on purpose: loads config, builds the sources and shared state,
//! starts the pollers, wires middleware, and serves HTTP. Handlers live in
//! `routes.rs`; polling lives in `poller.rs`.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use zb_config::{
    AppConfig, FileSelectionPersistence, MemorySelectionPersistence, SelectionPersistence,
    SelectionStore,
};
use zb_daemon::{poller::Sources, routes, sources::FileChainSource, state};
use zb_md::{GraphqlMarketSource, IndexedMarketSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Production injects env
    // vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config_path = std::env::var_os("ZB_CONFIG").map(PathBuf::from);
    let cfg = zb_config::load_config(config_path.as_deref())?;

    let persistence: Box<dyn SelectionPersistence> = match &cfg.selection_file {
        Some(path) => Box::new(FileSelectionPersistence::new(path)),
        None => Box::new(MemorySelectionPersistence::new()),
    };
    let store = SelectionStore::restore(cfg.registry(), persistence)?;

    let account = std::env::var("ZB_ACCOUNT")
        .ok()
        .filter(|a| !a.trim().is_empty());

    let shared = Arc::new(state::AppState::with_sources(
        store,
        sources_from_config(&cfg)?,
        cfg.polling_interval(),
        account,
    ));
    shared.start();
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(15));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("zb-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("ZB_DAEMON_ADDR").ok()?.parse().ok()
}

fn sources_from_config(cfg: &AppConfig) -> anyhow::Result<Sources> {
    let dir = cfg
        .chain_data_dir
        .clone()
        .context("CONFIG_INVALID: chain_data_dir is required")?;
    let chain = Arc::new(FileChainSource::new(dir));

    let indexed = cfg.indexed_source_url.as_ref().map(|url| {
        info!(endpoint = %url, "indexed source enabled");
        Arc::new(GraphqlMarketSource::new(url.clone())) as Arc<dyn IndexedMarketSource>
    });

    Ok(Sources {
        indexed,
        pool: chain.clone(),
        incentives: chain.clone(),
        user_reserves: chain,
    })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
