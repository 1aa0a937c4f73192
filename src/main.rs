mod api;
mod bus;
mod config;
mod error;
mod pitch;
mod session;
mod state;
mod store;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::bus::EventBus;
use crate::config::{Config, StoreBackend, CHANNEL_CAPACITY};
use crate::error::Result;
use crate::pitch::{CallMatcher, LocationNormalizer, WordSwapAdjuster};
use crate::session::{Resolution, ResolveOutcome, SessionResolver, StaticIdentity, SystemClock};
use crate::state::PitchLog;
use crate::store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Document store ---
    let store: Arc<dyn DocumentStore> = match cfg.store_backend {
        StoreBackend::Sqlite => {
            let store = SqliteDocumentStore::connect(&cfg.db_path).await?;
            info!("Document store ready at {}", cfg.db_path);
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("STORE_BACKEND=memory: sessions and joins are lost on exit");
            MemoryDocumentStore::new()
        }
    };

    // --- Identity ---
    if cfg.current_user_id.is_none() {
        warn!("CURRENT_USER_ID not set, joins fail until PUT /identity");
    }
    let identity = Arc::new(StaticIdentity::new(cfg.current_user_id.clone()));

    // --- Pitch matching ---
    let adjuster = WordSwapAdjuster::new(cfg.lefty_swaps.clone());
    let matcher = CallMatcher::new(LocationNormalizer::new(Arc::new(adjuster)));
    let pitch_log = PitchLog::new(matcher);
    info!(
        "Lefty label swaps: {}",
        cfg.lefty_swaps
            .iter()
            .map(|(a, b)| format!("{a}<->{b}"))
            .collect::<Vec<_>>()
            .join(", "),
    );

    // --- Bus + session resolver ---
    let bus = Arc::new(EventBus::new());
    let resolver = SessionResolver::new(
        Arc::clone(&store),
        identity.clone(),
        Arc::new(SystemClock),
        Arc::clone(&bus),
    );

    let health = Arc::new(HealthState::new());
    let (outcome_tx, outcome_rx) = mpsc::channel(CHANNEL_CAPACITY);
    resolver.observe(outcome_tx);

    // Resolution consumer: diagnostics + health counters
    let consumer_health = Arc::clone(&health);
    tokio::spawn(async move {
        resolution_consumer(outcome_rx, consumer_health).await;
    });

    // --- HTTP API server ---
    let api_state = ApiState {
        store,
        bus,
        pitch_log,
        resolver: Arc::clone(&resolver),
        health,
        identity,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    serve_until(listener, app, shutdown_signal()).await?;

    resolver.stop_observing();
    info!("Shut down cleanly");
    Ok(())
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
async fn serve_until(
    listener: tokio::net::TcpListener,
    app: axum::Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Consumes finished resolutions: logs each one and counts it. Nothing is retried.
async fn resolution_consumer(mut rx: mpsc::Receiver<Resolution>, health: Arc<HealthState>) {
    while let Some(resolution) = rx.recv().await {
        health.record(&resolution.outcome);
        log_resolution(&resolution);
    }
}

fn log_resolution(r: &Resolution) {
    let code = r.code.as_deref().unwrap_or("-");
    match &r.outcome {
        ResolveOutcome::Joined(selection) => {
            info!(
                event = "SESSION_RESOLVED",
                code = %code,
                game_id = %selection.game_id,
                opponent = selection.opponent.as_deref().unwrap_or("-"),
                "RESOLVED | code: {code} | game: {} | opponent: {}",
                selection.game_id,
                selection.opponent.as_deref().unwrap_or("-"),
            );
        }
        ResolveOutcome::Ignored(reason) => {
            debug!(code = %code, reason = %reason, "resolution ignored");
        }
        ResolveOutcome::Failed(e) => {
            warn!(event = "SESSION_RESOLVE_FAILED", code = %code, "RESOLVE FAILED | {e}");
        }
        ResolveOutcome::Abandoned => {
            debug!(code = %code, "resolution abandoned after teardown");
        }
    }
}
