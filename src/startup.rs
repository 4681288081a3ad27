//! Application startup and server initialization.
//!
//! Wires every component from the loaded configuration, starts the refresh
//! token purge task and serves the router.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::auth::{AuthorizationGate, PasswordHasher, SessionIssuer, TokenSigner};
use crate::config::ConfigV1;
use crate::geocoder::create_geocoder;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::routes;
use crate::state::AppState;
use crate::store::{create_store, Store, StoreError};
use crate::utils::clock::{Clock, SystemClock};

/// Builds the shared state. Every collaborator is created here and passed in.
pub async fn build_state(
    config: Arc<ConfigV1>,
    clock: Arc<dyn Clock>,
) -> Result<AppState, String> {
    let store = create_store(&config.store).await?;
    build_state_with_store(config, store, clock)
}

/// Like `build_state` but with a caller-supplied store.
pub fn build_state_with_store(
    config: Arc<ConfigV1>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
) -> Result<AppState, String> {
    let geocoder = create_geocoder(&config.geocoder)?;
    let hasher = PasswordHasher::new(config.password.cost)?;
    let signer = Arc::new(TokenSigner::new(&config.jwt, clock.clone())?);

    let metrics = Metrics::new();
    let sessions = Arc::new(SessionIssuer::new(
        store.clone(),
        signer.clone(),
        geocoder,
        hasher,
        metrics.clone(),
    ));
    let gate = Arc::new(AuthorizationGate::new(signer, metrics.clone()));

    Ok(AppState {
        config,
        store,
        sessions,
        gate,
        metrics,
        clock,
    })
}

/// Deletes expired refresh tokens once.
pub async fn purge_expired_refresh_tokens(
    store: &dyn Store,
    clock: &dyn Clock,
    metrics: &Metrics,
) -> Result<u64, StoreError> {
    let purged = store.purge_expired_refresh_tokens(clock.now()).await?;
    metrics.record_refresh_tokens_purged(purged);
    info!(
        event_name = "refresh_tokens.purged",
        event_domain = "auth",
        purged,
        "Purged expired refresh tokens"
    );
    Ok(purged)
}

/// Sweeps expired refresh tokens every `interval_secs`. Returns `None` when
/// the sweep is disabled.
pub fn spawn_purge_task(
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!("Refresh token purge disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = purge_expired_refresh_tokens(store.as_ref(), clock.as_ref(), &metrics).await
            {
                error!("Refresh token purge failed: {}", e);
            }
        }
    }))
}

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error if any component fails to initialize, if the server
/// cannot bind to the configured address, or if serving fails.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = build_state(config.clone(), clock.clone()).await?;

    let purge = spawn_purge_task(
        state.store.clone(),
        clock,
        state.metrics.clone(),
        config.store.purge_interval_secs,
    );

    let app = routes::create_router(state);

    info!("Starting server on {}", config.bind_address);
    let listener = TcpListener::bind(&config.bind_address).await?;

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await;

    if let Some(handle) = purge {
        handle.abort();
    }
    Ok(served?)
}
