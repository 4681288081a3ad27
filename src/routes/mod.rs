//! HTTP route definitions and handlers.
//!
//! Auth and deal endpoints live under `/api`; health and metrics sit at the
//! root for probes and scrapers.

mod auth_routes;
mod deal_routes;
mod health_routes;
mod metrics_routes;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::CorsConfig;
use crate::state::AppState;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .nest("/api/auth", auth_routes::routes())
        .nest("/api/deals", deal_routes::routes())
        .merge(health_routes::routes())
        .merge(metrics_routes::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentials are allowed, so origins must be listed explicitly.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring unusable CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
