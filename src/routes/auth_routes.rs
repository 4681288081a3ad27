//! Register, login and the gated identity probe.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::error;

use crate::auth::{AuthenticatedStore, LoginRequest, RegisterRequest, Session};
use crate::config::ConfigV1;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/protected", get(protected))
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let Json(request) = body?;
    let session = state.sessions.register(request).await?;
    session_response(&state.config, session)
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let Json(request) = body?;
    let session = state.sessions.login(request).await?;
    session_response(&state.config, session)
}

async fn protected(store: AuthenticatedStore) -> impl IntoResponse {
    Json(json!({ "message": "Authorized", "store": store }))
}

/// The access token goes in the body; the refresh token only in the cookie.
fn session_response(
    config: &ConfigV1,
    session: Session,
) -> Result<impl IntoResponse, HTTPError> {
    let cookie = refresh_cookie(config, &session.refresh_token, session.refresh_expires_at)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    Ok((
        headers,
        Json(json!({
            "accessToken": session.access_token,
            "store": session.store,
        })),
    ))
}

fn refresh_cookie(
    config: &ConfigV1,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<HeaderValue, HTTPError> {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Expires={}; Path={}; HttpOnly; SameSite=Strict",
        config.cookie.name,
        token,
        config.jwt.refresh_ttl_secs,
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        config.cookie.path,
    );
    if config.cookie.secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie).map_err(|e| {
        error!("Refresh cookie is not a valid header value: {}", e);
        HTTPError::internal()
    })
}
