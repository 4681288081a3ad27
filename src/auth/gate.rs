use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use http::request::Parts;
use serde::Serialize;
use tracing::{debug, warn};

use super::tokens::{TokenError, TokenKind, TokenSigner};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;
use crate::utils::log_throttle::LogThrottle;

const REJECTION_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// The store a request acts for, resolved from its bearer token.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedStore {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Access denied")]
    MissingToken,
    #[error("Invalid or expired token")]
    Unauthorized,
}

impl From<GateError> for HTTPError {
    fn from(err: GateError) -> Self {
        HTTPError::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

/// Checks `Authorization: Bearer <access token>` on protected routes.
pub struct AuthorizationGate {
    signer: Arc<TokenSigner>,
    metrics: Metrics,
    rejections: LogThrottle,
}

impl AuthorizationGate {
    pub fn new(signer: Arc<TokenSigner>, metrics: Metrics) -> Self {
        Self {
            signer,
            metrics,
            rejections: LogThrottle::new(REJECTION_LOG_INTERVAL),
        }
    }

    /// Resolves the raw header value to a store identity. Expired and invalid
    /// tokens look the same to the caller; only metrics and logs tell them apart.
    pub fn authorize(&self, header: Option<&str>) -> Result<AuthenticatedStore, GateError> {
        let mut parts = header.unwrap_or("").split_whitespace();
        let scheme = parts.next();
        let Some(token) = parts.next() else {
            self.metrics.record_gate_decision("missing");
            return Err(GateError::MissingToken);
        };

        if !scheme.is_some_and(|s| s.eq_ignore_ascii_case("bearer")) {
            self.reject("invalid", "unsupported authorization scheme");
            return Err(GateError::Unauthorized);
        }

        match self.signer.verify(token, TokenKind::Access) {
            Ok(claims) => {
                self.metrics.record_gate_decision("ok");
                debug!(store_id = %claims.id, "Bearer token accepted");
                Ok(AuthenticatedStore { id: claims.id })
            }
            Err(TokenError::Expired) => {
                self.reject("expired", "access token expired");
                Err(GateError::Unauthorized)
            }
            Err(e) => {
                self.reject("invalid", &e.to_string());
                Err(GateError::Unauthorized)
            }
        }
    }

    fn reject(&self, result: &'static str, reason: &str) {
        self.metrics.record_gate_decision(result);
        if let Some(suppressed) = self.rejections.admit(result) {
            warn!(
                event_name = "gate.rejected",
                event_domain = "auth",
                result,
                suppressed,
                "Rejected bearer token: {}",
                reason
            );
        }
    }
}

impl FromRequestParts<AppState> for AuthenticatedStore {
    type Rejection = HTTPError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<AuthenticatedStore, HTTPError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        Ok(state.gate.authorize(header)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JWTConfig;
    use crate::utils::clock::{Clock, ManualClock};
    use chrono::{Duration as ChronoDuration, Utc};

    fn signer_for(access: &str, clock: Arc<dyn Clock>) -> Arc<TokenSigner> {
        Arc::new(
            TokenSigner::new(
                &JWTConfig {
                    access_secret: access.to_string(),
                    refresh_secret: "refresh".to_string(),
                    access_ttl_secs: 900,
                    refresh_ttl_secs: 604_800,
                },
                clock,
            )
            .unwrap(),
        )
    }

    fn gate(clock: &ManualClock) -> (AuthorizationGate, Arc<TokenSigner>) {
        let signer = signer_for("access", Arc::new(clock.clone()));
        (AuthorizationGate::new(signer.clone(), Metrics::new()), signer)
    }

    #[test]
    fn accepts_bearer_token_in_any_case() {
        let clock = ManualClock::new(Utc::now());
        let (gate, signer) = gate(&clock);
        let token = signer.issue_access("store-7").unwrap().token;

        for scheme in ["Bearer", "bearer", "BEARER"] {
            let header = format!("{} {}", scheme, token);
            assert_eq!(
                gate.authorize(Some(&header)),
                Ok(AuthenticatedStore {
                    id: "store-7".to_string()
                })
            );
        }
    }

    #[test]
    fn missing_header_or_token_is_access_denied() {
        let clock = ManualClock::new(Utc::now());
        let (gate, _) = gate(&clock);

        assert_eq!(gate.authorize(None), Err(GateError::MissingToken));
        assert_eq!(gate.authorize(Some("")), Err(GateError::MissingToken));
        assert_eq!(gate.authorize(Some("Bearer")), Err(GateError::MissingToken));
    }

    #[test]
    fn foreign_scheme_and_foreign_secret_are_unauthorized() {
        let clock = ManualClock::new(Utc::now());
        let (gate, signer) = gate(&clock);
        let token = signer.issue_access("store-7").unwrap().token;
        assert_eq!(
            gate.authorize(Some(&format!("Basic {}", token))),
            Err(GateError::Unauthorized)
        );

        let forged = signer_for("not-our-secret", Arc::new(clock.clone()))
            .issue_access("store-7")
            .unwrap()
            .token;
        assert_eq!(
            gate.authorize(Some(&format!("Bearer {}", forged))),
            Err(GateError::Unauthorized)
        );
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let clock = ManualClock::new(Utc::now());
        let (gate, signer) = gate(&clock);
        let refresh = signer.issue_refresh("store-7").unwrap().token;
        assert_eq!(
            gate.authorize(Some(&format!("Bearer {}", refresh))),
            Err(GateError::Unauthorized)
        );
    }

    #[test]
    fn token_older_than_fifteen_minutes_is_rejected() {
        let clock = ManualClock::new(Utc::now());
        let (gate, signer) = gate(&clock);
        let header = format!("Bearer {}", signer.issue_access("store-7").unwrap().token);

        assert!(gate.authorize(Some(&header)).is_ok());
        clock.advance(ChronoDuration::minutes(15));
        assert_eq!(gate.authorize(Some(&header)), Err(GateError::Unauthorized));
    }

    #[test]
    fn rejections_render_as_401() {
        let http: HTTPError = GateError::MissingToken.into();
        assert_eq!(http.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(http.message(), "Access denied");
    }
}
