//! Shared application state.
//!
//! Everything a handler needs is constructed once in `startup` and handed in
//! here; nothing is read from globals.

use crate::auth::{AuthorizationGate, SessionIssuer};
use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::store::Store;
use crate::utils::clock::Clock;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Persistence for accounts, refresh tokens and deals.
    pub store: Arc<dyn Store>,
    /// Register and login.
    pub sessions: Arc<SessionIssuer>,
    /// Bearer-token check behind `AuthenticatedStore`.
    pub gate: Arc<AuthorizationGate>,
    pub metrics: Metrics,
    /// Source of `now` for anything stamped at request time.
    pub clock: Arc<dyn Clock>,
}
