use std::sync::{Arc, LazyLock};
use std::time::Instant;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::password::PasswordHasher;
use super::tokens::{TokenError, TokenPair, TokenSigner};
use crate::geocoder::{normalize_postcode, GeocodeError, Geocoder};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{PublicStore, RefreshTokenRecord, StoreAccount};
use crate::store::{Store, StoreError};
use crate::utils::http_helpers::HTTPError;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| panic!("email pattern: {}", e))
});

const MIN_STORE_NAME_CHARS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 6;

/// Body of `POST /api/auth/register`. Absent and empty fields are treated alike.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RegisterRequest {
    pub store_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub postcode: Option<String>,
}

/// Body of `POST /api/auth/login`.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A freshly issued token pair for one store. The refresh record is already
/// persisted by the time a `Session` exists.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub store: PublicStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Auth,
    Persistence,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("All fields are required")]
    MissingFields,
    #[error("Invalid store name")]
    InvalidStoreName,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    #[error("Invalid postcode")]
    InvalidPostcode,
    #[error("Email already registered")]
    EmailAlreadyRegistered,
    #[error("Store not found")]
    StoreNotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("geocoder unavailable: {0}")]
    GeocoderUnavailable(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    TokenIssue(#[from] TokenError),
    #[error("failed to persist session: {0}")]
    SessionPersistFailure(StoreError),
    #[error("store lookup failed: {0}")]
    Storage(StoreError),
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::MissingFields
            | SessionError::InvalidStoreName
            | SessionError::InvalidEmail
            | SessionError::WeakPassword => ErrorCategory::Validation,
            SessionError::EmailAlreadyRegistered => ErrorCategory::Conflict,
            SessionError::InvalidPostcode | SessionError::StoreNotFound => ErrorCategory::NotFound,
            SessionError::InvalidCredentials => ErrorCategory::Auth,
            SessionError::GeocoderUnavailable(_)
            | SessionError::Hashing(_)
            | SessionError::TokenIssue(_)
            | SessionError::SessionPersistFailure(_)
            | SessionError::Storage(_) => ErrorCategory::Persistence,
        }
    }

    /// Bad credentials share the 400 of the other client-side failures.
    pub fn status(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SessionError::MissingFields => "missing_fields",
            SessionError::InvalidStoreName => "invalid_store_name",
            SessionError::InvalidEmail => "invalid_email",
            SessionError::WeakPassword => "weak_password",
            SessionError::InvalidPostcode => "invalid_postcode",
            SessionError::EmailAlreadyRegistered => "email_taken",
            SessionError::StoreNotFound => "store_not_found",
            SessionError::InvalidCredentials => "invalid_credentials",
            SessionError::GeocoderUnavailable(_) => "geocoder_unavailable",
            SessionError::Hashing(_) => "hashing_failed",
            SessionError::TokenIssue(_) => "token_issue_failed",
            SessionError::SessionPersistFailure(_) => "persist_failed",
            SessionError::Storage(_) => "storage_failed",
        }
    }
}

impl From<SessionError> for HTTPError {
    fn from(err: SessionError) -> Self {
        match err.category() {
            ErrorCategory::Persistence => {
                error!(event_name = "session.failed", "{}", err);
                HTTPError::internal()
            }
            _ => HTTPError::new(err.status(), err.to_string()),
        }
    }
}

/// Turns credentials into sessions: validates, hashes, signs and persists.
pub struct SessionIssuer {
    store: Arc<dyn Store>,
    signer: Arc<TokenSigner>,
    geocoder: Arc<dyn Geocoder>,
    hasher: PasswordHasher,
    metrics: Metrics,
}

fn required(field: &Option<String>) -> Result<&str, SessionError> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SessionError::MissingFields),
    }
}

impl SessionIssuer {
    pub fn new(
        store: Arc<dyn Store>,
        signer: Arc<TokenSigner>,
        geocoder: Arc<dyn Geocoder>,
        hasher: PasswordHasher,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            signer,
            geocoder,
            hasher,
            metrics,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Session, SessionError> {
        let started = Instant::now();
        let outcome = self.try_register(request).await;
        self.record("register", started, &outcome);
        outcome
    }

    pub async fn login(&self, request: LoginRequest) -> Result<Session, SessionError> {
        let started = Instant::now();
        let outcome = self.try_login(request).await;
        self.record("login", started, &outcome);
        outcome
    }

    async fn try_register(&self, request: RegisterRequest) -> Result<Session, SessionError> {
        let store_name = required(&request.store_name)?;
        let email = required(&request.email)?;
        let password = required(&request.password)?;
        let postcode = required(&request.postcode)?;

        if store_name.chars().count() < MIN_STORE_NAME_CHARS {
            return Err(SessionError::InvalidStoreName);
        }
        if !EMAIL_PATTERN.is_match(email) {
            return Err(SessionError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(SessionError::WeakPassword);
        }

        let location = match self.geocoder.resolve(&normalize_postcode(postcode)).await {
            Ok(location) => {
                self.metrics.record_geocode_lookup("ok");
                location
            }
            Err(GeocodeError::NotFound(code)) => {
                self.metrics.record_geocode_lookup("not_found");
                info!("Rejected registration with unknown postcode '{}'", code);
                return Err(SessionError::InvalidPostcode);
            }
            Err(GeocodeError::Unavailable(reason)) => {
                self.metrics.record_geocode_lookup("unavailable");
                return Err(SessionError::GeocoderUnavailable(reason));
            }
        };

        let password_hash = self.hash_password(password.to_string()).await?;
        let account = StoreAccount {
            id: Uuid::new_v4().to_string(),
            store_name: store_name.to_string(),
            email: email.to_string(),
            password_hash,
            postcode: postcode.to_string(),
            latitude: location.latitude,
            longitude: location.longitude,
        };

        let pair = self.signer.issue_pair(&account.id)?;
        let record = refresh_record(&pair, &account.id);
        match self.store.register_store(&account, &record).await {
            Ok(()) => {}
            Err(StoreError::DuplicateEmail) => return Err(SessionError::EmailAlreadyRegistered),
            Err(e) => return Err(SessionError::SessionPersistFailure(e)),
        }

        Ok(session(pair, &account))
    }

    async fn try_login(&self, request: LoginRequest) -> Result<Session, SessionError> {
        let email = required(&request.email)?;
        let password = required(&request.password)?;

        let account = self
            .store
            .find_store_by_email(email)
            .await
            .map_err(SessionError::Storage)?
            .ok_or(SessionError::StoreNotFound)?;

        if !self
            .verify_password(password.to_string(), account.password_hash.clone())
            .await?
        {
            warn!(
                event_name = "session.bad_credentials",
                store_id = %account.id,
                "Password mismatch on login"
            );
            return Err(SessionError::InvalidCredentials);
        }

        let pair = self.signer.issue_pair(&account.id)?;
        self.store
            .add_refresh_token(&refresh_record(&pair, &account.id))
            .await
            .map_err(SessionError::SessionPersistFailure)?;

        Ok(session(pair, &account))
    }

    async fn hash_password(&self, password: String) -> Result<String, SessionError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| SessionError::Hashing(e.to_string()))?
            .map_err(|e| SessionError::Hashing(e.to_string()))
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, SessionError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| SessionError::Hashing(e.to_string()))
    }

    fn record(&self, flow: &str, started: Instant, outcome: &Result<Session, SessionError>) {
        self.metrics
            .record_session_duration(flow, started.elapsed().as_secs_f64());
        match outcome {
            Ok(session) => {
                self.metrics.record_session_attempt(flow, "ok");
                info!(
                    event_name = "session.issued",
                    event_domain = "auth",
                    flow,
                    store_id = %session.store.id,
                    "Issued session"
                );
            }
            Err(e) => self.metrics.record_session_attempt(flow, e.label()),
        }
    }
}

fn refresh_record(pair: &TokenPair, store_id: &str) -> RefreshTokenRecord {
    RefreshTokenRecord::new(
        pair.refresh.token.clone(),
        store_id.to_string(),
        pair.refresh.expires_at,
    )
}

fn session(pair: TokenPair, account: &StoreAccount) -> Session {
    Session {
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
        refresh_expires_at: pair.refresh.expires_at,
        store: PublicStore::from(account),
    }
}
