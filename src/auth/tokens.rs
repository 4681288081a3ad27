use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JWTConfig;
use crate::utils::clock::Clock;

/// The two token classes. Each is signed with its own secret, so neither can
/// stand in for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Claims carried by both token classes. Refresh tokens also carry a `jti`
/// so that two issued in the same second still differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    /// Malformed, unsigned, tampered with or signed with another secret.
    #[error("token is invalid: {0}")]
    Invalid(String),
    /// Well formed and correctly signed, but past its expiry.
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKey {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }
}

/// Mints and checks HS256 tokens for store identities.
pub struct TokenSigner {
    access: SigningKey,
    refresh: SigningKey,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(config: &JWTConfig, clock: Arc<dyn Clock>) -> Result<Self, String> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err("jwt.access_secret and jwt.refresh_secret are both required".to_string());
        }
        if config.access_secret == config.refresh_secret {
            return Err("jwt.access_secret and jwt.refresh_secret must differ".to_string());
        }
        if config.access_ttl_secs <= 0 || config.refresh_ttl_secs <= 0 {
            return Err("jwt token lifetimes must be positive".to_string());
        }
        Ok(Self {
            access: SigningKey::new(&config.access_secret, config.access_ttl_secs),
            refresh: SigningKey::new(&config.refresh_secret, config.refresh_ttl_secs),
            clock,
        })
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        self.key(kind).ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn issue(&self, store_id: &str, kind: TokenKind) -> Result<IssuedToken, TokenError> {
        let key = self.key(kind);
        let issued_at = self.clock.now();
        let expires_at = issued_at + key.ttl;
        let claims = TokenClaims {
            id: store_id.to_string(),
            jti: (kind == TokenKind::Refresh).then(|| Uuid::new_v4().to_string()),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn issue_access(&self, store_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue(store_id, TokenKind::Access)
    }

    pub fn issue_refresh(&self, store_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue(store_id, TokenKind::Refresh)
    }

    pub fn issue_pair(&self, store_id: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue_access(store_id)?,
            refresh: self.issue_refresh(store_id)?,
        })
    }

    /// Checks signature and structure with the secret for `kind`, then expiry
    /// against the injected clock.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against our own clock rather than the system time.
        validation.validate_exp = false;

        let claims = decode::<TokenClaims>(token, &self.key(kind).decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
