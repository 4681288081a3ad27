//! Credential checks, token issuance and the bearer-token gate.

pub mod gate;
pub mod password;
pub mod session;
pub mod tokens;

pub use gate::{AuthenticatedStore, AuthorizationGate, GateError};
pub use password::PasswordHasher;
pub use session::{
    ErrorCategory, LoginRequest, RegisterRequest, Session, SessionError, SessionIssuer,
};
pub use tokens::{IssuedToken, TokenClaims, TokenError, TokenKind, TokenPair, TokenSigner};
