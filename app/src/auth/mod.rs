//! Bearer token validation and per-route permission checks.
//!
//! Tokens are JWTs issued by a third party identity provider. Their
//! signatures are checked against the provider's published key set, which
//! is cached for the life of the process.

use actix_web::http::StatusCode;
use err_derive::Error;

mod gate;
mod keys;
mod validation;

pub use self::gate::{authorize, check_permission, RequirePermission};
pub use self::keys::SigningKeys;
pub use self::validation::{bearer_token, Audience, Claims, TokenValidator};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error(display = "Authorization header is expected.")]
    MissingToken,
    #[error(display = "{}", _0)]
    MalformedHeader(&'static str),
    #[error(display = "{}", _0)]
    InvalidHeader(&'static str),
    #[error(display = "Unable to verify token signature.")]
    InvalidSignature,
    #[error(display = "Token expired.")]
    TokenExpired,
    #[error(display = "{}", _0)]
    InvalidClaims(&'static str),
    #[error(display = "Permission not found.")]
    Unauthorized,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match *self {
            AuthError::MissingToken => "authorization_header_missing",
            AuthError::MalformedHeader(_)
            | AuthError::InvalidHeader(_)
            | AuthError::InvalidSignature => "invalid_header",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::Unauthorized => "unauthorized",
        }
    }

    pub fn status(&self) -> StatusCode {
        match *self {
            AuthError::Unauthorized => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}
