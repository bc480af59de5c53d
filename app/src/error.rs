use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use err_derive::Error;
use log::*;
use serde::Serialize;

use infra::persistence::WriteError;

use crate::auth::AuthError;

/// A storage write that could not complete. Nothing from it is visible.
#[derive(Debug, Error)]
#[error(display = "storage operation failed: {:#}", _0)]
pub struct PersistenceError(pub anyhow::Error);

/// Everything a handler may fail with; rendered as
/// `{"success": false, "error": <status>, "message": <text>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(display = "{}", _0)]
    Auth(AuthError),
    #[error(display = "resource not found")]
    NotFound,
    #[error(display = "malformed request body")]
    BadRequest,
    #[error(display = "{}", _0)]
    Persistence(PersistenceError),
    #[error(display = "internal error: {:#}", _0)]
    Internal(anyhow::Error),
}

#[derive(Serialize, Debug)]
struct ErrorBody<'a> {
    success: bool,
    error: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl PersistenceError {
    /// The write expected a document that is no longer there.
    pub fn is_missing(&self) -> bool {
        matches!(
            self.0.downcast_ref::<WriteError>(),
            Some(WriteError::Missing(_))
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<PersistenceError> for ApiError {
    fn from(e: PersistenceError) -> Self {
        ApiError::Persistence(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl From<anyhow::Error> for PersistenceError {
    fn from(e: anyhow::Error) -> Self {
        PersistenceError(e)
    }
}

impl ApiError {
    fn message(&self) -> String {
        match *self {
            ApiError::Auth(ref e) => e.to_string(),
            // Malformed payloads have always been reported as a 404.
            ApiError::NotFound | ApiError::BadRequest => "resource not found".to_string(),
            ApiError::Persistence(_) => "unprocessable".to_string(),
            ApiError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match *self {
            ApiError::Auth(ref e) => e.status(),
            ApiError::NotFound | ApiError::BadRequest => StatusCode::NOT_FOUND,
            ApiError::Persistence(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match *self {
            ApiError::Internal(ref e) => error!("Internal error: {:?}", e),
            ApiError::Persistence(ref e) => warn!("{}", e),
            _ => {}
        }

        let status = self.status_code();
        let message = self.message();
        let code = match *self {
            ApiError::Auth(ref e) => Some(e.code()),
            _ => None,
        };

        HttpResponse::build(status).json(ErrorBody {
            success: false,
            error: status.as_u16(),
            message: &message,
            code,
        })
    }
}

/// Fallback for paths no resource claims.
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    debug!("No route for {} {}", req.method(), req.uri());
    Err(ApiError::NotFound)
}
