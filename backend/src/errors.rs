use crate::issuance::IssuanceApiError;
use crate::registry::{RegistryError, RevertReason};
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;
use zkp_visa_core::types::ValidationError;
use zkp_visa_core::wizard::WizardError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    /// The text sent to clients, without the status prefix.
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::BadGateway(m)
            | ApiError::ServiceUnavailable(m) => m.clone(),
            ApiError::Unauthorized => "missing or invalid api key".to_string(),
            ApiError::Internal => "internal error".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorBody { error: self.message() })).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<WizardError> for ApiError {
    fn from(e: WizardError) -> Self {
        match e {
            WizardError::Validation(_) | WizardError::Document(_) => ApiError::BadRequest(e.to_string()),
            _ => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match &e {
            RegistryError::Reverted { reason: RevertReason::NotOwner, message } => {
                ApiError::Forbidden(message.clone())
            }
            RegistryError::Reverted { message, .. } => ApiError::Conflict(message.clone()),
            RegistryError::Rpc(_) => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl From<IssuanceApiError> for ApiError {
    fn from(e: IssuanceApiError) -> Self {
        ApiError::BadGateway(e.to_string())
    }
}
