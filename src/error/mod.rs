use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::subscription::SubscriptionStoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing cookies")]
    MissingSession,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("missing authorization")]
    MissingAuthorization,

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("missing/invalid json in request body")]
    InvalidJson,

    #[error("{0}")]
    Validation(String),

    #[error("Subscription store error: {0}")]
    Store(#[from] SubscriptionStoreError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::MissingSession => (StatusCode::BAD_REQUEST, "MISSING_SESSION"),
            AppError::Unauthenticated => (StatusCode::FORBIDDEN, "UNAUTHENTICATED"),
            AppError::MissingAuthorization => (StatusCode::BAD_REQUEST, "MISSING_AUTHORIZATION"),
            AppError::InvalidApiKey => (StatusCode::FORBIDDEN, "INVALID_API_KEY"),
            AppError::InvalidJson => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_JSON"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        // Internal details stay in the logs
        let client_message = match &self {
            AppError::Store(_) => {
                tracing::error!(code = %code, error = %self, "API error");
                "Internal server error, try again later".to_string()
            }
            _ => {
                tracing::debug!(code = %code, status = %status.as_u16(), message = %self, "Request rejected");
                self.to_string()
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
