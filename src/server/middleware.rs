use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::AppState;
use crate::error::AppError;

/// Admin authentication middleware.
///
/// Expects `Authorization: <scheme> <api key>`; the scheme word is not checked.
pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let parts: Vec<&str> = authorization.split(' ').collect();
    let [_, api_key] = parts.as_slice() else {
        tracing::warn!(path = %req.uri().path(), "Missing admin authorization");
        return Err(AppError::MissingAuthorization);
    };

    let expected = state.settings.api.key.as_bytes();
    if !bool::from(api_key.as_bytes().ct_eq(expected)) {
        tracing::warn!(path = %req.uri().path(), "Invalid API key provided");
        return Err(AppError::InvalidApiKey);
    }

    Ok(next.run(req).await)
}
