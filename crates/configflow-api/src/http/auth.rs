//! Bearer-token middleware for controller-initiated routes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::http::constants::BEARER_PREFIX;
use crate::http::errors::ApiError;
use crate::state::ApiState;

pub(crate) async fn require_bearer_token(
    State(state): State<Arc<ApiState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim);

    match presented {
        Some(token) if state.accepts(token) => Ok(next.run(req).await),
        Some(_) => {
            warn!(path = %req.uri().path(), "rejected request with invalid token");
            Err(ApiError::unauthorized())
        }
        None => {
            warn!(path = %req.uri().path(), "rejected request without bearer token");
            Err(ApiError::unauthorized())
        }
    }
}
