//! JSON error responses in the agent's `{success, message}` envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::http::constants::{MESSAGE_INVALID_BODY, MESSAGE_UNAUTHORIZED};

#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Envelope {
    pub(crate) success: &'static str,
    pub(crate) message: &'static str,
}

impl Envelope {
    pub(crate) const fn ok(message: &'static str) -> Self {
        Self {
            success: "true",
            message,
        }
    }

    const fn failed(message: &'static str) -> Self {
        Self {
            success: "false",
            message,
        }
    }
}

impl ApiError {
    const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    pub(crate) const fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, MESSAGE_UNAUTHORIZED)
    }

    pub(crate) const fn invalid_body() -> Self {
        Self::new(StatusCode::BAD_REQUEST, MESSAGE_INVALID_BODY)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(Envelope::failed(self.message))).into_response()
    }
}
