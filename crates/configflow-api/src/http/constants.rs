//! Shared HTTP constants.

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const BEARER_PREFIX: &str = "Bearer ";

pub(crate) const MESSAGE_UNAUTHORIZED: &str = "Unauthorized";
pub(crate) const MESSAGE_INVALID_BODY: &str = "Invalid request body";
pub(crate) const MESSAGE_UPDATE_STARTED: &str = "Config update task started";
