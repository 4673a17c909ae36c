//! Router, middleware and handlers.

pub(crate) mod auth;
pub(crate) mod constants;
pub(crate) mod errors;
pub(crate) mod handlers;
pub(crate) mod router;
