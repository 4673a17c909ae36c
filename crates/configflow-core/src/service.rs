//! Seam implemented by the update orchestrator and consumed by the HTTP layer.

use crate::model::UpdateRequest;

/// Accepts configuration updates for detached execution.
///
/// Implementations must return promptly: the caller acknowledges the request as
/// soon as `submit` returns, and the outcome is observable only through logs and
/// the filesystem.
pub trait ConfigUpdater: Send + Sync {
    /// Hand the request over for background processing.
    fn submit(&self, request: UpdateRequest);
}
