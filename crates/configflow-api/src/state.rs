//! Shared state handed to every handler.

use std::sync::Arc;

use configflow_core::ConfigUpdater;

pub(crate) struct ApiState {
    pub(crate) token: String,
    pub(crate) updater: Arc<dyn ConfigUpdater>,
}

impl ApiState {
    pub(crate) fn new(token: String, updater: Arc<dyn ConfigUpdater>) -> Self {
        Self { token, updater }
    }

    /// Constant-shape comparison against the issued token; an empty issued
    /// token never matches.
    pub(crate) fn accepts(&self, presented: &str) -> bool {
        if self.token.is_empty() || presented.len() != self.token.len() {
            return false;
        }
        presented
            .bytes()
            .zip(self.token.bytes())
            .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
