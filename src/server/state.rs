//! Shared state for request handlers

use std::sync::Arc;

use crate::verification::VerificationOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Verification state machine
    pub orchestrator: Arc<VerificationOrchestrator>,
}

impl AppState {
    /// Create new application state
    pub fn new(orchestrator: Arc<VerificationOrchestrator>) -> Self {
        Self { orchestrator }
    }
}
