use thiserror::Error;

use crate::activity::ActivityError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("storage error: {0}")]
    Store(#[from] eventcast_store::StoreError),

    #[error("delivery error: {0}")]
    Delivery(#[from] eventcast_delivery::DeliveryError),

    #[error("activity failed: {0}")]
    Activity(#[from] ActivityError),

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("no live orchestrator for workflow {0}")]
    WorkflowNotRunning(String),

    #[error("unsubscribe token is invalid, used, or expired")]
    TokenInvalid,
}

impl From<OrchestratorError> for ActivityError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Store(err) => err.into(),
            OrchestratorError::Delivery(err) => err.into(),
            OrchestratorError::Activity(err) => err,
            other => ActivityError::Permanent(other.to_string()),
        }
    }
}
