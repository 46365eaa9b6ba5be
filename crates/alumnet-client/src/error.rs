use thiserror::Error;

use alumnet_shared::error::ValidationError;
use alumnet_store::BackendError;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Rejected before reaching the backend.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend call failed; local state was left as it was.
    #[error("Backend request failed: {0}")]
    Backend(#[from] BackendError),

    /// A referenced profile, conversation peer or record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The sync bridge task is gone, usually after sign-out.
    #[error("Sync bridge is not running")]
    Closed,
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}
