use thiserror::Error;
use uuid::Uuid;

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

/// Errors returned by registry operations.
///
/// All of them are ordinary return values; none is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The identifier is already tracked. Indicates a caller bug.
    #[error("dropped table {0} is already tracked")]
    AlreadyExists(Uuid),
    /// The identifier is not tracked, or has no reclaim in flight.
    #[error("dropped table {0} not found")]
    NotFound(Uuid),
    /// A conflicting transition is underway; retry later.
    #[error("dropped table {0} is being reclaimed")]
    InProgress(Uuid),
    /// The physical delete failed or timed out; the entry is pending again.
    #[error("failed to delete dropped table {uuid}: {reason}")]
    DeleteFailed { uuid: Uuid, reason: String },
}

impl RegistryError {
    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::InProgress(_) | RegistryError::DeleteFailed { .. }
        )
    }
}
