//! Tenants service errors.

use thiserror::Error;

use crate::domain::tenants::store::StoreError;

/// Tenant service error variants.
#[derive(Debug, Error)]
pub enum TenantsServiceError {
    /// Tenant was not found.
    #[error("tenant not found")]
    NotFound,

    /// The requested parent tenant does not exist.
    #[error("parent tenant not found")]
    ParentNotFound,

    /// A sibling under the same parent already has the name.
    #[error("a sibling tenant already uses this name")]
    DuplicateSibling,

    /// The parent link would make a tenant its own ancestor.
    #[error("tenant hierarchy would contain a cycle")]
    CycleDetected,

    /// Provided data failed validation.
    #[error("invalid tenant data: {0}")]
    ValidationFailed(&'static str),

    /// The store could not complete the transaction; safe to retry.
    #[error("tenant store unavailable")]
    StoreUnavailable(#[source] StoreError),

    /// The tree was found in a state no committed mutation may produce.
    #[error("tenant hierarchy integrity violated: {0}")]
    PartialFailureInvariantViolation(&'static str),
}

impl TenantsServiceError {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for TenantsServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateName => Self::DuplicateSibling,
            StoreError::InvalidReference => Self::ParentNotFound,
            StoreError::InvalidData => Self::ValidationFailed("rejected by the tenant store"),
            StoreError::AlreadyExists | StoreError::Unavailable(_) | StoreError::Sql(_) => {
                Self::StoreUnavailable(error)
            }
        }
    }
}
