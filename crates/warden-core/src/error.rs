//! Error taxonomy for the permission engine.

use thiserror::Error;
use warden_storage::StoreError;

/// Errors surfaced by role, matrix, template, and cache operations.
///
/// Validation and authorization errors are synchronous and abort any open
/// transaction; side-effect failures (audit, cache) are never surfaced
/// through this type.
#[derive(Debug, Error)]
pub enum Error {
    /// Role, template, or membership missing.
    #[error("not found: {0}")]
    NotFound(String),
    /// Invalid input: unknown resource/permission pair, reserved or
    /// malformed name, count cap, empty bulk input, bad reorder set,
    /// member-referenced delete, role not template-derived.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Duplicate role name within a workspace.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Mutating or deleting a system role.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Error::NotFound("not found".to_string()),
            StoreError::AlreadyExists => Error::Conflict("already exists".to_string()),
            StoreError::LimitExceeded => Error::BadRequest("limit exceeded".to_string()),
            StoreError::Backend(msg) => Error::Storage(msg),
        }
    }
}
