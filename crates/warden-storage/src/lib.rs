//! Storage abstraction for warden.
//!
//! Backend crates (e.g., warden-store-sqlite) implement the [`Store`] trait so
//! `warden-core` doesn't depend on any specific database engine or schema
//! details. Everything here is scoped by workspace: roles, permission
//! overrides, and the read side of workspace membership.

use thiserror::Error;

mod store;
mod types;

pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("limit exceeded")]
    LimitExceeded,
    #[error("backend error: {0}")]
    Backend(String),
}
