//! Shared error types for the services crate.

use thiserror::Error;

use storage::StorageError;

/// Errors emitted by session services.
///
/// Domain rejections (re-grading, out-of-range navigation) are not errors;
/// only collaborator failures surface here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
