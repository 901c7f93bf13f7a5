#![forbid(unsafe_code)]

pub mod json;
pub mod repository;

pub use repository::{InMemorySessionStore, SessionStore, Storage, StorageError};
