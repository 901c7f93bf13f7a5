//! JSON-on-disk adapters: a per-deck session file store and a deck loader.

use std::path::Path;
use std::sync::Arc;

use crate::repository::{Storage, StorageError};

mod deck_source;
mod mapping;
mod session_store;

pub use deck_source::{JsonDeckSource, parse_deck};
pub use mapping::{CardRecord, DeckRecord, DeckSessionRecord};
pub use session_store::JsonFileSessionStore;

fn io(e: std::io::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

fn ser(e: serde_json::Error) -> StorageError {
    StorageError::Serialization(e.to_string())
}

impl Storage {
    /// Build a `Storage` backed by JSON files in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn json_dir(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let store = JsonFileSessionStore::open(dir)?;
        Ok(Self {
            sessions: Arc::new(store),
        })
    }
}
