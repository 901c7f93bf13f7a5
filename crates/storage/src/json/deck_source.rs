use std::fs;
use std::path::{Path, PathBuf};

use flash_core::model::Deck;

use super::mapping::DeckRecord;
use super::{io, ser};
use crate::repository::{DeckSource, StorageError};

/// Parse a deck document.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed JSON and
/// `StorageError::InvalidDeck` if the deck fails validation.
pub fn parse_deck(raw: &str) -> Result<Deck, StorageError> {
    let record: DeckRecord = serde_json::from_str(raw).map_err(ser)?;
    Ok(record.into_deck()?)
}

/// Reads a deck from a JSON file on every `load_deck` call.
#[derive(Debug, Clone)]
pub struct JsonDeckSource {
    path: PathBuf,
}

impl JsonDeckSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeckSource for JsonDeckSource {
    fn load_deck(&self) -> Result<Deck, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound);
            }
            Err(e) => return Err(io(e)),
        };
        let deck = parse_deck(&raw)?;
        tracing::debug!(
            path = %self.path.display(),
            title = deck.title(),
            cards = deck.cards().len(),
            "deck loaded"
        );
        Ok(deck)
    }
}
