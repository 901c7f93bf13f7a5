use flash_core::model::{CardResult, Deck, DeckError, SessionState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    InvalidDeck(#[from] DeckError),
}

/// Key/value persistence for session state, keyed by deck title.
///
/// The last `save` for a deck wins; `load` returns it until `clear` is called.
/// Implementations keep the most recent saved sessions as history so that
/// `deck_results` can answer across sessions.
pub trait SessionStore: Send + Sync {
    /// Fetch the active session for a deck, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing medium cannot be read.
    fn load(&self, deck_title: &str) -> Result<Option<SessionState>, StorageError>;

    /// Persist a session and make it the active one for its deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state cannot be written.
    fn save(&self, state: &SessionState) -> Result<(), StorageError>;

    /// Forget the active session for a deck. History is kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing medium cannot be written.
    fn clear(&self, deck_title: &str) -> Result<(), StorageError>;

    /// Every graded result ever saved for a deck, oldest review first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing medium cannot be read.
    fn deck_results(&self, deck_title: &str) -> Result<Vec<CardResult>, StorageError>;
}

/// Supplies the immutable deck a session is built from.
pub trait DeckSource: Send + Sync {
    /// Load and validate the deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck cannot be read or fails validation.
    fn load_deck(&self) -> Result<Deck, StorageError>;
}

/// Sessions kept per deck. The oldest inactive ones are dropped first.
pub(crate) const MAX_SESSION_HISTORY: usize = 32;

/// Everything a store remembers about one deck: the saved sessions and a
/// pointer to the active one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeckSessions {
    active: Option<Uuid>,
    sessions: Vec<SessionState>,
}

impl DeckSessions {
    pub(crate) fn active(&self) -> Option<&SessionState> {
        let id = self.active?;
        self.sessions.iter().find(|s| s.session_id() == id)
    }

    pub(crate) fn save(&mut self, state: &SessionState) {
        let id = state.session_id();
        match self.sessions.iter_mut().find(|s| s.session_id() == id) {
            Some(existing) => *existing = state.clone(),
            None => self.sessions.push(state.clone()),
        }
        self.active = Some(id);

        // Only a push grows the list, so the active session is last here.
        let overflow = self.sessions.len().saturating_sub(MAX_SESSION_HISTORY);
        self.sessions.drain(..overflow);
    }

    pub(crate) fn clear(&mut self) {
        self.active = None;
    }

    pub(crate) fn graded_results(&self) -> Vec<CardResult> {
        let mut results: Vec<CardResult> = self
            .sessions
            .iter()
            .flat_map(|s| s.results().iter())
            .filter(|r| r.is_graded())
            .cloned()
            .collect();
        results.sort_by_key(|r| r.reviewed_at);
        results
    }
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    decks: Arc<Mutex<HashMap<String, DeckSessions>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_deck<T>(
        &self,
        deck_title: &str,
        f: impl FnOnce(&mut DeckSessions) -> T,
    ) -> Result<T, StorageError> {
        let mut guard = self
            .decks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(f(guard.entry(deck_title.to_owned()).or_default()))
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, deck_title: &str) -> Result<Option<SessionState>, StorageError> {
        self.with_deck(deck_title, |deck| deck.active().cloned())
    }

    fn save(&self, state: &SessionState) -> Result<(), StorageError> {
        self.with_deck(state.deck_title(), |deck| deck.save(state))
    }

    fn clear(&self, deck_title: &str) -> Result<(), StorageError> {
        self.with_deck(deck_title, DeckSessions::clear)
    }

    fn deck_results(&self, deck_title: &str) -> Result<Vec<CardResult>, StorageError> {
        self.with_deck(deck_title, |deck| deck.graded_results())
    }
}

/// Bundles the session store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
}
