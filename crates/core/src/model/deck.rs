use std::collections::{BTreeSet, HashSet};

use thiserror::Error;

use crate::model::card::Card;
use crate::model::ids::CardId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck title cannot be empty")]
    EmptyTitle,

    #[error("duplicate card id {0} in deck")]
    DuplicateCardId(CardId),
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Session defaults shipped with a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeckSessionSettings {
    shuffle: bool,
    show_timer: bool,
}

impl DeckSessionSettings {
    #[must_use]
    pub fn new(shuffle: bool, show_timer: bool) -> Self {
        Self {
            shuffle,
            show_timer,
        }
    }

    /// Whether sessions shuffle the working set unless told otherwise.
    #[must_use]
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Whether the front-end should run the elapsed-time ticker.
    #[must_use]
    pub fn show_timer(&self) -> bool {
        self.show_timer
    }
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// An immutable, ordered collection of cards.
///
/// The title doubles as the persistence key for saved sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    title: String,
    cards: Vec<Card>,
    session: DeckSessionSettings,
}

impl Deck {
    /// Creates a deck, keeping cards in the given order.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyTitle` if the title is blank.
    /// Returns `DeckError::DuplicateCardId` if two cards share an id.
    pub fn new(
        title: impl Into<String>,
        cards: Vec<Card>,
        session: DeckSessionSettings,
    ) -> Result<Self, DeckError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DeckError::EmptyTitle);
        }

        let mut seen = HashSet::with_capacity(cards.len());
        for card in &cards {
            if !seen.insert(card.id()) {
                return Err(DeckError::DuplicateCardId(card.id()));
            }
        }

        Ok(Self {
            title,
            cards,
            session,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[must_use]
    pub fn session(&self) -> DeckSessionSettings {
        self.session
    }

    #[must_use]
    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id() == id)
    }

    /// Sorted, de-duplicated tags used by the cards of this deck.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.cards
            .iter()
            .filter_map(Card::tag)
            .map(str::to_owned)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
