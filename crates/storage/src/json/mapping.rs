use flash_core::model::{Card, CardId, Deck, DeckError, DeckSessionSettings};
use serde::Deserialize;

/// On-disk shape of a deck file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckRecord {
    pub deck_title: String,
    pub cards: Vec<CardRecord>,
    #[serde(default)]
    pub session: DeckSessionRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardRecord {
    pub id: u64,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSessionRecord {
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub show_timer: bool,
}

impl DeckRecord {
    /// Convert the record into a validated domain `Deck`.
    ///
    /// # Errors
    ///
    /// Returns `DeckError` if the title is blank or card ids repeat.
    pub fn into_deck(self) -> Result<Deck, DeckError> {
        let cards = self.cards.into_iter().map(CardRecord::into_card).collect();
        Deck::new(
            self.deck_title,
            cards,
            DeckSessionSettings::new(self.session.shuffle, self.session.show_timer),
        )
    }
}

impl CardRecord {
    #[must_use]
    pub fn into_card(self) -> Card {
        Card::new(CardId::new(self.id), self.front, self.back, self.tag)
    }
}
