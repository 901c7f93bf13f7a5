use serde::{Deserialize, Serialize};

use crate::model::deck::Deck;

/// Options that select and order the working set of a session.
///
/// Copied into the session state when the session is created and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    #[serde(default)]
    pub filter_tag: Option<String>,
    #[serde(default)]
    pub repeat_only_hard: bool,
    #[serde(default)]
    pub shuffle: bool,
}

impl FilterSettings {
    #[must_use]
    pub fn new(filter_tag: Option<String>, repeat_only_hard: bool, shuffle: bool) -> Self {
        Self {
            filter_tag: filter_tag.filter(|t| !t.trim().is_empty()),
            repeat_only_hard,
            shuffle,
        }
    }

    /// Start-screen defaults: no tag, all cards, the deck's shuffle preference.
    #[must_use]
    pub fn from_deck(deck: &Deck) -> Self {
        Self::new(None, false, deck.session().shuffle())
    }

    /// Same tag and shuffle, restricted to cards last graded `NotYet`.
    #[must_use]
    pub fn repeat_hard(&self) -> Self {
        Self {
            repeat_only_hard: true,
            ..self.clone()
        }
    }
}
