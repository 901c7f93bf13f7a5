use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

use flash_core::model::{Card, CardId, CardResult, Deck, FilterSettings, Grade};

/// Selection result for a session build.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSetPlan {
    pub cards: Vec<Card>,
    /// Filters as they will be persisted. `repeat_only_hard` is forced off
    /// when no hard cards were found.
    pub effective_filters: FilterSettings,
    pub hard_fallback: bool,
}

impl WorkingSetPlan {
    #[must_use]
    pub fn card_ids(&self) -> Vec<CardId> {
        self.cards.iter().map(Card::id).collect()
    }

    /// Returns true when no cards were selected for this session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Builds the ordered working set of a fresh session from a deck.
///
/// Steps, in order: tag filter, hard-only filter (with fallback), shuffle.
pub struct WorkingSetBuilder<'a> {
    deck: &'a Deck,
    filters: &'a FilterSettings,
    history: &'a [CardResult],
}

impl<'a> WorkingSetBuilder<'a> {
    #[must_use]
    pub fn new(deck: &'a Deck, filters: &'a FilterSettings) -> Self {
        Self {
            deck,
            filters,
            history: &[],
        }
    }

    /// Prior graded results for the deck, consulted only in hard-only mode.
    #[must_use]
    pub fn with_history(mut self, history: &'a [CardResult]) -> Self {
        self.history = history;
        self
    }

    /// Build with the thread-local RNG.
    #[must_use]
    pub fn build(self) -> WorkingSetPlan {
        self.build_with_rng(&mut rand::rng())
    }

    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> WorkingSetPlan {
        let mut effective_filters = self.filters.clone();

        let mut cards: Vec<Card> = match self.filters.filter_tag.as_deref() {
            Some(tag) => self
                .deck
                .cards()
                .iter()
                .filter(|c| c.has_tag(tag))
                .cloned()
                .collect(),
            None => self.deck.cards().to_vec(),
        };

        let mut hard_fallback = false;
        if self.filters.repeat_only_hard {
            let hard = latest_grades(self.history);
            let hard_cards: Vec<Card> = cards
                .iter()
                .filter(|c| hard.get(&c.id()) == Some(&Grade::NotYet))
                .cloned()
                .collect();
            if hard_cards.is_empty() {
                effective_filters.repeat_only_hard = false;
                hard_fallback = true;
            } else {
                cards = hard_cards;
            }
        }

        // `shuffle` walks from the back, swapping each slot with a uniformly
        // chosen slot at or before it.
        if self.filters.shuffle {
            cards.shuffle(rng);
        }

        WorkingSetPlan {
            cards,
            effective_filters,
            hard_fallback,
        }
    }
}

/// Most recent grade per card. Later entries win ties on `reviewed_at`.
fn latest_grades(history: &[CardResult]) -> HashMap<CardId, Grade> {
    let mut latest: HashMap<CardId, (i64, Grade)> = HashMap::new();
    for result in history.iter().filter(|r| r.is_graded()) {
        let entry = latest
            .entry(result.card_id)
            .or_insert((result.reviewed_at, result.grade));
        if result.reviewed_at >= entry.0 {
            *entry = (result.reviewed_at, result.grade);
        }
    }
    latest.into_iter().map(|(id, (_, grade))| (id, grade)).collect()
}
