use crate::model::ids::CardId;

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

/// A single flashcard owned by a deck.
///
/// Cards are immutable once loaded. An empty or whitespace-only tag is
/// treated as no tag at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    id: CardId,
    front: String,
    back: String,
    tag: Option<String>,
}

impl Card {
    #[must_use]
    pub fn new(
        id: CardId,
        front: impl Into<String>,
        back: impl Into<String>,
        tag: Option<String>,
    ) -> Self {
        let tag = tag.filter(|t| !t.trim().is_empty());
        Self {
            id,
            front: front.into(),
            back: back.into(),
            tag,
        }
    }

    #[must_use]
    pub fn id(&self) -> CardId {
        self.id
    }

    #[must_use]
    pub fn front(&self) -> &str {
        &self.front
    }

    #[must_use]
    pub fn back(&self) -> &str {
        &self.back
    }

    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Exact, case-sensitive tag comparison.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tag_is_dropped() {
        let card = Card::new(CardId::new(1), "Q", "A", Some("  ".into()));
        assert_eq!(card.tag(), None);
    }

    #[test]
    fn tag_match_is_exact() {
        let card = Card::new(CardId::new(1), "Q", "A", Some("Verbs".into()));
        assert!(card.has_tag("Verbs"));
        assert!(!card.has_tag("verbs"));
        assert!(!card.has_tag("Verb"));
    }
}
