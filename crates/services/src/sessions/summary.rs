use flash_core::model::{Deck, Grade, SessionState, SessionSummary};

/// Derives summary statistics for a session.
///
/// `total_time_ms` is supplied by the caller so the live/completed choice
/// stays with the time accounting.
#[must_use]
pub fn summarize(deck: &Deck, state: &SessionState, total_time_ms: u64) -> SessionSummary {
    let known = state.count(Grade::Known);
    let not_yet = state.count(Grade::NotYet);

    let graded_time: u64 = state
        .results()
        .iter()
        .filter(|r| r.is_graded())
        .map(|r| r.time_spent_ms)
        .sum();
    let graded = u64::try_from(known + not_yet).unwrap_or(u64::MAX);
    let avg_time_ms = graded_time.checked_div(graded).unwrap_or(0);

    let hard_cards = deck
        .cards()
        .iter()
        .filter(|card| {
            state
                .results()
                .iter()
                .any(|r| r.card_id == card.id() && r.grade == Grade::NotYet)
        })
        .cloned()
        .collect();

    SessionSummary::new(
        known,
        not_yet,
        state.len(),
        total_time_ms,
        avg_time_ms,
        hard_cards,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_core::model::{Card, CardId, DeckSessionSettings, FilterSettings};

    fn build_deck() -> Deck {
        let cards = (1..=4)
            .map(|id| Card::new(CardId::new(id), format!("Q{id}"), format!("A{id}"), None))
            .collect();
        Deck::new("Deck", cards, DeckSessionSettings::default()).unwrap()
    }

    #[test]
    fn average_ignores_ungraded_cards() {
        let deck = build_deck();
        let ids = vec![CardId::new(4), CardId::new(2), CardId::new(1)];
        let mut state = SessionState::new("Deck", ids, 0, FilterSettings::default());
        state.record_grade(0, Grade::NotYet, 3_000, 10).unwrap();
        state.record_grade(1, Grade::Known, 5_000, 20).unwrap();
        state.bank_time(2, 90_000);

        let summary = summarize(&deck, &state, 42_000);
        assert_eq!(summary.known(), 1);
        assert_eq!(summary.not_yet(), 1);
        assert_eq!(summary.total_cards(), 3);
        assert_eq!(summary.avg_time_ms(), 4_000);
        assert_eq!(summary.total_time_ms(), 42_000);
        assert_eq!(summary.hard_cards().len(), 1);
        assert_eq!(summary.hard_cards()[0].id(), CardId::new(4));
    }

    #[test]
    fn nothing_graded_means_zero_average() {
        let deck = build_deck();
        let state = SessionState::new("Deck", vec![CardId::new(1)], 0, FilterSettings::default());
        let summary = summarize(&deck, &state, 0);
        assert_eq!(summary.avg_time_ms(), 0);
        assert_eq!(summary.avg_time(), "00:00");
        assert!(summary.hard_cards().is_empty());
    }

    #[test]
    fn hard_cards_follow_deck_order() {
        let deck = build_deck();
        let ids = vec![CardId::new(3), CardId::new(1)];
        let mut state = SessionState::new("Deck", ids, 0, FilterSettings::default());
        state.record_grade(0, Grade::NotYet, 0, 1).unwrap();
        state.record_grade(1, Grade::NotYet, 0, 2).unwrap();

        let hard: Vec<u64> = summarize(&deck, &state, 0)
            .hard_cards()
            .iter()
            .map(|c| c.id().value())
            .collect();
        assert_eq!(hard, vec![1, 3]);
    }
}
