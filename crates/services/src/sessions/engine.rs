use std::fmt;
use std::sync::Arc;

use flash_core::Clock;
use flash_core::model::{
    Card, CardResult, Deck, FilterSettings, Grade, GradeError, SessionState, SessionSummary,
};
use storage::SessionStore;

use super::plan::WorkingSetBuilder;
use super::progress::SessionProgress;
use super::{summary, timing};
use crate::error::SessionError;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// How the engine obtained its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    Fresh,
    Resumed,
}

/// Result of a grading request. Rejections leave the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeOutcome {
    Applied { completed_session: bool },
    Rejected(GradeError),
}

impl GradeOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, GradeOutcome::Applied { .. })
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Drives one study session over a deck.
///
/// The engine owns its `SessionState` and persists it through the store after
/// every grade or navigation. It never clears persisted data itself.
pub struct SessionEngine {
    deck: Arc<Deck>,
    store: Arc<dyn SessionStore>,
    clock: Clock,
    state: SessionState,
    working_set: Vec<Card>,
    card_started_at: i64,
    origin: SessionOrigin,
}

impl SessionEngine {
    /// Resume the saved session for `deck`, or build a fresh one from `filters`.
    ///
    /// A saved session always wins over `filters`, including a saved
    /// follow-up whose filters carry `repeat_only_hard`. Resumed state
    /// referencing cards no longer in the deck is compacted and saved again.
    ///
    /// # Errors
    ///
    /// Propagates store failures via `SessionError::Storage`.
    pub fn start(
        deck: Arc<Deck>,
        filters: FilterSettings,
        store: Arc<dyn SessionStore>,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let now = clock.now_ms();
        let (state, origin) = match store.load(deck.title())? {
            Some(saved) if saved.is_consistent() => {
                (Self::reconcile(&deck, saved, store.as_ref())?, SessionOrigin::Resumed)
            }
            Some(saved) => {
                tracing::warn!(
                    deck = deck.title(),
                    session_id = %saved.session_id(),
                    "saved session is inconsistent; starting a fresh one"
                );
                (Self::initialize(&deck, &filters, store.as_ref(), now)?, SessionOrigin::Fresh)
            }
            None => (Self::initialize(&deck, &filters, store.as_ref(), now)?, SessionOrigin::Fresh),
        };
        Ok(Self::assemble(deck, store, clock, state, origin, now))
    }

    /// Build a new session from `filters` without looking at the saved one.
    ///
    /// Nothing is persisted until the first grade or navigation, so the
    /// caller can still clear the previous session's key afterwards.
    ///
    /// # Errors
    ///
    /// Propagates store failures via `SessionError::Storage`.
    pub fn start_fresh(
        deck: Arc<Deck>,
        filters: FilterSettings,
        store: Arc<dyn SessionStore>,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let now = clock.now_ms();
        let state = Self::initialize(&deck, &filters, store.as_ref(), now)?;
        Ok(Self::assemble(deck, store, clock, state, SessionOrigin::Fresh, now))
    }

    fn assemble(
        deck: Arc<Deck>,
        store: Arc<dyn SessionStore>,
        clock: Clock,
        state: SessionState,
        origin: SessionOrigin,
        now: i64,
    ) -> Self {
        let working_set = state
            .card_order_ids()
            .iter()
            .filter_map(|id| deck.card(*id).cloned())
            .collect();

        tracing::info!(
            deck = deck.title(),
            session_id = %state.session_id(),
            origin = ?origin,
            cards = state.len(),
            completed = state.is_completed(),
            "session ready"
        );

        Self {
            deck,
            store,
            clock,
            state,
            working_set,
            card_started_at: now,
            origin,
        }
    }

    fn initialize(
        deck: &Deck,
        filters: &FilterSettings,
        store: &dyn SessionStore,
        now: i64,
    ) -> Result<SessionState, SessionError> {
        let history = if filters.repeat_only_hard {
            store.deck_results(deck.title())?
        } else {
            Vec::new()
        };

        let plan = WorkingSetBuilder::new(deck, filters)
            .with_history(&history)
            .build();
        if plan.hard_fallback {
            tracing::info!(
                deck = deck.title(),
                "no hard cards recorded; falling back to the full selection"
            );
        }

        Ok(SessionState::new(
            deck.title(),
            plan.card_ids(),
            now,
            plan.effective_filters,
        ))
    }

    fn reconcile(
        deck: &Deck,
        mut state: SessionState,
        store: &dyn SessionStore,
    ) -> Result<SessionState, SessionError> {
        let dropped = state.retain_cards(|id| deck.card(id).is_some());
        if !dropped.is_empty() {
            tracing::warn!(
                deck = deck.title(),
                dropped = ?dropped,
                "saved session referenced cards missing from the deck"
            );
            store.save(&state)?;
        }
        Ok(state)
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn origin(&self) -> SessionOrigin {
        self.origin
    }

    /// Filters the session actually runs with, after any fallback.
    #[must_use]
    pub fn effective_filters(&self) -> &FilterSettings {
        self.state.filter_settings()
    }

    /// Cards of the session, in presentation order.
    #[must_use]
    pub fn working_set(&self) -> &[Card] {
        &self.working_set
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.working_set.is_empty()
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        self.working_set.get(self.state.current_card_index())
    }

    #[must_use]
    pub fn current_result(&self) -> Option<&CardResult> {
        self.state.current_result()
    }

    #[must_use]
    pub fn is_current_card_graded(&self) -> bool {
        self.current_result().is_some_and(CardResult::is_graded)
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// The session may be finished only once every card is graded.
    #[must_use]
    pub fn can_finish(&self) -> bool {
        self.state.is_completed()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let graded = self.state.graded_count();
        SessionProgress {
            total: self.state.len(),
            graded,
            remaining: self.state.len().saturating_sub(graded),
            position: self.state.current_card_index(),
            is_complete: self.state.is_completed(),
        }
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Mutable clock access, used to advance fixed clocks in tests.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Grade the current card.
    ///
    /// Already-graded cards, `Grade::Ungraded` and an empty working set are
    /// rejected without touching state or store.
    ///
    /// # Errors
    ///
    /// Propagates store failures via `SessionError::Storage`. The grade is
    /// kept in memory even if saving fails.
    pub fn grade_card(&mut self, grade: Grade) -> Result<GradeOutcome, SessionError> {
        let now = self.clock.now_ms();
        let index = self.state.current_card_index();
        let elapsed = timing::elapsed_ms(self.card_started_at, now);

        let completed_session = match self.state.record_grade(index, grade, elapsed, now) {
            Ok(completed) => completed,
            Err(reason) => {
                tracing::warn!(%reason, "grade rejected");
                return Ok(GradeOutcome::Rejected(reason));
            }
        };

        if completed_session {
            tracing::info!(
                deck = self.deck.title(),
                session_id = %self.state.session_id(),
                "session completed"
            );
        }

        self.card_started_at = now;
        self.store.save(&self.state)?;
        Ok(GradeOutcome::Applied { completed_session })
    }

    /// Advance to the next card. Returns false at the end of the working set.
    ///
    /// # Errors
    ///
    /// Propagates store failures via `SessionError::Storage`.
    pub fn go_to_next(&mut self) -> Result<bool, SessionError> {
        self.navigate(SessionState::step_forward)
    }

    /// Step back to the previous card. Returns false at the first card.
    ///
    /// # Errors
    ///
    /// Propagates store failures via `SessionError::Storage`.
    pub fn go_to_previous(&mut self) -> Result<bool, SessionError> {
        self.navigate(SessionState::step_back)
    }

    fn navigate(&mut self, step: fn(&mut SessionState) -> bool) -> Result<bool, SessionError> {
        let now = self.clock.now_ms();
        let from = self.state.current_card_index();
        if !step(&mut self.state) {
            return Ok(false);
        }

        // Bank the visit so an ungraded card keeps its time across visits.
        self.state
            .bank_time(from, timing::elapsed_ms(self.card_started_at, now));
        self.card_started_at = now;
        self.store.save(&self.state)?;

        tracing::debug!(
            from,
            to = self.state.current_card_index(),
            "moved to card"
        );
        Ok(true)
    }

    //
    // ─── DERIVED VALUES ────────────────────────────────────────────────────────
    //

    /// Time spent on the current card, including earlier visits.
    #[must_use]
    pub fn time_on_current_card_ms(&self) -> u64 {
        self.current_result().map_or(0, |r| {
            timing::time_on_card_ms(r, self.card_started_at, self.clock.now_ms())
        })
    }

    #[must_use]
    pub fn total_session_time_ms(&self) -> u64 {
        timing::session_time_ms(&self.state, self.card_started_at, self.clock.now_ms())
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        summary::summarize(&self.deck, &self.state, self.total_session_time_ms())
    }

    /// Build a follow-up engine over the cards last graded `NotYet`, keeping
    /// this session's tag and shuffle settings.
    ///
    /// `self` is left untouched. Clearing the old persisted session before
    /// using the new engine is up to the caller.
    ///
    /// # Errors
    ///
    /// Propagates store failures via `SessionError::Storage`.
    pub fn reset_for_hard_cards(&self) -> Result<SessionEngine, SessionError> {
        Self::start_fresh(
            Arc::clone(&self.deck),
            self.state.filter_settings().repeat_hard(),
            Arc::clone(&self.store),
            self.clock,
        )
    }
}

impl fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEngine")
            .field("deck", &self.deck.title())
            .field("session_id", &self.state.session_id())
            .field("cards_len", &self.working_set.len())
            .field("current", &self.state.current_card_index())
            .field("graded", &self.state.graded_count())
            .field("completed", &self.state.is_completed())
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use flash_core::model::{CardId, DeckSessionSettings};
    use flash_core::time::fixed_clock;
    use storage::InMemorySessionStore;

    fn build_deck(n: u64) -> Arc<Deck> {
        let cards = (1..=n)
            .map(|id| {
                let tag = if id % 2 == 0 { Some("even".to_string()) } else { None };
                Card::new(CardId::new(id), format!("Q{id}"), format!("A{id}"), tag)
            })
            .collect();
        Arc::new(Deck::new("Deck", cards, DeckSessionSettings::default()).unwrap())
    }

    fn start(deck: &Arc<Deck>, store: &Arc<InMemorySessionStore>) -> SessionEngine {
        let store: Arc<dyn SessionStore> = store.clone();
        SessionEngine::start(Arc::clone(deck), FilterSettings::default(), store, fixed_clock())
            .unwrap()
    }

    fn advance(engine: &mut SessionEngine, secs: i64) {
        engine.clock_mut().advance(Duration::seconds(secs));
    }

    #[test]
    fn fresh_session_starts_at_first_card() {
        let deck = build_deck(3);
        let store = Arc::new(InMemorySessionStore::new());
        let engine = start(&deck, &store);

        assert_eq!(engine.origin(), SessionOrigin::Fresh);
        assert_eq!(engine.state().len(), 3);
        assert_eq!(engine.state().current_card_index(), 0);
        assert!(!engine.is_completed());
        assert_eq!(engine.current_card().unwrap().id(), CardId::new(1));
        assert_eq!(engine.state().session_start_time(), fixed_clock().now_ms());
        // Not persisted until the first transition.
        assert!(store.load("Deck").unwrap().is_none());
    }

    #[test]
    fn grading_accumulates_time_and_persists() {
        let deck = build_deck(2);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);

        advance(&mut engine, 4);
        assert_eq!(engine.time_on_current_card_ms(), 4_000);
        let outcome = engine.grade_card(Grade::Known).unwrap();
        assert_eq!(outcome, GradeOutcome::Applied { completed_session: false });

        let result = engine.current_result().unwrap();
        assert_eq!(result.grade, Grade::Known);
        assert_eq!(result.time_spent_ms, 4_000);
        assert_eq!(result.reviewed_at, engine.clock().now_ms());
        assert!(engine.is_current_card_graded());

        advance(&mut engine, 30);
        assert_eq!(engine.time_on_current_card_ms(), 4_000);
        assert_eq!(store.load("Deck").unwrap().unwrap(), *engine.state());
    }

    #[test]
    fn regrading_is_a_noop() {
        let deck = build_deck(2);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);

        advance(&mut engine, 2);
        engine.grade_card(Grade::NotYet).unwrap();
        let before = engine.state().clone();

        advance(&mut engine, 9);
        let outcome = engine.grade_card(Grade::Known).unwrap();
        assert_eq!(
            outcome,
            GradeOutcome::Rejected(GradeError::AlreadyGraded(CardId::new(1)))
        );
        assert!(!outcome.is_applied());
        assert_eq!(*engine.state(), before);
        assert_eq!(store.load("Deck").unwrap().unwrap(), before);
    }

    #[test]
    fn ungraded_is_not_accepted_as_a_grade() {
        let deck = build_deck(1);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);
        let outcome = engine.grade_card(Grade::Ungraded).unwrap();
        assert_eq!(outcome, GradeOutcome::Rejected(GradeError::NotAGrade));
        assert!(store.load("Deck").unwrap().is_none());
    }

    #[test]
    fn navigation_is_bounded() {
        let deck = build_deck(2);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);

        assert!(!engine.go_to_previous().unwrap());
        assert!(engine.go_to_next().unwrap());
        assert!(!engine.go_to_next().unwrap());
        assert_eq!(engine.state().current_card_index(), 1);
        assert!(engine.go_to_previous().unwrap());
        assert_eq!(engine.state().current_card_index(), 0);
        assert_eq!(store.load("Deck").unwrap().unwrap().current_card_index(), 0);
    }

    #[test]
    fn time_accumulates_across_visits() {
        let deck = build_deck(2);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);

        advance(&mut engine, 3);
        engine.go_to_next().unwrap();
        advance(&mut engine, 10);
        engine.go_to_previous().unwrap();
        assert_eq!(engine.time_on_current_card_ms(), 3_000);

        advance(&mut engine, 2);
        assert_eq!(engine.time_on_current_card_ms(), 5_000);
        engine.grade_card(Grade::Known).unwrap();
        assert_eq!(engine.state().results()[0].time_spent_ms, 5_000);
        assert_eq!(engine.state().results()[1].time_spent_ms, 10_000);
    }

    #[test]
    fn navigation_away_from_graded_card_keeps_time_frozen() {
        let deck = build_deck(2);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);

        advance(&mut engine, 3);
        engine.grade_card(Grade::Known).unwrap();
        advance(&mut engine, 20);
        engine.go_to_next().unwrap();
        assert_eq!(engine.state().results()[0].time_spent_ms, 3_000);
        assert_eq!(engine.time_on_current_card_ms(), 0);
    }

    #[test]
    fn live_total_counts_cards_up_to_current() {
        let deck = build_deck(3);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);

        advance(&mut engine, 5);
        engine.grade_card(Grade::Known).unwrap();
        engine.go_to_next().unwrap();
        advance(&mut engine, 7);
        assert_eq!(engine.total_session_time_ms(), 12_000);
    }

    #[test]
    fn completion_freezes_total_time() {
        let deck = build_deck(3);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);

        advance(&mut engine, 1);
        engine.grade_card(Grade::NotYet).unwrap();
        engine.go_to_next().unwrap();
        advance(&mut engine, 2);
        engine.grade_card(Grade::Known).unwrap();
        engine.go_to_next().unwrap();
        advance(&mut engine, 3);
        assert!(!engine.can_finish());
        let outcome = engine.grade_card(Grade::NotYet).unwrap();
        assert_eq!(outcome, GradeOutcome::Applied { completed_session: true });
        assert!(engine.is_completed());
        assert!(engine.can_finish());

        advance(&mut engine, 600);
        assert_eq!(engine.total_session_time_ms(), 6_000);

        let summary = engine.summary();
        assert_eq!(summary.known(), 1);
        assert_eq!(summary.not_yet(), 2);
        assert_eq!(summary.total_time(), "00:06");
        assert_eq!(summary.avg_time_ms(), 2_000);
        let hard: Vec<u64> = summary.hard_cards().iter().map(|c| c.id().value()).collect();
        assert_eq!(hard, vec![1, 3]);

        // Browsing a completed session never reopens it.
        engine.go_to_previous().unwrap();
        assert!(engine.is_completed());
        assert!(store.load("Deck").unwrap().unwrap().is_completed());
    }

    #[test]
    fn empty_working_set_constructs_and_rejects_grades() {
        let deck = build_deck(3);
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let filters = FilterSettings::new(Some("missing".into()), false, false);
        let mut engine = SessionEngine::start(deck, filters, store, fixed_clock()).unwrap();

        assert!(engine.is_empty());
        assert!(engine.current_card().is_none());
        assert!(!engine.go_to_next().unwrap());
        assert!(!engine.go_to_previous().unwrap());
        assert_eq!(
            engine.grade_card(Grade::Known).unwrap(),
            GradeOutcome::Rejected(GradeError::OutOfRange(0))
        );
        assert_eq!(engine.time_on_current_card_ms(), 0);
        assert!(!engine.is_completed());
    }

    #[test]
    fn resumes_saved_session_verbatim() {
        let deck = build_deck(3);
        let store = Arc::new(InMemorySessionStore::new());
        let mut first = start(&deck, &store);
        advance(&mut first, 5);
        first.grade_card(Grade::Known).unwrap();
        first.go_to_next().unwrap();
        let saved = first.state().clone();

        // Different filters are ignored when a saved session exists.
        let filters = FilterSettings::new(Some("even".into()), false, true);
        let store_dyn: Arc<dyn SessionStore> = store.clone();
        let mut resumed =
            SessionEngine::start(Arc::clone(&deck), filters, store_dyn, fixed_clock()).unwrap();

        assert_eq!(resumed.origin(), SessionOrigin::Resumed);
        assert_eq!(*resumed.state(), saved);
        assert_eq!(resumed.effective_filters(), &FilterSettings::default());
        assert_eq!(resumed.current_card().unwrap().id(), CardId::new(2));

        advance(&mut resumed, 8);
        assert_eq!(resumed.time_on_current_card_ms(), 8_000);
        assert_eq!(resumed.state().results()[0].time_spent_ms, 5_000);
    }

    #[test]
    fn progress_reports_counts() {
        let deck = build_deck(3);
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = start(&deck, &store);
        engine.grade_card(Grade::Known).unwrap();
        engine.go_to_next().unwrap();

        let progress = engine.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.graded, 1);
        assert_eq!(progress.remaining, 2);
        assert_eq!(progress.position, 1);
        assert!(!progress.is_complete);
    }
}
