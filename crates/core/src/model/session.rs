use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{CardId, FilterSettings, Grade};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Why a grade could not be recorded. None of these change the state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradeError {
    #[error("card {0} is already graded")]
    AlreadyGraded(CardId),

    #[error("`Ungraded` cannot be recorded as a grade")]
    NotAGrade,

    #[error("no card at position {0}")]
    OutOfRange(usize),
}

//
// ─── CARD RESULT ───────────────────────────────────────────────────────────────
//

/// Per-card bookkeeping for one session.
///
/// `reviewed_at` is a Unix timestamp in milliseconds, `0` while ungraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResult {
    pub card_id: CardId,
    pub grade: Grade,
    pub time_spent_ms: u64,
    pub reviewed_at: i64,
}

impl CardResult {
    #[must_use]
    pub fn ungraded(card_id: CardId) -> Self {
        Self {
            card_id,
            grade: Grade::Ungraded,
            time_spent_ms: 0,
            reviewed_at: 0,
        }
    }

    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.grade.is_graded()
    }
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Persisted aggregate of a study session.
///
/// `card_order_ids` and `results` are parallel: `results[i].card_id` is always
/// `card_order_ids[i]`. `is_completed` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    session_id: Uuid,
    deck_title: String,
    card_order_ids: Vec<CardId>,
    current_card_index: usize,
    session_start_time: i64,
    results: Vec<CardResult>,
    is_completed: bool,
    filter_settings: FilterSettings,
}

impl SessionState {
    /// Builds a fresh session with one ungraded result per card, in order.
    #[must_use]
    pub fn new(
        deck_title: impl Into<String>,
        card_order_ids: Vec<CardId>,
        session_start_time: i64,
        filter_settings: FilterSettings,
    ) -> Self {
        let results = card_order_ids
            .iter()
            .copied()
            .map(CardResult::ungraded)
            .collect();
        Self {
            session_id: Uuid::new_v4(),
            deck_title: deck_title.into(),
            card_order_ids,
            current_card_index: 0,
            session_start_time,
            results,
            is_completed: false,
            filter_settings,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn deck_title(&self) -> &str {
        &self.deck_title
    }

    #[must_use]
    pub fn card_order_ids(&self) -> &[CardId] {
        &self.card_order_ids
    }

    #[must_use]
    pub fn current_card_index(&self) -> usize {
        self.current_card_index
    }

    #[must_use]
    pub fn session_start_time(&self) -> i64 {
        self.session_start_time
    }

    #[must_use]
    pub fn results(&self) -> &[CardResult] {
        &self.results
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn filter_settings(&self) -> &FilterSettings {
        &self.filter_settings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.card_order_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.card_order_ids.is_empty()
    }

    #[must_use]
    pub fn current_result(&self) -> Option<&CardResult> {
        self.results.get(self.current_card_index)
    }

    /// Number of results with the given grade.
    #[must_use]
    pub fn count(&self, grade: Grade) -> usize {
        self.results.iter().filter(|r| r.grade == grade).count()
    }

    #[must_use]
    pub fn graded_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_graded()).count()
    }

    /// Latest `reviewed_at` across graded results.
    #[must_use]
    pub fn last_reviewed_at(&self) -> Option<i64> {
        self.results
            .iter()
            .filter(|r| r.is_graded())
            .map(|r| r.reviewed_at)
            .max()
    }

    /// Checks the parallel-array and index invariants.
    ///
    /// Deserialized state is not trusted until this holds.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let parallel = self.results.len() == self.card_order_ids.len()
            && self
                .results
                .iter()
                .zip(&self.card_order_ids)
                .all(|(r, id)| r.card_id == *id);
        let index_ok = self.is_empty() || self.current_card_index < self.len();
        parallel && index_ok
    }

    /// Moves to the next card. Returns false at the last card.
    pub fn step_forward(&mut self) -> bool {
        if self.current_card_index + 1 < self.len() {
            self.current_card_index += 1;
            true
        } else {
            false
        }
    }

    /// Moves to the previous card. Returns false at the first card.
    pub fn step_back(&mut self) -> bool {
        if self.current_card_index > 0 && !self.is_empty() {
            self.current_card_index -= 1;
            true
        } else {
            false
        }
    }

    /// Adds visit time to an ungraded result. Graded results stay frozen.
    ///
    /// Returns true if the time was recorded.
    pub fn bank_time(&mut self, index: usize, elapsed_ms: u64) -> bool {
        match self.results.get_mut(index) {
            Some(result) if !result.is_graded() => {
                result.time_spent_ms = result.time_spent_ms.saturating_add(elapsed_ms);
                true
            }
            _ => false,
        }
    }

    /// Records a terminal grade for the result at `index`.
    ///
    /// `elapsed_ms` is added to the time already banked for the card. On
    /// success the completion flag is refreshed; the return value tells
    /// whether this grade completed the session.
    ///
    /// # Errors
    ///
    /// Returns `GradeError` without touching the state if the grade is
    /// `Ungraded`, the index is out of range, or the card is already graded.
    pub fn record_grade(
        &mut self,
        index: usize,
        grade: Grade,
        elapsed_ms: u64,
        reviewed_at: i64,
    ) -> Result<bool, GradeError> {
        if !grade.is_graded() {
            return Err(GradeError::NotAGrade);
        }
        let result = self
            .results
            .get_mut(index)
            .ok_or(GradeError::OutOfRange(index))?;
        if result.is_graded() {
            return Err(GradeError::AlreadyGraded(result.card_id));
        }

        result.grade = grade;
        result.time_spent_ms = result.time_spent_ms.saturating_add(elapsed_ms);
        result.reviewed_at = reviewed_at;

        Ok(self.refresh_completion())
    }

    /// Drops every card for which `keep` returns false, from both the order
    /// and the results, and returns the dropped ids.
    ///
    /// The cursor stays on the same card if it survives. Otherwise it lands
    /// on the next surviving card, clamped to the new bounds.
    pub fn retain_cards(&mut self, mut keep: impl FnMut(CardId) -> bool) -> Vec<CardId> {
        let mut dropped = Vec::new();
        let mut new_index = None;
        let mut kept_ids = Vec::with_capacity(self.card_order_ids.len());
        let mut kept_results = Vec::with_capacity(self.results.len());

        for (i, (id, result)) in self
            .card_order_ids
            .drain(..)
            .zip(self.results.drain(..))
            .enumerate()
        {
            if keep(id) {
                if new_index.is_none() && i >= self.current_card_index {
                    new_index = Some(kept_ids.len());
                }
                kept_ids.push(id);
                kept_results.push(result);
            } else {
                dropped.push(id);
            }
        }

        self.card_order_ids = kept_ids;
        self.results = kept_results;
        self.current_card_index = new_index.unwrap_or_else(|| self.len().saturating_sub(1));
        self.refresh_completion();
        dropped
    }

    /// Sets `is_completed` once every result is graded. Never clears it.
    ///
    /// Returns true only on the transition.
    fn refresh_completion(&mut self) -> bool {
        if self.is_completed || self.results.is_empty() {
            return false;
        }
        if self.results.iter().all(CardResult::is_graded) {
            self.is_completed = true;
            return true;
        }
        false
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<CardId> {
        raw.iter().copied().map(CardId::new).collect()
    }

    fn state(raw: &[u64]) -> SessionState {
        SessionState::new("Deck", ids(raw), 1_000, FilterSettings::default())
    }

    #[test]
    fn new_state_has_parallel_ungraded_results() {
        let s = state(&[3, 1, 2]);
        assert!(s.is_consistent());
        assert_eq!(s.len(), 3);
        assert_eq!(s.current_card_index(), 0);
        assert!(!s.is_completed());
        assert!(s.results().iter().all(|r| r.grade == Grade::Ungraded
            && r.time_spent_ms == 0
            && r.reviewed_at == 0));
        assert_eq!(s.results()[0].card_id, CardId::new(3));
    }

    #[test]
    fn stepping_is_clamped() {
        let mut s = state(&[1, 2]);
        assert!(!s.step_back());
        assert!(s.step_forward());
        assert!(!s.step_forward());
        assert_eq!(s.current_card_index(), 1);
        assert!(s.step_back());
        assert_eq!(s.current_card_index(), 0);
    }

    #[test]
    fn empty_state_never_moves_or_completes() {
        let mut s = state(&[]);
        assert!(!s.step_forward());
        assert!(!s.step_back());
        assert_eq!(s.current_card_index(), 0);
        assert!(s.current_result().is_none());
        assert!(!s.is_completed());
    }

    #[test]
    fn grade_is_recorded_once() {
        let mut s = state(&[1, 2]);
        s.bank_time(0, 400);
        assert_eq!(s.record_grade(0, Grade::Known, 600, 5_000), Ok(false));
        let before = s.clone();

        assert_eq!(
            s.record_grade(0, Grade::NotYet, 10, 9_000),
            Err(GradeError::AlreadyGraded(CardId::new(1)))
        );
        assert_eq!(s, before);
        assert_eq!(s.results()[0].time_spent_ms, 1_000);
        assert!(!s.bank_time(0, 50));
        assert_eq!(s, before);
    }

    #[test]
    fn ungraded_and_out_of_range_are_rejected() {
        let mut s = state(&[1]);
        assert_eq!(
            s.record_grade(0, Grade::Ungraded, 1, 1),
            Err(GradeError::NotAGrade)
        );
        assert_eq!(
            s.record_grade(4, Grade::Known, 1, 1),
            Err(GradeError::OutOfRange(4))
        );
        assert_eq!(s.graded_count(), 0);
    }

    #[test]
    fn completion_flips_on_last_grade() {
        let mut s = state(&[1, 2]);
        assert_eq!(s.record_grade(1, Grade::NotYet, 0, 2_000), Ok(false));
        assert!(!s.is_completed());
        assert_eq!(s.record_grade(0, Grade::Known, 0, 3_000), Ok(true));
        assert!(s.is_completed());
        assert_eq!(s.last_reviewed_at(), Some(3_000));
        assert_eq!(s.count(Grade::Known), 1);
        assert_eq!(s.count(Grade::NotYet), 1);
    }

    #[test]
    fn retain_cards_keeps_arrays_parallel_and_cursor_on_card() {
        let mut s = state(&[1, 2, 3, 4]);
        s.step_forward();
        s.step_forward();
        assert_eq!(s.current_card_index(), 2);

        let dropped = s.retain_cards(|id| id != CardId::new(2));
        assert_eq!(dropped, ids(&[2]));
        assert!(s.is_consistent());
        assert_eq!(s.card_order_ids(), ids(&[1, 3, 4]).as_slice());
        assert_eq!(s.card_order_ids()[s.current_card_index()], CardId::new(3));
    }

    #[test]
    fn retain_cards_moves_cursor_off_dropped_card() {
        let mut s = state(&[1, 2, 3]);
        s.step_forward();
        s.step_forward();
        let dropped = s.retain_cards(|id| id == CardId::new(1));
        assert_eq!(dropped, ids(&[2, 3]));
        assert_eq!(s.current_card_index(), 0);
        assert!(s.is_consistent());
    }

    #[test]
    fn retain_cards_completes_when_only_graded_remain() {
        let mut s = state(&[1, 2]);
        s.record_grade(0, Grade::Known, 0, 10).unwrap();
        s.retain_cards(|id| id == CardId::new(1));
        assert!(s.is_completed());
    }

    #[test]
    fn inconsistent_state_is_detected() {
        let mut json = serde_json::to_value(state(&[1, 2])).unwrap();
        json["cardOrderIds"] = serde_json::json!([2, 1]);
        let broken: SessionState = serde_json::from_value(json).unwrap();
        assert!(!broken.is_consistent());
    }
}
