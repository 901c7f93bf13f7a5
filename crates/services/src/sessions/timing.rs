//! Elapsed-time bookkeeping for a session, as pure functions of the state,
//! the moment the current card was last shown and "now" (all Unix ms).

use flash_core::model::{CardResult, SessionState};

/// Milliseconds from `start_ms` to `now_ms`, clamped at zero.
#[must_use]
pub fn elapsed_ms(start_ms: i64, now_ms: i64) -> u64 {
    u64::try_from(now_ms.saturating_sub(start_ms)).unwrap_or(0)
}

/// Time attributed to a card: frozen once graded, otherwise banked time plus
/// the live visit.
#[must_use]
pub fn time_on_card_ms(result: &CardResult, card_started_at: i64, now_ms: i64) -> u64 {
    if result.is_graded() {
        result.time_spent_ms
    } else {
        result
            .time_spent_ms
            .saturating_add(elapsed_ms(card_started_at, now_ms))
    }
}

/// Span from session start to the last grading action.
#[must_use]
pub fn completed_session_time_ms(state: &SessionState) -> u64 {
    state
        .last_reviewed_at()
        .map_or(0, |last| elapsed_ms(state.session_start_time(), last))
}

/// Cards before the cursor contribute their recorded time, the current card
/// its live time, later cards nothing.
#[must_use]
pub fn live_session_time_ms(state: &SessionState, card_started_at: i64, now_ms: i64) -> u64 {
    let index = state.current_card_index();
    let before: u64 = state
        .results()
        .iter()
        .take(index)
        .map(|r| r.time_spent_ms)
        .sum();
    let current = state
        .current_result()
        .map_or(0, |r| time_on_card_ms(r, card_started_at, now_ms));
    before.saturating_add(current)
}

/// Session time using the completed formula once completed, the live one
/// otherwise.
#[must_use]
pub fn session_time_ms(state: &SessionState, card_started_at: i64, now_ms: i64) -> u64 {
    if state.is_completed() {
        completed_session_time_ms(state)
    } else {
        live_session_time_ms(state, card_started_at, now_ms)
    }
}
