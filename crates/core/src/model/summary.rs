use crate::model::Card;
use crate::time::format_elapsed;

/// Derived statistics for a session, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    known: usize,
    not_yet: usize,
    total_cards: usize,
    total_time_ms: u64,
    avg_time_ms: u64,
    hard_cards: Vec<Card>,
}

impl SessionSummary {
    #[must_use]
    pub fn new(
        known: usize,
        not_yet: usize,
        total_cards: usize,
        total_time_ms: u64,
        avg_time_ms: u64,
        hard_cards: Vec<Card>,
    ) -> Self {
        Self {
            known,
            not_yet,
            total_cards,
            total_time_ms,
            avg_time_ms,
            hard_cards,
        }
    }

    #[must_use]
    pub fn known(&self) -> usize {
        self.known
    }

    #[must_use]
    pub fn not_yet(&self) -> usize {
        self.not_yet
    }

    #[must_use]
    pub fn graded(&self) -> usize {
        self.known + self.not_yet
    }

    /// Size of the session's working set.
    #[must_use]
    pub fn total_cards(&self) -> usize {
        self.total_cards
    }

    #[must_use]
    pub fn total_time_ms(&self) -> u64 {
        self.total_time_ms
    }

    /// Mean time over graded cards only.
    #[must_use]
    pub fn avg_time_ms(&self) -> u64 {
        self.avg_time_ms
    }

    /// `total_time_ms` as `MM:SS`.
    #[must_use]
    pub fn total_time(&self) -> String {
        format_elapsed(i64::try_from(self.total_time_ms).unwrap_or(i64::MAX))
    }

    /// `avg_time_ms` as `MM:SS`.
    #[must_use]
    pub fn avg_time(&self) -> String {
        format_elapsed(i64::try_from(self.avg_time_ms).unwrap_or(i64::MAX))
    }

    /// Cards graded `NotYet`, in deck order.
    #[must_use]
    pub fn hard_cards(&self) -> &[Card] {
        &self.hard_cards
    }
}
