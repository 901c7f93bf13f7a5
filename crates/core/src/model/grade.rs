use serde::{Deserialize, Serialize};

//
// ─── GRADE ────────────────────────────────────────────────────────────────────
//

/// Self-assessment recorded for a card within one session.
///
/// `Ungraded` is the initial state. `Known` and `NotYet` are terminal for the
/// lifetime of the session that recorded them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Grade {
    Known,
    NotYet,
    #[default]
    Ungraded,
}

impl Grade {
    /// Returns true for `Known` and `NotYet`.
    #[must_use]
    pub fn is_graded(self) -> bool {
        !matches!(self, Grade::Ungraded)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_and_not_yet_count_as_graded() {
        assert!(Grade::Known.is_graded());
        assert!(Grade::NotYet.is_graded());
        assert!(!Grade::Ungraded.is_graded());
        assert_eq!(Grade::default(), Grade::Ungraded);
    }

    #[test]
    fn grade_serializes_by_name() {
        assert_eq!(serde_json::to_string(&Grade::NotYet).unwrap(), "\"NotYet\"");
        let back: Grade = serde_json::from_str("\"Known\"").unwrap();
        assert_eq!(back, Grade::Known);
    }
}
