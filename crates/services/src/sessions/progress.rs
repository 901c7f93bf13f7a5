/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub graded: usize,
    pub remaining: usize,
    /// Zero-based cursor into the working set.
    pub position: usize,
    pub is_complete: bool,
}
