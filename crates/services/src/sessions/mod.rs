mod engine;
mod plan;
mod progress;
mod summary;
mod ticker;
pub mod timing;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{GradeOutcome, SessionEngine, SessionOrigin};
pub use plan::{WorkingSetBuilder, WorkingSetPlan};
pub use progress::SessionProgress;
pub use summary::summarize;
pub use ticker::{DEFAULT_TICK_PERIOD, SessionTicker, TimerTick};
