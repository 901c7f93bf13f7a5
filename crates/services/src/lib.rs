#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use flash_core::Clock;

pub use error::SessionError;

pub use sessions::{
    GradeOutcome, SessionEngine, SessionOrigin, SessionProgress, SessionTicker, TimerTick,
    WorkingSetBuilder, WorkingSetPlan,
};
