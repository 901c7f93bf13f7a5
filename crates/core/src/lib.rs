#![forbid(unsafe_code)]

pub mod model;
pub mod time;

pub use time::{Clock, format_elapsed};
