//! Shared domain types, configuration and errors for Tempo.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::TempoConfig;
pub use error::{Result, TempoError};
pub use time::{Clock, FixedClock, SystemClock, TimeContext};
pub use types::*;
