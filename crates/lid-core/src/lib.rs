//! # lid-core
//! Foundation types and traits for the LID presale engine.

pub mod constants;
pub mod error;
pub mod math;
pub mod memory;
pub mod traits;
pub mod types;
pub mod units;
