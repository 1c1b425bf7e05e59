//! Utility functions for formatting and unit conversion.

pub mod formatting;
pub mod helpers;
pub mod units;

pub use formatting::truncate_id;
pub use helpers::current_timestamp;
pub use units::{format_units, parse_decimal, parse_units, UnitsError};
