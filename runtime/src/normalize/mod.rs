//! Numeric-text and record-shape normalization.

pub mod number;
pub mod record;

pub use number::{parse_number, parse_value};
pub use record::{normalize_records, normalize_records_at};
