//! Injection-safe construction of query scripts.

pub mod builder;
pub mod sanitize;

pub use builder::{Condition, ScriptBuilder, TEST_FILE_EXCLUSION};
pub use sanitize::{escape_regex, quote_literal, quote_pattern};
