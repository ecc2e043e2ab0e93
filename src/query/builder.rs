//! Script composition from a base rule head and sanitized filter conditions.

use super::sanitize::{quote_literal, quote_pattern};

/// Paths of test sources: `_test.<ext>` and `.test.<ext>`/`.spec.<ext>` files,
/// `test`/`tests` directories, `*_test/` directories and `test_*` files.
pub const TEST_FILE_EXCLUSION: &str =
    r"(_test[.][A-Za-z0-9]+$|[.](test|spec)[.][A-Za-z0-9]+$|(^|/)tests?/|_test/|(^|/)test_)";

/// A single filter clause. Columns are fixed identifiers chosen by this crate;
/// only the values come from callers, and those are always quoted on render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `regex_matches(column, pattern)`
    Matches {
        column: &'static str,
        pattern: String,
    },
    /// `!regex_matches(column, pattern)`
    NotMatches {
        column: &'static str,
        pattern: String,
    },
    /// `column == "value"`
    Equals { column: &'static str, value: String },
}

impl Condition {
    pub fn matches(column: &'static str, pattern: impl Into<String>) -> Self {
        Condition::Matches {
            column,
            pattern: pattern.into(),
        }
    }

    pub fn not_matches(column: &'static str, pattern: impl Into<String>) -> Self {
        Condition::NotMatches {
            column,
            pattern: pattern.into(),
        }
    }

    pub fn equals(column: &'static str, value: impl Into<String>) -> Self {
        Condition::Equals {
            column,
            value: value.into(),
        }
    }

    /// The condition that drops test sources from `column`.
    pub fn exclude_test_files(column: &'static str) -> Self {
        Condition::not_matches(column, TEST_FILE_EXCLUSION)
    }

    /// Renders the clause as script text.
    pub fn render(&self) -> String {
        match self {
            Condition::Matches { column, pattern } => {
                format!("regex_matches({}, {})", column, quote_pattern(pattern))
            }
            Condition::NotMatches { column, pattern } => {
                format!("!regex_matches({}, {})", column, quote_pattern(pattern))
            }
            Condition::Equals { column, value } => {
                format!("{} == {}", column, quote_literal(value))
            }
        }
    }
}

/// Builds a query script: rule head, AND-joined conditions, then `:order` and `:limit`.
///
/// Conditions render in insertion order, so identical arguments always produce
/// an identical script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBuilder {
    head: String,
    conditions: Vec<Condition>,
    order: Option<&'static str>,
    limit: Option<usize>,
}

impl ScriptBuilder {
    /// Starts a script from its projection and relation bindings,
    /// e.g. `?[path] := *cie_file { path }`.
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            head: head.into(),
            conditions: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds the condition only when one is given.
    pub fn filter_opt(self, condition: Option<Condition>) -> Self {
        match condition {
            Some(c) => self.filter(c),
            None => self,
        }
    }

    pub fn order_by(mut self, column: &'static str) -> Self {
        self.order = Some(column);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(&self) -> String {
        let mut script = self.head.clone();
        for condition in &self.conditions {
            script.push_str(", ");
            script.push_str(&condition.render());
        }
        if let Some(order) = self.order {
            script.push_str(" :order ");
            script.push_str(order);
        }
        if let Some(limit) = self.limit {
            script.push_str(&format!(" :limit {limit}"));
        }
        script
    }
}
