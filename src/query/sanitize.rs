//! Literal and regex embedding for query scripts.
//!
//! Every caller-supplied string that ends up inside a script goes through one
//! of these functions. All of them are total: any input, including empty or
//! already-quoted strings, produces a token the script parser reads back as
//! exactly the original text.

use serde_json::Value;

/// Minimum number of underscores fencing a raw string.
const MIN_RAW_FENCE: usize = 3;

/// Quotes `value` as a double-quoted string literal.
///
/// Quotes, backslashes and control characters are backslash-escaped using the
/// JSON escape set, which the script grammar shares. The result can never
/// contain an unescaped `"` before its closing quote.
pub fn quote_literal(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Quotes `pattern` as an underscore-fenced raw string (`___"..."___`).
///
/// Raw strings do no escape processing, so regex backslashes pass through
/// untouched. A raw string ends at the first `"` followed by the opening
/// fence, so the fence is made one underscore longer than the longest
/// underscore run that follows any quote in the pattern.
pub fn quote_pattern(pattern: &str) -> String {
    let fence = "_".repeat(raw_fence_len(pattern));
    format!("{fence}\"{pattern}\"{fence}")
}

fn raw_fence_len(pattern: &str) -> usize {
    let bytes = pattern.as_bytes();
    let mut longest = 0;
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'"' {
            let run = bytes[i + 1..].iter().take_while(|c| **c == b'_').count();
            longest = longest.max(run);
        }
    }
    (longest + 1).max(MIN_RAW_FENCE)
}

/// Escapes every regex metacharacter so `fragment` matches itself literally.
pub fn escape_regex(fragment: &str) -> String {
    regex::escape(fragment)
}
