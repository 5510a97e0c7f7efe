//! Wildcard event-name patterns.
//!
//! `*` matches any sequence of characters (including none) and `?` matches
//! exactly one character. Everything else is literal, regex metacharacters
//! included, so `cart.item(1)` only matches itself.

use regex::Regex;

use crate::error::BusError;

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    /// Compile a wildcard pattern into an anchored regular expression.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidPattern` if the translated expression is rejected,
    /// e.g. because it exceeds the regex size limit.
    pub fn compile(pattern: &str) -> Result<Self, BusError> {
        let regex = Regex::new(&translate(pattern)).map_err(|e| BusError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether `event` matches this pattern.
    #[must_use]
    pub fn matches(&self, event: &str) -> bool {
        self.regex.is_match(event)
    }

    /// The pattern as written by the subscriber.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn translate(pattern: &str) -> String {
    let mut expr = String::with_capacity(pattern.len() + 8);
    let mut literal = String::new();
    expr.push_str("(?s)^");

    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }

    expr.push_str(&regex::escape(&literal));
    expr.push('$');
    expr
}
