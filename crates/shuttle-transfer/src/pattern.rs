//! Selection patterns applied to enumerated file names.

use regex::{Regex, RegexBuilder};

use crate::error::{TransferError, TransferResult};
use crate::model::PatternMode;

/// Compiled selection pattern.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    regex: Option<Regex>,
}

impl NameMatcher {
    /// Matcher that accepts every entry.
    #[must_use]
    pub const fn all() -> Self {
        Self { regex: None }
    }

    /// Compile `pattern` in the given mode; an empty (or blank) pattern matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Pattern`] when the resulting expression is invalid.
    pub fn compile(pattern: &str, mode: PatternMode) -> TransferResult<Self> {
        if pattern.trim().is_empty() {
            return Ok(Self::all());
        }
        let compiled = match mode {
            PatternMode::Wildcard => RegexBuilder::new(&wildcard_to_regex(pattern))
                .case_insensitive(true)
                .build(),
            PatternMode::Regex => Regex::new(pattern),
        };
        compiled
            .map(|regex| Self { regex: Some(regex) })
            .map_err(|source| TransferError::Pattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Whether the matcher accepts everything.
    #[must_use]
    pub const fn matches_all(&self) -> bool {
        self.regex.is_none()
    }

    /// A file is selected when its name or its root-relative path matches.
    #[must_use]
    pub fn matches(&self, name: &str, relative_path: &str) -> bool {
        self.regex
            .as_ref()
            .is_none_or(|regex| regex.is_match(name) || regex.is_match(relative_path))
    }
}

/// Translate a wildcard into an anchored expression: `*` → `.*`, `?` → `.`,
/// everything else literal.
#[must_use]
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                translated.push_str(&regex::escape(&literal));
                literal.clear();
                translated.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    translated.push_str(&regex::escape(&literal));
    translated.push('$');
    translated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_translation_escapes_literals() {
        assert_eq!(wildcard_to_regex("*.txt"), r"^.*\.txt$");
        assert_eq!(wildcard_to_regex("file?.log"), r"^file.\.log$");
        assert_eq!(wildcard_to_regex("a+b"), r"^a\+b$");
    }

    #[test]
    fn name_or_relative_path_selects() -> TransferResult<()> {
        let matcher = NameMatcher::compile("*.txt", PatternMode::Wildcard)?;
        assert!(matcher.matches("a.txt", "a.txt"));
        assert!(matcher.matches("C.TXT", "sub/C.TXT"));
        assert!(!matcher.matches("b.log", "b.log"));

        let nested = NameMatcher::compile("sub/*", PatternMode::Wildcard)?;
        assert!(nested.matches("c.txt", "sub/c.txt"));
        assert!(!nested.matches("a.txt", "a.txt"));
        Ok(())
    }

    #[test]
    fn regex_mode_is_verbatim() -> TransferResult<()> {
        let matcher = NameMatcher::compile(r"^report-\d+\.csv$", PatternMode::Regex)?;
        assert!(matcher.matches("report-42.csv", "2024/report-42.csv"));
        assert!(!matcher.matches("report-x.csv", "report-x.csv"));
        Ok(())
    }

    #[test]
    fn empty_pattern_matches_everything() -> TransferResult<()> {
        let matcher = NameMatcher::compile("", PatternMode::Regex)?;
        assert!(matcher.matches_all());
        assert!(matcher.matches("anything", "deep/anything"));
        Ok(())
    }

    #[test]
    fn invalid_regex_reports_the_pattern() {
        let err = NameMatcher::compile("(unclosed", PatternMode::Regex).err();
        assert!(matches!(
            err,
            Some(TransferError::Pattern { ref pattern, .. }) if pattern == "(unclosed"
        ));
    }
}
