//! Name validation.
//!
//! Legacy databases collect placeholder and corrupted names ("Unknown 2",
//! "(Visitor)", "John and Jane"). Records carrying one are skipped before
//! any remote lookup.

use crate::models::PersonRecord;
use std::fmt;

/// Punctuation that may appear in a well-formed name.
///
/// Wider than the legacy rule, which only allowed `.`, `(` and `)`: hyphens
/// and apostrophes are accepted so names such as "Anne-Marie" and "O'Brien"
/// pass.
const ALLOWED_PUNCTUATION: [char; 5] = ['.', '(', ')', '-', '\''];

/// Maximum whitespace-separated tokens in one name.
const MAX_NAME_WORDS: usize = 3;

/// The first rule a name token violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRule {
    /// One character or fewer once periods are removed.
    TooShort,
    /// Two or more periods.
    RepeatedPeriods,
    /// Starts with `(` or ends with `)`.
    Parenthesized,
    /// Contains a digit.
    Digits,
    /// Contains punctuation outside the allowed set.
    Punctuation(char),
    /// More than three words.
    TooManyWords,
    /// Joins two people (`"John and Jane"`).
    Conjunction,
}

impl fmt::Display for NameRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "too_short"),
            Self::RepeatedPeriods => write!(f, "repeated_periods"),
            Self::Parenthesized => write!(f, "parenthesized"),
            Self::Digits => write!(f, "digits"),
            Self::Punctuation(c) => write!(f, "punctuation '{c}'"),
            Self::TooManyWords => write!(f, "too_many_words"),
            Self::Conjunction => write!(f, "conjunction"),
        }
    }
}

/// Classifies name tokens as well-formed or bad.
///
/// # Example
///
/// ```rust
/// use peoplesync::services::NameValidator;
///
/// let validator = NameValidator::new();
/// assert!(validator.is_bad_name("A"));
/// assert!(!validator.is_bad_name("Jo"));
/// assert!(validator.is_bad_name("John and Jane"));
/// assert!(!validator.is_bad_name("Anne-Marie"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NameValidator;

impl NameValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the first rule `word` violates, if any.
    #[must_use]
    pub fn violation(&self, word: &str) -> Option<NameRule> {
        if word.chars().filter(|&c| c != '.').count() <= 1 {
            return Some(NameRule::TooShort);
        }
        if word.matches('.').count() >= 2 {
            return Some(NameRule::RepeatedPeriods);
        }
        if word.starts_with('(') || word.ends_with(')') {
            return Some(NameRule::Parenthesized);
        }
        if word.chars().any(|c| c.is_ascii_digit()) {
            return Some(NameRule::Digits);
        }
        if let Some(c) = word
            .chars()
            .find(|c| c.is_ascii_punctuation() && !ALLOWED_PUNCTUATION.contains(c))
        {
            return Some(NameRule::Punctuation(c));
        }
        if word.split_whitespace().count() > MAX_NAME_WORDS {
            return Some(NameRule::TooManyWords);
        }
        if word.to_lowercase().contains(" and ") {
            return Some(NameRule::Conjunction);
        }
        None
    }

    /// Returns true if `word` is not a usable name.
    #[must_use]
    pub fn is_bad_name(&self, word: &str) -> bool {
        self.violation(word).is_some()
    }

    /// Returns the first bad name on `record`, checking first name then last.
    #[must_use]
    pub fn record_violation(&self, record: &PersonRecord) -> Option<(&'static str, NameRule)> {
        self.violation(&record.first_name)
            .map(|rule| ("first_name", rule))
            .or_else(|| {
                self.violation(&record.last_name)
                    .map(|rule| ("last_name", rule))
            })
    }

    /// Returns true if either the first or last name is bad.
    #[must_use]
    pub fn has_bad_name(&self, record: &PersonRecord) -> bool {
        self.record_violation(record).is_some()
    }
}

/// Shorthand for [`NameValidator::is_bad_name`].
#[must_use]
pub fn is_bad_name(word: &str) -> bool {
    NameValidator::new().is_bad_name(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("A", Some(NameRule::TooShort) ; "single letter")]
    #[test_case("", Some(NameRule::TooShort) ; "empty")]
    #[test_case("J.", Some(NameRule::TooShort) ; "initial with period")]
    #[test_case("J.R.", Some(NameRule::RepeatedPeriods) ; "two periods")]
    #[test_case("(Visitor", Some(NameRule::Parenthesized) ; "leading paren")]
    #[test_case("Smith (old)", Some(NameRule::Parenthesized) ; "trailing paren")]
    #[test_case("Unknown2", Some(NameRule::Digits) ; "digit")]
    #[test_case("O'Brien!", Some(NameRule::Punctuation('!')) ; "bang")]
    #[test_case("Smith/Jones", Some(NameRule::Punctuation('/')) ; "slash")]
    #[test_case("A B C D", Some(NameRule::TooManyWords) ; "four words")]
    #[test_case("John and Jane", Some(NameRule::Conjunction) ; "joint name")]
    #[test_case("John And Jane", Some(NameRule::Conjunction) ; "capitalized joint name")]
    #[test_case("Jo", None ; "short but valid")]
    #[test_case("Anne-Marie", None ; "hyphenated")]
    #[test_case("O'Brien", None ; "apostrophe")]
    #[test_case("Mary Ann Lee", None ; "three words")]
    #[test_case("Andrew", None ; "contains and")]
    #[test_case("José", None ; "non ascii letter")]
    fn test_violation(word: &str, expected: Option<NameRule>) {
        assert_eq!(NameValidator::new().violation(word), expected);
    }

    #[test]
    fn test_is_bad_name_shorthand() {
        assert!(is_bad_name("A"));
        assert!(!is_bad_name("Jo"));
    }
}
