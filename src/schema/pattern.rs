//! Key patterns: option keys where `*` stands for exactly one segment.

use crate::key::OptionKey;
use std::cmp::Reverse;
use std::fmt;

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    text: String,
    segments: Vec<PatternSegment>,
}

impl KeyPattern {
    pub fn parse(text: &str) -> Result<Self, String> {
        let key = OptionKey::parse(text)?;
        let segments = key
            .segments()
            .iter()
            .map(|s| {
                if s == WILDCARD {
                    PatternSegment::Wildcard
                } else {
                    PatternSegment::Literal(s.clone())
                }
            })
            .collect();
        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn wildcard_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PatternSegment::Wildcard))
            .count()
    }

    /// The literal key this pattern names, when it has no wildcard
    pub fn as_key(&self) -> Option<OptionKey> {
        self.segments
            .iter()
            .map(|s| match s {
                PatternSegment::Literal(l) => Some(l.clone()),
                PatternSegment::Wildcard => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(OptionKey::from_segments)
    }

    pub fn matches(&self, key: &OptionKey) -> bool {
        self.segments.len() == key.len() && self.matches_leading(key)
    }

    /// True when the pattern matches a strict prefix of `key`
    pub fn matches_strict_prefix_of(&self, key: &OptionKey) -> bool {
        self.segments.len() < key.len() && self.matches_leading(key)
    }

    fn matches_leading(&self, key: &OptionKey) -> bool {
        self.segments
            .iter()
            .zip(key.segments())
            .all(|(pattern, segment)| match pattern {
                PatternSegment::Literal(l) => l == segment,
                PatternSegment::Wildcard => true,
            })
    }

    /// Sort key: smaller is more specific.
    ///
    /// Fewest wildcards first, then the pattern whose first wildcard comes latest,
    /// then pattern text.
    pub(crate) fn specificity(&self) -> (usize, Reverse<usize>, &str) {
        let first_wildcard = self
            .segments
            .iter()
            .position(|s| matches!(s, PatternSegment::Wildcard))
            .unwrap_or(self.segments.len());
        (self.wildcard_count(), Reverse(first_wildcard), &self.text)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> OptionKey {
        OptionKey::parse(s).unwrap()
    }

    #[test]
    fn test_wildcard_matches_one_segment() {
        let pattern = KeyPattern::parse("programs.*.enable").unwrap();
        assert!(pattern.matches(&key("programs.git.enable")));
        assert!(!pattern.matches(&key("programs.git.extra.enable")));
        assert!(!pattern.matches(&key("programs.enable")));
        assert_eq!(pattern.wildcard_count(), 1);
        assert!(pattern.as_key().is_none());
    }

    #[test]
    fn test_strict_prefix_match() {
        let pattern = KeyPattern::parse("home.sessionVariables").unwrap();
        assert!(pattern.matches_strict_prefix_of(&key("home.sessionVariables.EDITOR")));
        assert!(!pattern.matches_strict_prefix_of(&key("home.sessionVariables")));
    }

    #[test]
    fn test_specificity_prefers_literals() {
        let literal = KeyPattern::parse("programs.git.enable").unwrap();
        let late = KeyPattern::parse("programs.*.enable").unwrap();
        let early = KeyPattern::parse("*.git.enable").unwrap();
        assert!(literal.specificity() < late.specificity());
        assert!(late.specificity() < early.specificity());
    }
}
