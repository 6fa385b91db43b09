//! Option keys: dotted, case-sensitive paths such as `home.keyboard.layout`.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A dotted option path identifying a merge point.
///
/// Ordering is segment-wise, so every key sorts directly before the keys it prefixes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptionKey {
    segments: Vec<String>,
}

impl OptionKey {
    /// Build a key from already-split segments. Panics on an empty segment list in debug builds.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        debug_assert!(!segments.is_empty(), "option keys have at least one segment");
        Self { segments }
    }

    /// Parse a dotted key; segments may be quoted (`fileSystems."/".options`).
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();
        let mut quoted_segment = false;

        while let Some(c) = chars.next() {
            match c {
                '"' if current.is_empty() && !quoted_segment => {
                    let mut closed = false;
                    while let Some(q) = chars.next() {
                        match q {
                            '\\' => {
                                if let Some(escaped) = chars.next() {
                                    current.push(escaped);
                                }
                            }
                            '"' => {
                                closed = true;
                                break;
                            }
                            other => current.push(other),
                        }
                    }
                    if !closed {
                        return Err(format!("unterminated quote in key '{}'", text));
                    }
                    quoted_segment = true;
                    if !matches!(chars.peek(), None | Some('.')) {
                        return Err(format!("expected '.' after quoted segment in '{}'", text));
                    }
                }
                '.' => {
                    if current.is_empty() && !quoted_segment {
                        return Err(format!("empty segment in key '{}'", text));
                    }
                    segments.push(std::mem::take(&mut current));
                    quoted_segment = false;
                }
                other => current.push(other),
            }
        }

        if current.is_empty() && !quoted_segment {
            return Err(format!("empty segment in key '{}'", text));
        }
        segments.push(current);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Key extended by one segment
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Key without its last segment, or `None` for single-segment keys
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// Strict prefixes, shortest first (`a`, `a.b` for `a.b.c`)
    pub fn strict_prefixes(&self) -> impl Iterator<Item = OptionKey> + '_ {
        (1..self.segments.len()).map(move |n| OptionKey {
            segments: self.segments[..n].to_vec(),
        })
    }

    /// True when `self` is a strict prefix of `other`
    pub fn is_strict_prefix_of(&self, other: &OptionKey) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Key with the leading segments of `prefix` removed
    pub fn strip_prefix(&self, prefix: &OptionKey) -> Option<OptionKey> {
        if prefix.is_strict_prefix_of(self) {
            Some(OptionKey {
                segments: self.segments[prefix.segments.len()..].to_vec(),
            })
        } else {
            None
        }
    }
}

/// Whether a segment can be written without quotes
pub fn is_bare_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '\'')
}

/// Render one segment, quoting it when needed
pub fn render_segment(segment: &str) -> String {
    if is_bare_segment(segment) {
        segment.to_string()
    } else {
        format!("\"{}\"", segment.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", render_segment(segment))?;
        }
        Ok(())
    }
}

impl FromStr for OptionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptionKey::parse(s)
    }
}

impl Serialize for OptionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
