//! Common types used throughout passvault.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use zeroize::Zeroize;

/// Separator between group path segments.
pub const GROUP_SEPARATOR: char = '.';

/// A dot-delimited group path inside a vault.
///
/// Paths are always held in normalized form: every segment is trimmed and
/// non-empty. The root group is the path with no segments. Equality and
/// hashing ignore case per segment, while the original spelling is kept
/// for display.
///
/// A literal `.` inside a segment cannot be expressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct GroupPath {
    segments: Vec<String>,
}

fn fold(segment: &str) -> String {
    segment.to_lowercase()
}

impl GroupPath {
    /// Create the root path.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a group string, normalizing it on the way in.
    ///
    /// Never fails: empty or whitespace-only segments are dropped, so
    /// `" Work . . Mail "` parses to `Work.Mail`.
    pub fn parse(path: &str) -> Self {
        let segments = path
            .trim()
            .split(GROUP_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Self { segments }
    }

    /// Normalize a group string: trim, drop empty segments, rejoin.
    ///
    /// Idempotent: `normalize(normalize(p)) == normalize(p)`.
    pub fn normalize(path: &str) -> String {
        Self::parse(path).to_string()
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Get the last segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut segments = self.segments.clone();
            segments.pop();
            Some(Self { segments })
        }
    }

    /// Join this path with a child path (which may itself be dotted).
    pub fn join(&self, child: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(Self::parse(child).segments);
        Self { segments }
    }

    /// Every proper ancestor of this path, outermost first, excluding root.
    pub fn ancestors(&self) -> Vec<Self> {
        (1..self.segments.len())
            .map(|n| Self {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// True if `self` equals `other` or lives below it.
    ///
    /// Every path is same-or-child of the root.
    pub fn is_same_or_child(&self, other: &GroupPath) -> bool {
        self.segments.len() >= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| fold(a) == fold(b))
    }

    /// True if `self` lives strictly below `other`.
    pub fn is_strict_child_of(&self, other: &GroupPath) -> bool {
        self.segments.len() > other.segments.len() && self.is_same_or_child(other)
    }

    /// Move this path from under `old` to under `new`.
    ///
    /// Returns `None` when `self` is not `old` or one of its descendants.
    pub fn rebase(&self, old: &GroupPath, new: &GroupPath) -> Option<Self> {
        if !self.is_same_or_child(old) {
            return None;
        }
        let mut segments = new.segments.clone();
        segments.extend_from_slice(&self.segments[old.segments.len()..]);
        Some(Self { segments })
    }

    /// Convert to the dotted wire representation.
    pub fn as_string(&self) -> String {
        self.segments.join(".")
    }
}

impl Default for GroupPath {
    fn default() -> Self {
        Self::root()
    }
}

impl PartialEq for GroupPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len() && self.is_same_or_child(other)
    }
}

impl Eq for GroupPath {}

impl Hash for GroupPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for segment in &self.segments {
            fold(segment).hash(state);
        }
        self.segments.len().hash(state);
    }
}

impl From<String> for GroupPath {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for GroupPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<GroupPath> for String {
    fn from(value: GroupPath) -> Self {
        value.as_string()
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for SensitiveBytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<&str> for SensitiveBytes {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}
