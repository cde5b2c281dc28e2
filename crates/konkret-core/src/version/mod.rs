//! Version algebra: single versions, closed or open ranges and normalized
//! version lists.
//!
//! A version is a sequence of segments, each a run of digits or a run of
//! letters. Separators (`.`, `_`, `-`) are kept for display but take no part
//! in comparison:
//! - `1.2.3 == 1_2_3`
//! - `1.2` is a prefix of `1.2.3`, so `1.2.3` satisfies `1.2`
//! - numeric versions sort above non-numeric ones, and `develop` above all
//!
//! Ranges ([`VersionRange`]) and lists ([`VersionList`]) build on prefix
//! containment, so `1.2:1.4` contains `1.4.7`.

mod expr;
mod list;
mod range;

pub use expr::VersionExpr;
pub use list::{VersionItem, VersionList};
pub use range::{Bound, VersionRange};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use konkret_util::errors::{KonkretError, KonkretResult};

/// One comparable piece of a version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Int(u64),
    Alpha(String),
}

impl Segment {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Segment::Int(n) => Some(*n),
            Segment::Alpha(_) => None,
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Int(a), Segment::Int(b)) => a.cmp(b),
            (Segment::Alpha(a), Segment::Alpha(b)) => a.cmp(b),
            (Segment::Int(_), Segment::Alpha(_)) => Ordering::Greater,
            (Segment::Alpha(_), Segment::Int(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Int(n) => write!(f, "{n}"),
            Segment::Alpha(s) => f.write_str(s),
        }
    }
}

/// A single parsed version such as `1.2.3`, `2.0b1` or `develop`.
///
/// Equality and hashing look at the segments only, so `1.2` and `1_2` are
/// the same version even though they print differently.
#[derive(Debug, Clone)]
pub struct Version {
    string: String,
    segments: Vec<Segment>,
    separators: Vec<String>,
}

impl Version {
    /// Parse a version string. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> KonkretResult<Self> {
        let string = input.trim();
        let malformed = |reason: &str| KonkretError::MalformedVersion {
            version: input.to_string(),
            reason: reason.to_string(),
        };

        if string.is_empty() {
            return Err(malformed("empty version"));
        }
        if let Some(c) = string
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(malformed(&format!("invalid character '{c}'")));
        }

        let mut segments = Vec::new();
        let mut separators = Vec::new();
        let mut pending_sep = String::new();
        let mut chars = string.chars().peekable();

        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c.is_ascii_alphabetic() {
                let digits = c.is_ascii_digit();
                let mut run = String::new();
                while let Some(&n) = chars.peek() {
                    if (digits && n.is_ascii_digit()) || (!digits && n.is_ascii_alphabetic()) {
                        run.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !segments.is_empty() {
                    separators.push(std::mem::take(&mut pending_sep));
                }
                pending_sep.clear();
                let segment = if digits {
                    Segment::Int(
                        run.parse()
                            .map_err(|_| malformed(&format!("numeric segment '{run}' is too large")))?,
                    )
                } else {
                    Segment::Alpha(run)
                };
                segments.push(segment);
            } else {
                pending_sep.push(c);
                chars.next();
            }
        }

        if segments.is_empty() {
            return Err(malformed("no alphanumeric segments"));
        }

        Ok(Self {
            string: string.to_string(),
            segments,
            separators,
        })
    }

    /// The version exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.string
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Separators between consecutive segments; one fewer than segments.
    pub fn separators(&self) -> &[String] {
        &self.separators
    }

    /// A version is numeric when its first segment is an integer.
    pub fn is_numeric(&self) -> bool {
        matches!(self.segments.first(), Some(Segment::Int(_)))
    }

    pub fn is_develop(&self) -> bool {
        matches!(self.segments.as_slice(), [Segment::Alpha(s)] if s == "develop")
    }

    /// `self` satisfies `other` when `other` is a segment prefix of `self`,
    /// e.g. `4.7.3` satisfies `4.7`.
    pub fn satisfies(&self, other: &Version) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// `self` contains `other` when `self` is a segment prefix of `other`.
    pub fn contains(&self, other: &Version) -> bool {
        other.segments.starts_with(&self.segments)
    }

    pub fn overlaps(&self, other: &Version) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// True when `other` is the immediate successor of `self`: same length,
    /// same leading segments and a last integer segment exactly one higher.
    pub fn is_predecessor(&self, other: &Version) -> bool {
        let n = self.segments.len();
        if n == 0 || n != other.segments.len() {
            return false;
        }
        if self.segments[..n - 1] != other.segments[..n - 1] {
            return false;
        }
        match (self.segments[n - 1].as_int(), other.segments[n - 1].as_int()) {
            (Some(a), Some(b)) => a.checked_add(1) == Some(b),
            _ => false,
        }
    }

    pub fn is_successor(&self, other: &Version) -> bool {
        other.is_predecessor(self)
    }

    /// The first `n` segments joined with the original separators.
    pub fn up_to(&self, n: usize) -> String {
        let n = n.min(self.segments.len());
        let mut out = String::new();
        for (i, seg) in self.segments.iter().take(n).enumerate() {
            if i > 0 {
                out.push_str(&self.separators[i - 1]);
            }
            out.push_str(&seg.to_string());
        }
        out
    }

    pub fn dotted(&self) -> String {
        self.joined_with(".")
    }

    pub fn underscored(&self) -> String {
        self.joined_with("_")
    }

    pub fn dashed(&self) -> String {
        self.joined_with("-")
    }

    pub fn joined(&self) -> String {
        self.joined_with("")
    }

    fn joined_with(&self, sep: &str) -> String {
        self.segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// Union with another version. When one contains the other the broader
    /// of the two is returned, otherwise both are kept in a list.
    pub fn union(&self, other: &Version) -> VersionExpr {
        if self == other || self.contains(other) {
            VersionExpr::Version(self.clone())
        } else if other.contains(self) {
            VersionExpr::Version(other.clone())
        } else {
            let mut list = VersionList::new();
            list.add(self.clone());
            list.add(other.clone());
            VersionExpr::List(list)
        }
    }

    /// Intersection with another version: the version itself when both are
    /// equal, otherwise the empty list.
    pub fn intersection(&self, other: &Version) -> VersionExpr {
        if self == other {
            VersionExpr::Version(self.clone())
        } else {
            VersionExpr::List(VersionList::new())
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.segments == other.segments {
            return Ordering::Equal;
        }
        match (self.is_develop(), other.is_develop()) {
            (true, _) => return Ordering::Greater,
            (_, true) => return Ordering::Less,
            _ => {}
        }
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => self.segments.cmp(&other.segments),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            // Not raw-string order: `1_a` and `1.a` are equal by segment, so
            // they must also compare equal here.
            (false, false) => self.dotted().cmp(&other.dotted()),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string)
    }
}

impl FromStr for Version {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}
