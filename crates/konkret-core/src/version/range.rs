use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use konkret_util::errors::{KonkretError, KonkretResult};

use super::{Version, VersionExpr, VersionList};

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bound {
    Unbounded,
    Version(Version),
}

impl Bound {
    pub fn version(&self) -> Option<&Version> {
        match self {
            Bound::Unbounded => None,
            Bound::Version(v) => Some(v),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Bound::Unbounded)
    }
}

impl From<Version> for Bound {
    fn from(v: Version) -> Self {
        Bound::Version(v)
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Unbounded => Ok(()),
            Bound::Version(v) => write!(f, "{v}"),
        }
    }
}

/// An inclusive range of versions, `start:end`, where either end may be
/// open. Bounds match by prefix, so `1.2:1.4` includes `1.4.9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    start: Bound,
    end: Bound,
}

impl VersionRange {
    /// Build a range, rejecting one whose end sorts below its start.
    ///
    /// An end that is a prefix of the start is accepted: `1.4.3:1.4` holds
    /// the `1.4.3` series, and is what narrowing `1.2:1.4` by `1.4.3:`
    /// produces.
    pub fn new(start: Bound, end: Bound) -> KonkretResult<Self> {
        if let (Bound::Version(s), Bound::Version(e)) = (&start, &end) {
            if e < s && !e.contains(s) {
                return Err(KonkretError::InvalidRange {
                    range: format!("{s}:{e}"),
                });
            }
        }
        Ok(Self { start, end })
    }

    pub fn between(start: Version, end: Version) -> KonkretResult<Self> {
        Self::new(Bound::Version(start), Bound::Version(end))
    }

    /// The fully open range `:`.
    pub fn any() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    pub fn point(v: Version) -> Self {
        Self {
            start: Bound::Version(v.clone()),
            end: Bound::Version(v),
        }
    }

    /// Results of range algebra are ordered by construction.
    pub(crate) fn from_bounds(start: Bound, end: Bound) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> &Bound {
        &self.start
    }

    pub fn end(&self) -> &Bound {
        &self.end
    }

    pub fn is_any(&self) -> bool {
        self.start.is_unbounded() && self.end.is_unbounded()
    }

    /// The single version this range denotes when both ends are equal.
    pub fn concrete(&self) -> Option<&Version> {
        match (&self.start, &self.end) {
            (Bound::Version(s), Bound::Version(e)) if s == e => Some(s),
            _ => None,
        }
    }

    pub fn lowest(&self) -> Option<&Version> {
        self.start.version()
    }

    pub fn highest(&self) -> Option<&Version> {
        self.end.version()
    }

    /// True when every version of `other` lies inside this range.
    pub fn contains(&self, other: &VersionRange) -> bool {
        let in_lower = self.start == other.start
            || match (&self.start, &other.start) {
                (Bound::Unbounded, _) => true,
                (Bound::Version(_), Bound::Unbounded) => false,
                (Bound::Version(s), Bound::Version(o)) => s < o || s.contains(o),
            };
        if !in_lower {
            return false;
        }
        self.end == other.end
            || match (&self.end, &other.end) {
                (Bound::Unbounded, _) => true,
                (Bound::Version(_), Bound::Unbounded) => false,
                (Bound::Version(s), Bound::Version(o)) => s > o || s.contains(o),
            }
    }

    pub fn contains_version(&self, v: &Version) -> bool {
        self.contains(&VersionRange::point(v.clone()))
    }

    pub fn overlaps(&self, other: &VersionRange) -> bool {
        reaches(&self.start, &other.end) && reaches(&other.start, &self.end)
    }

    /// Non-strict satisfaction: the ranges share at least one version.
    pub fn satisfies(&self, other: &VersionRange) -> bool {
        if self.overlaps(other) {
            return true;
        }
        match (&self.start, &other.end) {
            (Bound::Version(s), Bound::Version(e)) => s.satisfies(e),
            _ => false,
        }
    }

    pub fn union(&self, other: &VersionRange) -> VersionExpr {
        if self.overlaps(other) {
            return VersionExpr::Range(self.overlapping_union(other));
        }
        match self.join_adjacent(other) {
            Some(joined) => VersionExpr::Range(joined),
            None => {
                let mut list = VersionList::new();
                list.add(self.clone());
                list.add(other.clone());
                VersionExpr::List(list)
            }
        }
    }

    /// The hull of two ranges, or `None` when they neither overlap nor
    /// touch end to start.
    pub(crate) fn merge(&self, other: &VersionRange) -> Option<VersionRange> {
        if self.overlaps(other) {
            Some(self.overlapping_union(other))
        } else {
            self.join_adjacent(other)
        }
    }

    pub(crate) fn is_adjacent(&self, other: &VersionRange) -> bool {
        self.join_adjacent(other).is_some()
    }

    fn join_adjacent(&self, other: &VersionRange) -> Option<VersionRange> {
        if let (Bound::Version(e), Bound::Version(s)) = (&self.end, &other.start) {
            if e.is_predecessor(s) {
                return Some(Self::from_bounds(self.start.clone(), other.end.clone()));
            }
        }
        if let (Bound::Version(e), Bound::Version(s)) = (&other.end, &self.start) {
            if e.is_predecessor(s) {
                return Some(Self::from_bounds(other.start.clone(), self.end.clone()));
            }
        }
        None
    }

    fn overlapping_union(&self, other: &VersionRange) -> VersionRange {
        let start = match (&self.start, &other.start) {
            (Bound::Version(s), Bound::Version(o)) => {
                if o.contains(s) || o < s {
                    Bound::Version(o.clone())
                } else {
                    Bound::Version(s.clone())
                }
            }
            _ => Bound::Unbounded,
        };
        let end = match (&self.end, &other.end) {
            (Bound::Version(s), Bound::Version(o)) => {
                if !s.contains(o) && (o.contains(s) || o > s) {
                    Bound::Version(o.clone())
                } else {
                    Bound::Version(s.clone())
                }
            }
            _ => Bound::Unbounded,
        };
        Self::from_bounds(start, end)
    }

    /// The versions both ranges accept, or `None` when they are disjoint.
    pub fn intersection(&self, other: &VersionRange) -> Option<VersionRange> {
        if !self.overlaps(other) {
            return None;
        }
        let start = match (&self.start, &other.start) {
            (Bound::Unbounded, o) => o.clone(),
            (Bound::Version(s), Bound::Version(o)) if o > s || s.contains(o) => {
                Bound::Version(o.clone())
            }
            (s, _) => s.clone(),
        };
        let end = match (&self.end, &other.end) {
            (Bound::Unbounded, o) => o.clone(),
            (Bound::Version(s), Bound::Version(o)) if !o.contains(s) && (o < s || s.contains(o)) => {
                Bound::Version(o.clone())
            }
            (s, _) => s.clone(),
        };
        Some(Self::from_bounds(start, end))
    }
}

/// Whether a range starting at `start` can reach one ending at `end`.
fn reaches(start: &Bound, end: &Bound) -> bool {
    match (start, end) {
        (Bound::Version(s), Bound::Version(e)) => s <= e || s.contains(e) || e.contains(s),
        _ => true,
    }
}

impl Ord for VersionRange {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.start != other.start {
            return match (&self.start, &other.start) {
                (Bound::Unbounded, _) => Ordering::Less,
                (_, Bound::Unbounded) => Ordering::Greater,
                (Bound::Version(a), Bound::Version(b)) => a.cmp(b),
            };
        }
        if self.end == other.end {
            return Ordering::Equal;
        }
        match (&self.end, &other.end) {
            (Bound::Unbounded, _) => Ordering::Greater,
            (_, Bound::Unbounded) => Ordering::Less,
            (Bound::Version(a), Bound::Version(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for VersionRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for VersionRange {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s.split_once(':').ok_or_else(|| KonkretError::InvalidRange {
            range: s.to_string(),
        })?;
        if end.contains(':') {
            return Err(KonkretError::InvalidRange {
                range: s.to_string(),
            });
        }
        let bound = |part: &str| -> KonkretResult<Bound> {
            let part = part.trim();
            if part.is_empty() {
                Ok(Bound::Unbounded)
            } else {
                Version::parse(part).map(Bound::Version)
            }
        };
        VersionRange::new(bound(start)?, bound(end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(r("1.2:1.4").to_string(), "1.2:1.4");
        assert_eq!(r(":1.4").to_string(), ":1.4");
        assert_eq!(r("1.2:").to_string(), "1.2:");
        assert!(r(":").is_any());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert!(matches!(
            "2.0:1.0".parse::<VersionRange>(),
            Err(KonkretError::InvalidRange { .. })
        ));
        assert!(matches!(
            "1.5.1:1.4".parse::<VersionRange>(),
            Err(KonkretError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_end_prefixing_start_is_accepted() {
        let range = r("1.4.3:1.4");
        assert!(range.contains_version(&Version::parse("1.4.3.2").unwrap()));
        assert!(!range.contains_version(&Version::parse("1.4.2").unwrap()));
        assert!(!range.contains_version(&Version::parse("1.5").unwrap()));
    }

    #[test]
    fn test_contains_uses_prefix_bounds() {
        assert!(r("1.2:1.4").contains(&r("1.4.7:1.4.7")));
        assert!(r("1.2:1.4").contains(&r("1.3:1.4")));
        assert!(!r("1.2:1.4").contains(&r("1.3:1.5")));
        assert!(r(":").contains(&r("1:2")));
        assert!(!r("1:2").contains(&r(":")));
    }

    #[test]
    fn test_overlaps() {
        assert!(r("1.2:1.4").overlaps(&r("1.4.2:2")));
        assert!(r(":1").overlaps(&r("1:")));
        assert!(!r("1:2").overlaps(&r("3:4")));
    }

    #[test]
    fn test_union_of_overlapping_ranges() {
        assert_eq!(r("1:3").union(&r("2:5")), VersionExpr::Range(r("1:5")));
        assert_eq!(r(":3").union(&r("2:5")), VersionExpr::Range(r(":5")));
    }

    #[test]
    fn test_union_joins_adjacent_ranges() {
        assert_eq!(r("1:3").union(&r("4:5")), VersionExpr::Range(r("1:5")));
        assert!(matches!(r("1:2").union(&r("4:5")), VersionExpr::List(_)));
    }

    #[test]
    fn test_intersection() {
        assert_eq!(r("1:3").intersection(&r("2:5")), Some(r("2:3")));
        assert_eq!(r(":").intersection(&r("2:5")), Some(r("2:5")));
        let narrowed = r("1.2:1.4").intersection(&r("1.4.3:")).unwrap();
        assert_eq!(narrowed.to_string(), "1.4.3:1.4");
        assert_eq!(r(&narrowed.to_string()), narrowed);
        assert_eq!(r("1:2").intersection(&r("3:4")), None);
    }

    #[test]
    fn test_ordering_puts_open_start_first() {
        let mut ranges = vec![r("2:3"), r(":1"), r("2:"), r("2:2.5")];
        ranges.sort();
        let shown: Vec<_> = ranges.iter().map(|x| x.to_string()).collect();
        assert_eq!(shown, vec![":1", "2:2.5", "2:3", "2:"]);
    }

    #[test]
    fn test_concrete() {
        assert_eq!(r("1.2:1.2").concrete().map(|v| v.to_string()), Some("1.2".into()));
        assert!(r("1.2:1.3").concrete().is_none());
    }
}
