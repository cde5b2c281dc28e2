use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use konkret_util::errors::{KonkretError, KonkretResult};

use super::{Version, VersionList, VersionRange};

/// Any of the three version forms. Binary operations first lift the lower
/// ranked operand (version < range < list) to the other's form.
#[derive(Debug, Clone)]
pub enum VersionExpr {
    Version(Version),
    Range(VersionRange),
    List(VersionList),
}

enum Coerced {
    Versions(Version, Version),
    Ranges(VersionRange, VersionRange),
    Lists(VersionList, VersionList),
}

impl VersionExpr {
    /// Parse a bare version, a `start:end` range or a comma separated list.
    pub fn parse(input: &str) -> KonkretResult<Self> {
        let s: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if s.contains(',') {
            Ok(VersionExpr::List(s.parse()?))
        } else if s.contains(':') {
            Ok(VersionExpr::Range(s.parse()?))
        } else {
            Ok(VersionExpr::Version(Version::parse(&s)?))
        }
    }

    fn rank(&self) -> u8 {
        match self {
            VersionExpr::Version(_) => 0,
            VersionExpr::Range(_) => 1,
            VersionExpr::List(_) => 2,
        }
    }

    pub fn into_list(self) -> VersionList {
        match self {
            VersionExpr::Version(v) => VersionList::from(v),
            VersionExpr::Range(r) => VersionList::from(r),
            VersionExpr::List(l) => l,
        }
    }

    fn into_range(self) -> Option<VersionRange> {
        match self {
            VersionExpr::Version(v) => Some(VersionRange::point(v)),
            VersionExpr::Range(r) => Some(r),
            VersionExpr::List(_) => None,
        }
    }

    fn coerce(&self, other: &VersionExpr) -> Coerced {
        match (self, other) {
            (VersionExpr::Version(a), VersionExpr::Version(b)) => {
                Coerced::Versions(a.clone(), b.clone())
            }
            _ if self.rank().max(other.rank()) == 1 => {
                match (self.clone().into_range(), other.clone().into_range()) {
                    (Some(a), Some(b)) => Coerced::Ranges(a, b),
                    _ => Coerced::Lists(self.clone().into_list(), other.clone().into_list()),
                }
            }
            _ => Coerced::Lists(self.clone().into_list(), other.clone().into_list()),
        }
    }

    pub fn satisfies(&self, other: &VersionExpr) -> bool {
        match self.coerce(other) {
            Coerced::Versions(a, b) => a.satisfies(&b),
            Coerced::Ranges(a, b) => a.satisfies(&b),
            Coerced::Lists(a, b) => a.satisfies(&b),
        }
    }

    pub fn overlaps(&self, other: &VersionExpr) -> bool {
        match self.coerce(other) {
            Coerced::Versions(a, b) => a.overlaps(&b),
            Coerced::Ranges(a, b) => a.overlaps(&b),
            Coerced::Lists(a, b) => a.overlaps(&b),
        }
    }

    pub fn contains(&self, other: &VersionExpr) -> bool {
        match self.coerce(other) {
            Coerced::Versions(a, b) => a.contains(&b),
            Coerced::Ranges(a, b) => a.contains(&b),
            Coerced::Lists(a, b) => a.contains(&b),
        }
    }

    pub fn union(&self, other: &VersionExpr) -> VersionExpr {
        match self.coerce(other) {
            Coerced::Versions(a, b) => a.union(&b),
            Coerced::Ranges(a, b) => a.union(&b),
            Coerced::Lists(a, b) => VersionExpr::List(a.union(&b)),
        }
    }

    pub fn intersection(&self, other: &VersionExpr) -> VersionExpr {
        match self.coerce(other) {
            Coerced::Versions(a, b) => a.intersection(&b),
            Coerced::Ranges(a, b) => match a.intersection(&b) {
                Some(r) => VersionExpr::Range(r),
                None => VersionExpr::List(VersionList::new()),
            },
            Coerced::Lists(a, b) => VersionExpr::List(a.intersection(&b)),
        }
    }
}

impl PartialEq for VersionExpr {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for VersionExpr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(match self.coerce(other) {
            Coerced::Versions(a, b) => a.cmp(&b),
            Coerced::Ranges(a, b) => a.cmp(&b),
            Coerced::Lists(a, b) => a.cmp(&b),
        })
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionExpr::Version(v) => write!(f, "{v}"),
            VersionExpr::Range(r) => write!(f, "{r}"),
            VersionExpr::List(l) => write!(f, "{l}"),
        }
    }
}

impl FromStr for VersionExpr {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionExpr::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(s: &str) -> VersionExpr {
        VersionExpr::parse(s).unwrap()
    }

    #[test]
    fn test_parse_picks_form() {
        assert!(matches!(e("1.2"), VersionExpr::Version(_)));
        assert!(matches!(e("1.2:1.4"), VersionExpr::Range(_)));
        assert!(matches!(e("1.2, 1.4"), VersionExpr::List(_)));
    }

    #[test]
    fn test_mixed_forms_are_coerced() {
        assert!(e("1.3").satisfies(&e("1.2:1.4")));
        assert!(e("1.2:1.4").contains(&e("1.3.1")));
        assert!(e("1.0,1.3").overlaps(&e("1.2:1.4")));
        assert_eq!(e("1.2:1.2"), e("1.2"));
    }

    #[test]
    fn test_mixed_union_and_intersection() {
        assert_eq!(e("1.0:2.0").union(&e("3.0")).to_string(), "1.0:2.0,3.0");
        assert_eq!(e("1.0:2.0").intersection(&e("1.5")).to_string(), "1.5:1.5");
        assert_eq!(e("1,5").intersection(&e("1:3")).to_string(), "1");
    }
}
