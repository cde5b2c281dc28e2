use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use konkret_util::errors::KonkretError;

use super::{Version, VersionRange};

/// A member of a [`VersionList`]: a single version or a range.
#[derive(Debug, Clone)]
pub enum VersionItem {
    Version(Version),
    Range(VersionRange),
}

impl VersionItem {
    fn as_range(&self) -> Cow<'_, VersionRange> {
        match self {
            VersionItem::Version(v) => Cow::Owned(VersionRange::point(v.clone())),
            VersionItem::Range(r) => Cow::Borrowed(r),
        }
    }

    /// A range with equal ends collapses to its single version.
    fn normalize(self) -> Self {
        match self {
            VersionItem::Range(r) => match r.concrete() {
                Some(v) => VersionItem::Version(v.clone()),
                None => VersionItem::Range(r),
            },
            v => v,
        }
    }

    pub fn concrete(&self) -> Option<&Version> {
        match self {
            VersionItem::Version(v) => Some(v),
            VersionItem::Range(r) => r.concrete(),
        }
    }

    pub fn lowest(&self) -> Option<&Version> {
        match self {
            VersionItem::Version(v) => Some(v),
            VersionItem::Range(r) => r.lowest(),
        }
    }

    pub fn highest(&self) -> Option<&Version> {
        match self {
            VersionItem::Version(v) => Some(v),
            VersionItem::Range(r) => r.highest(),
        }
    }

    pub fn satisfies(&self, other: &VersionItem) -> bool {
        match (self, other) {
            (VersionItem::Version(a), VersionItem::Version(b)) => a.satisfies(b),
            _ => self.as_range().satisfies(&other.as_range()),
        }
    }

    pub fn overlaps(&self, other: &VersionItem) -> bool {
        match (self, other) {
            (VersionItem::Version(a), VersionItem::Version(b)) => a.overlaps(b),
            _ => self.as_range().overlaps(&other.as_range()),
        }
    }

    pub fn contains(&self, other: &VersionItem) -> bool {
        match (self, other) {
            (VersionItem::Version(a), VersionItem::Version(b)) => a.contains(b),
            _ => self.as_range().contains(&other.as_range()),
        }
    }

    pub fn intersection(&self, other: &VersionItem) -> Option<VersionItem> {
        match (self, other) {
            (VersionItem::Version(a), VersionItem::Version(b)) => {
                (a == b).then(|| VersionItem::Version(a.clone()))
            }
            _ => self
                .as_range()
                .intersection(&other.as_range())
                .map(|r| VersionItem::Range(r).normalize()),
        }
    }

    fn merges_with(&self, other: &VersionItem) -> bool {
        self.overlaps(other) || self.as_range().is_adjacent(&other.as_range())
    }

    fn merge(&self, other: &VersionItem) -> VersionItem {
        if let (VersionItem::Version(a), VersionItem::Version(b)) = (self, other) {
            if a.contains(b) {
                return self.clone();
            }
            if b.contains(a) {
                return other.clone();
            }
        }
        let (a, b) = (self.as_range(), other.as_range());
        match a.merge(&b) {
            Some(r) => VersionItem::Range(r).normalize(),
            None => self.clone(),
        }
    }
}

impl From<Version> for VersionItem {
    fn from(v: Version) -> Self {
        VersionItem::Version(v)
    }
}

impl From<VersionRange> for VersionItem {
    fn from(r: VersionRange) -> Self {
        VersionItem::Range(r)
    }
}

impl PartialEq for VersionItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionItem {}

impl Hash for VersionItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_range().hash(state);
    }
}

impl Ord for VersionItem {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionItem::Version(a), VersionItem::Version(b)) => a.cmp(b),
            _ => self.as_range().cmp(&other.as_range()),
        }
    }
}

impl PartialOrd for VersionItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionItem::Version(v) => write!(f, "{v}"),
            VersionItem::Range(r) => write!(f, "{r}"),
        }
    }
}

impl FromStr for VersionItem {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            Ok(VersionItem::Range(s.parse()?).normalize())
        } else {
            Ok(VersionItem::Version(Version::parse(s)?))
        }
    }
}

/// A sorted, non-overlapping union of versions and ranges.
///
/// Items that overlap or touch (`3` then `4`) are merged on insertion, so a
/// list built from the same set of versions always has the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionList {
    items: Vec<VersionItem>,
}

impl VersionList {
    /// The empty list, which no version satisfies.
    pub fn new() -> Self {
        Self::default()
    }

    /// The unconstrained list `:`.
    pub fn any() -> Self {
        Self {
            items: vec![VersionItem::Range(VersionRange::any())],
        }
    }

    pub fn items(&self) -> &[VersionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_any(&self) -> bool {
        matches!(self.items.as_slice(), [VersionItem::Range(r)] if r.is_any())
    }

    /// Insert an item, merging it with any neighbours it overlaps or touches.
    pub fn add(&mut self, item: impl Into<VersionItem>) {
        let mut item = item.into().normalize();
        let mut i = self.items.partition_point(|x| x < &item);

        while i > 0 && item.merges_with(&self.items[i - 1]) {
            item = item.merge(&self.items[i - 1]);
            self.items.remove(i - 1);
            i -= 1;
        }
        while i < self.items.len() && item.merges_with(&self.items[i]) {
            item = item.merge(&self.items[i]);
            self.items.remove(i);
        }
        self.items.insert(i, item);
    }

    pub fn update(&mut self, other: &VersionList) {
        for item in &other.items {
            self.add(item.clone());
        }
    }

    /// The single version this list denotes, if any.
    pub fn concrete(&self) -> Option<&Version> {
        match self.items.as_slice() {
            [only] => only.concrete(),
            _ => None,
        }
    }

    pub fn lowest(&self) -> Option<&Version> {
        self.items.first().and_then(|i| i.lowest())
    }

    pub fn highest(&self) -> Option<&Version> {
        self.items.last().and_then(|i| i.highest())
    }

    /// Whether the single version `v` satisfies some item of this list.
    pub fn is_satisfied_by(&self, v: &Version) -> bool {
        let item = VersionItem::Version(v.clone());
        self.items.iter().any(|i| item.satisfies(i))
    }

    /// Non-strict: some item of `self` satisfies some item of `other`.
    pub fn satisfies(&self, other: &VersionList) -> bool {
        let (mut s, mut o) = (0, 0);
        while s < self.items.len() && o < other.items.len() {
            if self.items[s].satisfies(&other.items[o]) {
                return true;
            }
            if self.items[s] < other.items[o] {
                s += 1;
            } else {
                o += 1;
            }
        }
        false
    }

    /// Strict satisfaction: every version of `self` lies in `other`.
    pub fn satisfies_strict(&self, other: &VersionList) -> bool {
        other.contains(self)
    }

    pub fn overlaps(&self, other: &VersionList) -> bool {
        let (mut s, mut o) = (0, 0);
        while s < self.items.len() && o < other.items.len() {
            if self.items[s].overlaps(&other.items[o]) {
                return true;
            }
            if self.items[s] < other.items[o] {
                s += 1;
            } else {
                o += 1;
            }
        }
        false
    }

    /// True when every item of `other` lies inside some item of `self`.
    pub fn contains(&self, other: &VersionList) -> bool {
        other
            .items
            .iter()
            .all(|o| self.items.iter().any(|s| s.contains(o)))
    }

    pub fn union(&self, other: &VersionList) -> VersionList {
        let mut out = self.clone();
        out.update(other);
        out
    }

    pub fn intersection(&self, other: &VersionList) -> VersionList {
        let mut out = VersionList::new();
        for s in &self.items {
            for o in &other.items {
                if let Some(common) = s.intersection(o) {
                    out.add(common);
                }
            }
        }
        out
    }

    /// Narrow `self` to its intersection with `other`; returns whether it
    /// changed.
    pub fn intersect(&mut self, other: &VersionList) -> bool {
        let narrowed = self.intersection(other);
        let changed = narrowed != *self;
        *self = narrowed;
        changed
    }
}

impl From<Version> for VersionList {
    fn from(v: Version) -> Self {
        Self {
            items: vec![VersionItem::Version(v)],
        }
    }
}

impl From<VersionRange> for VersionList {
    fn from(r: VersionRange) -> Self {
        let mut list = Self::new();
        list.add(r);
        list
    }
}

impl FromIterator<VersionItem> for VersionList {
    fn from_iter<T: IntoIterator<Item = VersionItem>>(iter: T) -> Self {
        let mut list = Self::new();
        for item in iter {
            list.add(item);
        }
        list
    }
}

impl fmt::Display for VersionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl FromStr for VersionList {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        s.split(',')
            .map(VersionItem::from_str)
            .collect::<Result<VersionList, _>>()
    }
}

impl Serialize for VersionList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Ok(VersionList::any());
        }
        s.parse().map_err(serde::de::Error::custom)
    }
}
