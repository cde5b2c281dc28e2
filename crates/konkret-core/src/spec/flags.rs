use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use konkret_util::errors::KonkretError;

/// A compiler flag category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Cflags,
    Cxxflags,
    Fflags,
    Ldflags,
    Ldlibs,
    Cppflags,
}

impl FlagKind {
    pub const ALL: [FlagKind; 6] = [
        FlagKind::Cflags,
        FlagKind::Cxxflags,
        FlagKind::Fflags,
        FlagKind::Ldflags,
        FlagKind::Ldlibs,
        FlagKind::Cppflags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKind::Cflags => "cflags",
            FlagKind::Cxxflags => "cxxflags",
            FlagKind::Fflags => "fflags",
            FlagKind::Ldflags => "ldflags",
            FlagKind::Ldlibs => "ldlibs",
            FlagKind::Cppflags => "cppflags",
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagKind {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlagKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| KonkretError::Generic {
                message: format!("unknown flag category '{s}'"),
            })
    }
}

/// Flag tokens per category. A present key with no tokens means "resolved
/// to nothing", which differs from an absent key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagMap(BTreeMap<FlagKind, Vec<String>>);

impl FlagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: FlagKind) -> Option<&[String]> {
        self.0.get(&kind).map(Vec::as_slice)
    }

    pub fn contains(&self, kind: FlagKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlagKind, &[String])> {
        self.0.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every category has been resolved.
    pub fn is_concrete(&self) -> bool {
        FlagKind::ALL.iter().all(|k| self.0.contains_key(k))
    }

    /// Make sure `kind` is present; returns whether the key was added.
    pub fn ensure(&mut self, kind: FlagKind) -> bool {
        if self.0.contains_key(&kind) {
            return false;
        }
        self.0.insert(kind, Vec::new());
        true
    }

    /// Append the tokens not already present, keeping their order.
    /// Returns whether any token was added.
    pub fn extend<'a>(&mut self, kind: FlagKind, tokens: impl IntoIterator<Item = &'a String>) -> bool {
        let entry = self.0.entry(kind).or_default();
        let before = entry.len();
        for token in tokens {
            if !entry.contains(token) {
                entry.push(token.clone());
            }
        }
        entry.len() != before
    }

    /// Set a whole category from a whitespace separated string.
    pub fn set_from_str(&mut self, kind: FlagKind, value: &str) {
        self.0.insert(
            kind,
            value.split_whitespace().map(str::to_string).collect(),
        );
    }

    /// Categories set on both maps hold the same token set.
    pub fn satisfies(&self, other: &FlagMap) -> bool {
        other.0.iter().all(|(k, theirs)| match self.0.get(k) {
            Some(ours) => {
                theirs.iter().all(|t| ours.contains(t)) && ours.iter().all(|t| theirs.contains(t))
            }
            None => true,
        })
    }

    /// Union every category of `other` into `self`.
    pub fn union(&mut self, other: &FlagMap) -> bool {
        let mut changed = false;
        for (k, tokens) in &other.0 {
            let added_key = !self.0.contains_key(k);
            changed |= self.extend(*k, tokens) || added_key;
        }
        changed
    }
}

impl fmt::Display for FlagMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<String> = self
            .0
            .iter()
            .filter(|(_, tokens)| !tokens.is_empty())
            .map(|(k, tokens)| format!("{k}=\"{}\"", tokens.join(" ")))
            .collect();
        f.write_str(&words.join(" "))
    }
}
