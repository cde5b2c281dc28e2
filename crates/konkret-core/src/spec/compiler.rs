use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use konkret_util::errors::{KonkretError, KonkretResult};

use crate::version::{Version, VersionList};

/// A compiler constraint such as `gcc`, `gcc@4.7` or `gcc@4.7.3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompilerSpec {
    pub name: String,
    pub versions: VersionList,
}

impl CompilerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: VersionList::any(),
        }
    }

    pub fn with_version(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            versions: VersionList::from(version),
        }
    }

    pub fn concrete(&self) -> Option<&Version> {
        self.versions.concrete()
    }

    pub fn is_concrete(&self) -> bool {
        self.concrete().is_some()
    }

    pub fn satisfies(&self, other: &CompilerSpec, strict: bool) -> bool {
        if self.name != other.name {
            return false;
        }
        if strict {
            self.versions.satisfies_strict(&other.versions)
        } else {
            self.versions.satisfies(&other.versions)
        }
    }

    /// Narrow the versions to those `other` also accepts.
    pub fn constrain(&mut self, other: &CompilerSpec) -> KonkretResult<bool> {
        if self.name != other.name || !self.versions.overlaps(&other.versions) {
            return Err(KonkretError::Unsatisfiable {
                package: String::new(),
                kind: "compiler".to_string(),
                provided: self.to_string(),
                required: other.to_string(),
            });
        }
        Ok(self.versions.intersect(&other.versions))
    }
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.versions.is_any() {
            write!(f, "@{}", self.versions)?;
        }
        Ok(())
    }
}

impl FromStr for CompilerSpec {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, versions) = match s.split_once('@') {
            Some((name, versions)) => (name, versions.parse()?),
            None => (s, VersionList::any()),
        };
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(KonkretError::SpecParse {
                input: s.to_string(),
                message: "invalid compiler name".to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            versions,
        })
    }
}

impl Serialize for CompilerSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompilerSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
