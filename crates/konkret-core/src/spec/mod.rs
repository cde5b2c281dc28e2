//! The spec node model.
//!
//! A [`Spec`] is one node of a build DAG: a package name plus constraints on
//! its version, architecture, compiler, variants and compiler flags. The
//! edges between nodes live in the resolver's graph; everything here is
//! per-node.

mod arch;
mod compiler;
mod flags;
mod parse;
mod variant;

pub use arch::{ArchField, ArchSpec, ArchValue};
pub use compiler::CompilerSpec;
pub use flags::{FlagKind, FlagMap};
pub use parse::{parse_request, SpecRequest};
pub use variant::{VariantMap, VariantValue};

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use konkret_util::errors::{KonkretError, KonkretResult};

use crate::package::PackageDef;
use crate::version::VersionList;

/// The kinds of a dependency edge, as a small bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepTypes(u8);

impl DepTypes {
    pub const NONE: DepTypes = DepTypes(0);
    pub const BUILD: DepTypes = DepTypes(1);
    pub const LINK: DepTypes = DepTypes(1 << 1);
    pub const RUN: DepTypes = DepTypes(1 << 2);
    pub const ALL: DepTypes = DepTypes(0b111);

    pub fn contains(self, other: DepTypes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: DepTypes) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn names(self) -> Vec<&'static str> {
        [
            (DepTypes::BUILD, "build"),
            (DepTypes::LINK, "link"),
            (DepTypes::RUN, "run"),
        ]
        .into_iter()
        .filter(|(t, _)| self.contains(*t))
        .map(|(_, name)| name)
        .collect()
    }
}

impl BitOr for DepTypes {
    type Output = DepTypes;

    fn bitor(self, rhs: Self) -> Self::Output {
        DepTypes(self.0 | rhs.0)
    }
}

impl FromStr for DepTypes {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(DepTypes::BUILD),
            "link" => Ok(DepTypes::LINK),
            "run" => Ok(DepTypes::RUN),
            other => Err(KonkretError::Config {
                message: format!("unknown dependency type '{other}'"),
            }),
        }
    }
}

impl fmt::Display for DepTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

impl Serialize for DepTypes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.names().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DepTypes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names.iter().try_fold(DepTypes::NONE, |acc, n| {
            n.parse::<DepTypes>()
                .map(|t| acc | t)
                .map_err(serde::de::Error::custom)
        })
    }
}

/// One node of a build DAG.
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub name: String,
    pub versions: VersionList,
    pub architecture: ArchSpec,
    pub compiler: Option<CompilerSpec>,
    pub variants: VariantMap,
    pub compiler_flags: FlagMap,
    /// Set for names that no package defines but some package provides.
    pub is_virtual: bool,
    /// Install prefix of a pre-installed package.
    pub external: Option<String>,
}

impl Spec {
    /// An unconstrained spec for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: VersionList::any(),
            architecture: ArchSpec::default(),
            compiler: None,
            variants: VariantMap::new(),
            compiler_flags: FlagMap::new(),
            is_virtual: false,
            external: None,
        }
    }

    /// Parse a single node; `^` dependency constraints are rejected.
    pub fn parse(input: &str) -> KonkretResult<Self> {
        let request = parse_request(input)?;
        if !request.dependencies.is_empty() {
            return Err(KonkretError::SpecParse {
                input: input.to_string(),
                message: "dependency constraints are not allowed here".to_string(),
            });
        }
        Ok(request.root)
    }

    /// The names of the attributes that are still open on this node.
    ///
    /// Variants are only complete relative to a package definition, so a
    /// node without one reports its variants as resolved.
    pub fn unresolved_fields(&self, package: Option<&PackageDef>) -> Vec<&'static str> {
        if self.is_virtual {
            return vec!["provider"];
        }
        let mut open = Vec::new();
        if self.versions.concrete().is_none() {
            open.push("version");
        }
        if !self.architecture.is_concrete() {
            open.push("architecture");
        }
        if !self.compiler.as_ref().is_some_and(CompilerSpec::is_concrete) {
            open.push("compiler");
        }
        if let Some(pkg) = package {
            if pkg.variants.keys().any(|v| !self.variants.contains_key(v)) {
                open.push("variants");
            }
        }
        if !self.compiler_flags.is_concrete() {
            open.push("compiler_flags");
        }
        open
    }

    pub fn is_concrete(&self, package: Option<&PackageDef>) -> bool {
        self.unresolved_fields(package).is_empty()
    }

    /// Non-strict satisfaction of another node's constraints. Names must
    /// match; matching a virtual against a provider is the repository's
    /// concern.
    pub fn satisfies(&self, other: &Spec) -> bool {
        self.name == other.name
            && self.versions.satisfies(&other.versions)
            && self.satisfies_attributes(other)
    }

    /// Satisfaction of everything except name and versions.
    pub fn satisfies_attributes(&self, other: &Spec) -> bool {
        if let (Some(ours), Some(theirs)) = (&self.compiler, &other.compiler) {
            if !ours.satisfies(theirs, false) {
                return false;
            }
        }
        if !self.architecture.satisfies(&other.architecture, false) {
            return false;
        }
        let variants_agree = other
            .variants
            .iter()
            .all(|(k, v)| self.variants.get(k).map_or(true, |ours| ours == v));
        variants_agree && self.compiler_flags.satisfies(&other.compiler_flags)
    }

    /// Intersect this node with `other`'s constraints. Returns whether
    /// anything changed; a conflict leaves `self` partially updated and
    /// reports which attribute clashed.
    pub fn constrain(&mut self, other: &Spec) -> KonkretResult<bool> {
        if self.name != other.name {
            return Err(self.unsatisfiable("name", &self.name, &other.name));
        }
        if !self.versions.overlaps(&other.versions) {
            return Err(self.unsatisfiable(
                "version",
                &self.versions.to_string(),
                &other.versions.to_string(),
            ));
        }
        let narrowed = self.versions.intersection(&other.versions);
        if narrowed.is_empty() {
            return Err(self.unsatisfiable(
                "version",
                &self.versions.to_string(),
                &other.versions.to_string(),
            ));
        }
        let mut changed = narrowed != self.versions;
        self.versions = narrowed;

        changed |= self.constrain_attributes(other)?;
        Ok(changed)
    }

    /// [`Spec::constrain`] without the name and version checks.
    pub fn constrain_attributes(&mut self, other: &Spec) -> KonkretResult<bool> {
        let name = self.name.clone();
        let mut changed = false;

        match (&mut self.compiler, &other.compiler) {
            (Some(ours), Some(theirs)) => {
                changed |= ours.constrain(theirs).map_err(|e| with_package(&name, e))?;
            }
            (None, Some(theirs)) => {
                self.compiler = Some(theirs.clone());
                changed = true;
            }
            _ => {}
        }

        changed |= self
            .architecture
            .constrain(&other.architecture)
            .map_err(|e| with_package(&name, e))?;

        for (k, v) in &other.variants {
            match self.variants.get(k) {
                Some(ours) if ours != v => {
                    return Err(self.unsatisfiable(
                        "variant",
                        &format!("{k}={ours}"),
                        &format!("{k}={v}"),
                    ));
                }
                Some(_) => {}
                None => {
                    self.variants.insert(k.clone(), v.clone());
                    changed = true;
                }
            }
        }

        changed |= self.compiler_flags.union(&other.compiler_flags);

        if self.external.is_none() && other.external.is_some() {
            self.external = other.external.clone();
            changed = true;
        }
        Ok(changed)
    }

    /// Copy over whatever `other` sets that this node leaves open. Never
    /// fails; fields set on both sides keep this node's value.
    pub fn inherit_missing(&mut self, other: &Spec) {
        if self.compiler.is_none() {
            self.compiler = other.compiler.clone();
        }
        for field in ArchField::ALL {
            if self.architecture.get(field).is_none() {
                self.architecture.set(field, other.architecture.get(field).cloned());
            }
        }
        for (k, v) in &other.variants {
            self.variants.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (kind, tokens) in other.compiler_flags.iter() {
            if !self.compiler_flags.contains(kind) {
                self.compiler_flags.extend(kind, tokens);
            }
        }
    }

    fn unsatisfiable(&self, kind: &str, provided: &str, required: &str) -> KonkretError {
        KonkretError::Unsatisfiable {
            package: self.name.clone(),
            kind: kind.to_string(),
            provided: provided.to_string(),
            required: required.to_string(),
        }
    }
}

fn with_package(name: &str, err: KonkretError) -> KonkretError {
    match err {
        KonkretError::Unsatisfiable {
            kind,
            provided,
            required,
            ..
        } => KonkretError::Unsatisfiable {
            package: name.to_string(),
            kind,
            provided,
            required,
        },
        other => other,
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.versions.is_any() {
            write!(f, "@{}", self.versions)?;
        }
        if let Some(compiler) = &self.compiler {
            write!(f, "%{compiler}")?;
        }
        f.write_str(&variant::format_toggles(&self.variants))?;
        for word in variant::format_values(&self.variants) {
            write!(f, " {word}")?;
        }
        let flags = self.compiler_flags.to_string();
        if !flags.is_empty() {
            write!(f, " {flags}")?;
        }
        if !self.architecture.is_unset() {
            write!(f, " arch={}", self.architecture)?;
        }
        Ok(())
    }
}

impl FromStr for Spec {
    type Err = KonkretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Spec::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(input: &str) -> Spec {
        Spec::parse(input).unwrap()
    }

    #[test]
    fn test_deptypes_set_operations() {
        let bl = DepTypes::BUILD | DepTypes::LINK;
        assert!(bl.contains(DepTypes::LINK));
        assert!(!bl.contains(DepTypes::RUN));
        assert!(bl.intersects(DepTypes::ALL));
        assert_eq!(bl.to_string(), "build, link");
    }

    #[test]
    fn test_constrain_narrows_versions() {
        let mut spec = s("zlib@1.0:2.0");
        assert!(spec.constrain(&s("zlib@1.5:")).unwrap());
        assert_eq!(spec.versions.to_string(), "1.5:2.0");
        assert!(!spec.constrain(&s("zlib@1.5:")).unwrap());
    }

    #[test]
    fn test_constrain_rejects_disjoint_versions() {
        let mut spec = s("zlib@1.0:1.2");
        let err = spec.constrain(&s("zlib@2.0:")).unwrap_err();
        assert!(matches!(err, KonkretError::Unsatisfiable { ref kind, .. } if kind == "version"));
    }

    #[test]
    fn test_constrain_merges_attributes() {
        let mut spec = s("mpich+debug");
        let changed = spec
            .constrain(&s("mpich%gcc@9.1.0 fabric=ofi arch=linux-None-None"))
            .unwrap();
        assert!(changed);
        assert_eq!(spec.compiler.as_ref().unwrap().to_string(), "gcc@9.1.0");
        assert_eq!(spec.variants.len(), 2);
        assert_eq!(spec.architecture.named(ArchField::Platform), Some("linux"));
    }

    #[test]
    fn test_constrain_variant_conflict() {
        let mut spec = s("mpich+debug");
        assert!(spec.constrain(&s("mpich~debug")).is_err());
    }

    #[test]
    fn test_constrain_compiler_conflict_names_package() {
        let mut spec = s("mpich%gcc");
        let err = spec.constrain(&s("mpich%clang")).unwrap_err();
        assert!(matches!(err, KonkretError::Unsatisfiable { ref package, .. } if package == "mpich"));
    }

    #[test]
    fn test_satisfies() {
        let concrete = s("mpich@3.2%gcc@9.1.0+debug arch=linux-ubuntu22-x86_64");
        assert!(concrete.satisfies(&s("mpich")));
        assert!(concrete.satisfies(&s("mpich@3:%gcc+debug")));
        assert!(!concrete.satisfies(&s("mpich~debug")));
        assert!(!concrete.satisfies(&s("mpich@4:")));
        assert!(!concrete.satisfies(&s("openmpi")));
    }

    #[test]
    fn test_inherit_missing_keeps_own_values() {
        let mut spec = s("openmpi@1.10%gcc@4.9.2");
        spec.inherit_missing(&s("openmpi%clang+debug arch=linux-ubuntu22-x86_64"));
        assert_eq!(spec.compiler.as_ref().unwrap().name, "gcc");
        assert!(spec.variants.contains_key("debug"));
        assert!(spec.architecture.is_concrete());
    }

    #[test]
    fn test_unresolved_fields_on_fresh_spec() {
        let spec = Spec::new("zlib");
        assert_eq!(
            spec.unresolved_fields(None),
            vec!["version", "architecture", "compiler", "compiler_flags"]
        );
    }
}
