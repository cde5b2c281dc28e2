//! Per-attribute resolvers.
//!
//! Each resolver looks at one node of the DAG and either fills in one
//! attribute, leaves it alone, or defers because something it depends on is
//! still open. The session in [`crate::session`] drives them to a fixpoint.

use std::cmp::Ordering;

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use konkret_core::compilers::CompilerRegistry;
use konkret_core::config::Preferences;
use konkret_core::package::{PackageDef, PackageRepository};
use konkret_core::spec::{ArchField, ArchSpec, CompilerSpec, DepTypes, FlagKind};
use konkret_core::version::{Version, VersionList};
use konkret_util::errors::{KonkretError, KonkretResult};

use crate::abi::{AbiCompatibility, DefaultAbi};
use crate::graph::SpecGraph;

static DEFAULT_ABI: DefaultAbi = DefaultAbi;

/// Outcome of one resolver on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Unchanged,
    Changed,
    /// Waiting on another attribute; counts as no progress.
    Deferred,
}

impl Step {
    fn from_changed(changed: bool) -> Self {
        if changed {
            Step::Changed
        } else {
            Step::Unchanged
        }
    }
}

/// The policy object that picks concrete values for open attributes.
pub struct Concretizer<'a> {
    pub(crate) repo: &'a dyn PackageRepository,
    pub(crate) compilers: &'a CompilerRegistry,
    pub(crate) prefs: &'a Preferences,
    pub(crate) system_arch: ArchSpec,
    pub(crate) abi: &'a dyn AbiCompatibility,
}

impl<'a> Concretizer<'a> {
    /// `system_arch` is the host default and must be fully named.
    pub fn new(
        repo: &'a dyn PackageRepository,
        compilers: &'a CompilerRegistry,
        prefs: &'a Preferences,
        system_arch: ArchSpec,
    ) -> KonkretResult<Self> {
        if !system_arch.is_concrete() {
            return Err(KonkretError::Config {
                message: format!(
                    "default architecture '{system_arch}' must name platform, os and target"
                ),
            });
        }
        Ok(Self {
            repo,
            compilers,
            prefs,
            system_arch,
            abi: &DEFAULT_ABI,
        })
    }

    pub fn with_abi(mut self, abi: &'a dyn AbiCompatibility) -> Self {
        self.abi = abi;
        self
    }

    pub fn system_arch(&self) -> &ArchSpec {
        &self.system_arch
    }

    pub(crate) fn package(&self, name: &str) -> KonkretResult<&'a PackageDef> {
        self.repo.get(name).ok_or_else(|| KonkretError::UnknownPackage {
            name: name.to_string(),
        })
    }

    /// Pick the most preferred known version that satisfies the constraint.
    ///
    /// Ranking, highest first: position in the version preferences, the
    /// package's preferred flag, not being `develop`, then the version
    /// itself. A package that declares no versions falls back to the upper
    /// end of its last constraint item, or the lower end when open above.
    pub fn concretize_version(&self, graph: &mut SpecGraph, idx: NodeIndex) -> KonkretResult<Step> {
        let spec = graph.spec(idx);
        if spec.versions.concrete().is_some() {
            return Ok(Step::Unchanged);
        }
        let package = self.package(&spec.name)?;
        let no_valid = || KonkretError::NoValidVersion {
            package: spec.name.clone(),
            versions: spec.versions.to_string(),
        };

        let chosen: Version = if package.versions.is_empty() {
            if spec.versions.is_empty() || spec.versions.is_any() {
                return Err(no_valid());
            }
            let last = spec.versions.items().last().ok_or_else(no_valid)?;
            last.highest()
                .or_else(|| last.lowest())
                .cloned()
                .ok_or_else(no_valid)?
        } else {
            package
                .versions
                .iter()
                .filter(|d| spec.versions.is_satisfied_by(&d.version))
                .max_by_key(|d| self.version_rank(&spec.name, &d.version, d.preferred))
                .map(|d| d.version.clone())
                .ok_or_else(no_valid)?
        };

        tracing::debug!("{}: choosing version {chosen}", spec.name);
        graph.spec_mut(idx).versions = VersionList::from(chosen);
        Ok(Step::Changed)
    }

    /// Sort key for a candidate version of `package`; larger is better.
    pub(crate) fn version_rank<'v>(
        &self,
        package: &str,
        version: &'v Version,
        preferred: bool,
    ) -> (i64, bool, bool, &'v Version) {
        let order = self.prefs.version_order(package);
        let score = order
            .iter()
            .position(|p| p.is_satisfied_by(version))
            .map_or(-1, |i| (order.len() - i) as i64);
        (score, preferred, !version.is_develop(), version)
    }

    /// Fill open architecture fields from the root, then the system default.
    pub fn concretize_architecture(&self, graph: &mut SpecGraph, idx: NodeIndex) -> KonkretResult<Step> {
        let root_arch = graph.spec(graph.root()).architecture.clone();
        let arch = &mut graph.spec_mut(idx).architecture;

        if arch.is_unset() {
            *arch = self.system_arch.clone();
            return Ok(Step::Changed);
        }

        let mut changed = false;
        for field in ArchField::ALL {
            match arch.get(field).map(|v| v.name().is_some()) {
                None => {
                    let from_root = root_arch.named(field).map(|_| root_arch.get(field));
                    let value = from_root
                        .flatten()
                        .or_else(|| self.system_arch.get(field))
                        .cloned();
                    arch.set(field, value);
                    changed = true;
                }
                Some(false) => {
                    arch.set(field, self.system_arch.get(field).cloned());
                    changed = true;
                }
                Some(true) => {}
            }
        }
        Ok(Step::from_changed(changed))
    }

    /// Give every declared variant a value: the user preference when the
    /// package declares that variant, otherwise the declared default.
    pub fn concretize_variants(&self, graph: &mut SpecGraph, idx: NodeIndex) -> KonkretResult<Step> {
        let name = graph.spec(idx).name.clone();
        let package = self.package(&name)?;
        let preferred = self.prefs.preferred_variants(&name);
        let spec = graph.spec_mut(idx);

        let mut changed = false;
        for (variant, decl) in &package.variants {
            if spec.variants.contains_key(variant) {
                continue;
            }
            let value = preferred
                .get(variant)
                .cloned()
                .unwrap_or_else(|| decl.default.clone());
            spec.variants.insert(variant.clone(), value);
            changed = true;
        }
        if changed {
            for variant in preferred.keys().filter(|v| !package.declares_variant(v)) {
                tracing::warn!("{name}: ignoring preferred variant '{variant}' the package does not declare");
            }
        }
        Ok(Step::from_changed(changed))
    }

    /// Choose a registered compiler that can build for the node's
    /// architecture.
    pub fn concretize_compiler(&self, graph: &mut SpecGraph, idx: NodeIndex) -> KonkretResult<Step> {
        let spec = graph.spec(idx);
        let arch = spec.architecture.clone();
        if arch.named(ArchField::Os).is_none() || arch.named(ArchField::Target).is_none() {
            return Ok(Step::Deferred);
        }
        if self.compilers.is_empty() {
            return Err(KonkretError::NoCompilers);
        }

        if let Some(compiler) = &spec.compiler {
            if self.compilers.is_registered(compiler) {
                if self.compilers.compilers_for_spec(compiler, &arch).is_empty() {
                    return Err(self.compiler_failure(compiler, &arch));
                }
                return Ok(Step::Unchanged);
            }
        }

        let other = if spec.compiler.is_some() {
            idx
        } else {
            graph
                .find_spec(idx, |x| x.compiler.is_some())
                .unwrap_or(graph.root())
        };
        let other_spec = graph.spec(other);
        let other_name = other_spec.name.clone();
        let other_compiler = other_spec.compiler.clone();

        if let Some(compiler) = &other_compiler {
            if self.compilers.is_registered(compiler) {
                if self.compilers.compilers_for_spec(compiler, &arch).is_empty() {
                    return Err(self.compiler_failure(compiler, &arch));
                }
                tracing::debug!("{}: copying compiler {compiler} from {other_name}", spec.name);
                graph.spec_mut(idx).compiler = Some(compiler.clone());
                return Ok(Step::Changed);
            }
        }

        let constraint = other_compiler.clone().unwrap_or_else(|| CompilerSpec::new("*"));
        let mut matches = match &other_compiler {
            Some(compiler) => self.compilers.find(compiler),
            None => self.compilers.all_specs(),
        };
        if matches.is_empty() {
            return Err(KonkretError::UnavailableCompilerVersion {
                compiler: constraint.to_string(),
                arch: None,
            });
        }

        matches.sort_by(|a, b| self.compare_compilers(&other_name, a, b));
        let Some(chosen) = matches
            .into_iter()
            .find(|c| !self.compilers.compilers_for_spec(c, &arch).is_empty())
        else {
            return Err(self.compiler_failure(&constraint, &arch));
        };

        tracing::debug!("{}: choosing compiler {chosen}", spec.name);
        graph.spec_mut(idx).compiler = Some(chosen);
        Ok(Step::Changed)
    }

    fn compiler_failure(&self, compiler: &CompilerSpec, arch: &ArchSpec) -> KonkretError {
        let os = arch.named(ArchField::Os).unwrap_or_default().to_string();
        let target = arch.named(ArchField::Target).unwrap_or_default().to_string();
        if self.compilers.compilers_for_arch(arch).is_empty() {
            KonkretError::NoCompilersForArch {
                os,
                target,
                available: self.compilers.available_arches(),
            }
        } else {
            KonkretError::UnavailableCompilerVersion {
                compiler: compiler.to_string(),
                arch: Some((os, target)),
            }
        }
    }

    /// Order compilers by the package's compiler preferences. Within one
    /// preference entry, and among unlisted compilers after sorting by name,
    /// newer versions come first.
    pub(crate) fn compare_compilers(&self, package: &str, a: &CompilerSpec, b: &CompilerSpec) -> Ordering {
        let order = self.prefs.compiler_order(package);
        let rank = |c: &CompilerSpec| {
            order.iter().position(|p| c.satisfies(p, false))
        };
        match (rank(a), rank(b)) {
            (Some(i), Some(j)) if i != j => i.cmp(&j),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), Some(_)) => b
                .versions
                .cmp(&a.versions)
                .then_with(|| a.name.cmp(&b.name)),
            (None, None) => a
                .name
                .cmp(&b.name)
                .then_with(|| b.versions.cmp(&a.versions)),
        }
    }

    /// Resolve every flag category: inherited from the nearest dependent
    /// built with the same compiler and architecture, then extended with
    /// the compiler's configured defaults.
    pub fn concretize_compiler_flags(&self, graph: &mut SpecGraph, idx: NodeIndex) -> KonkretResult<Step> {
        let spec = graph.spec(idx);
        let arch = spec.architecture.clone();
        if arch.named(ArchField::Os).is_none() || arch.named(ArchField::Target).is_none() {
            return Ok(Step::Deferred);
        }
        let Some(compiler) = spec.compiler.clone().filter(CompilerSpec::is_concrete) else {
            return Ok(Step::Deferred);
        };

        let parents = graph.traverse(idx, Direction::Incoming, DepTypes::ALL, false);
        let inherited: Vec<(FlagKind, Vec<String>)> = FlagKind::ALL
            .into_iter()
            .filter_map(|kind| {
                parents.iter().find_map(|p| {
                    let parent = graph.spec(*p);
                    let same_build = parent.compiler.as_ref() == Some(&compiler)
                        && parent.architecture == arch;
                    if !same_build {
                        return None;
                    }
                    parent
                        .compiler_flags
                        .get(kind)
                        .map(|tokens| (kind, tokens.to_vec()))
                })
            })
            .collect();
        let defaults = self
            .compilers
            .compiler_for_spec(&compiler, &arch)
            .map(|entry| entry.flags.clone());

        let flags = &mut graph.spec_mut(idx).compiler_flags;
        let mut changed = false;
        for kind in FlagKind::ALL {
            flags.ensure(kind);
        }
        for (kind, tokens) in &inherited {
            changed |= flags.extend(*kind, tokens);
        }
        if let Some(defaults) = &defaults {
            for (kind, tokens) in defaults.iter() {
                changed |= flags.extend(kind, tokens);
            }
        }
        Ok(Step::from_changed(changed))
    }
}
