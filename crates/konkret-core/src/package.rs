//! Package definitions and the repository that serves them.
//!
//! A repository file is TOML with one `[package.<name>]` table per package:
//!
//! ```toml
//! [package.mpich]
//! versions = ["3.0.4", { version = "3.2", preferred = true }]
//! variants = { debug = false, fabric = { default = "ofi", description = "network fabric" } }
//! dependencies = { hwloc = "@1.9:", cmake = { spec = "", type = ["build"] } }
//! provides = { mpi = "3" }
//! buildable = true
//! externals = { "mpich@3.2%gcc@9.1.0 arch=linux-ubuntu22-x86_64" = "/opt/mpich" }
//! ```
//!
//! Dependency values are constraints written without the package name.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use konkret_util::errors::{KonkretError, KonkretResult};

use crate::spec::{DepTypes, Spec, VariantValue};
use crate::version::{Version, VersionList};

/// A version a package knows how to build.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredVersion {
    pub version: Version,
    pub preferred: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantDecl {
    pub default: VariantValue,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DependencyDecl {
    pub spec: Spec,
    pub deptypes: DepTypes,
}

/// A pre-installed build of the package.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDecl {
    pub spec: Spec,
    pub prefix: String,
}

/// Everything the concretizer needs to know about one package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDef {
    pub name: String,
    pub versions: Vec<DeclaredVersion>,
    pub variants: BTreeMap<String, VariantDecl>,
    pub dependencies: Vec<DependencyDecl>,
    /// Virtual name to the versions of this package that provide it.
    pub provides: BTreeMap<String, VersionList>,
    pub buildable: bool,
    pub externals: Vec<ExternalDecl>,
}

impl PackageDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: Vec::new(),
            variants: BTreeMap::new(),
            dependencies: Vec::new(),
            provides: BTreeMap::new(),
            buildable: true,
            externals: Vec::new(),
        }
    }

    pub fn declares_variant(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    pub fn provides(&self, virtual_name: &str) -> bool {
        self.provides.contains_key(virtual_name)
    }
}

/// Read-only access to package definitions.
pub trait PackageRepository {
    fn get(&self, name: &str) -> Option<&PackageDef>;

    fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// A name is virtual when no package defines it but some package
    /// provides it.
    fn is_virtual(&self, name: &str) -> bool;

    /// Provider specs for a virtual, each constrained to the provider
    /// versions that supply it, in a stable order.
    fn providers_for(&self, virtual_name: &str) -> Vec<Spec>;
}

/// A repository held in memory, usually loaded from a TOML file.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    packages: BTreeMap<String, PackageDef>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, package: PackageDef) {
        self.packages.insert(package.name.clone(), package);
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn from_path(path: &Path) -> KonkretResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> KonkretResult<Self> {
        let file: RepositoryFile = toml::from_str(content).map_err(|e| KonkretError::Config {
            message: format!("Failed to parse repository: {e}"),
        })?;

        let mut repo = Repository::new();
        for (name, raw) in file.package {
            repo.insert(raw.into_package(&name)?);
        }
        tracing::debug!("Loaded {} package definitions", repo.len());
        Ok(repo)
    }
}

impl PackageRepository for Repository {
    fn get(&self, name: &str) -> Option<&PackageDef> {
        self.packages.get(name)
    }

    fn is_virtual(&self, name: &str) -> bool {
        !self.packages.contains_key(name) && self.packages.values().any(|p| p.provides(name))
    }

    fn providers_for(&self, virtual_name: &str) -> Vec<Spec> {
        self.packages
            .values()
            .filter_map(|p| {
                p.provides.get(virtual_name).map(|versions| {
                    let mut spec = Spec::new(p.name.clone());
                    spec.versions = versions.clone();
                    spec
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepositoryFile {
    #[serde(default)]
    package: BTreeMap<String, RawPackage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    #[serde(default)]
    versions: Vec<RawVersion>,
    #[serde(default)]
    variants: BTreeMap<String, RawVariant>,
    #[serde(default)]
    dependencies: BTreeMap<String, RawDependency>,
    #[serde(default)]
    provides: BTreeMap<String, VersionList>,
    #[serde(default = "default_true")]
    buildable: bool,
    #[serde(default)]
    externals: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

/// `"1.2"` or `{ version = "1.2", preferred = true }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Short(Version),
    Detailed {
        version: Version,
        #[serde(default)]
        preferred: bool,
    },
}

/// `true`, `"ofi"` or `{ default = "ofi", description = "..." }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVariant {
    Short(VariantValue),
    Detailed {
        default: VariantValue,
        #[serde(default)]
        description: String,
    },
}

/// `"@1.9:"` or `{ spec = "@1.9:", type = ["build", "link"] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Short(String),
    Detailed {
        #[serde(default)]
        spec: String,
        #[serde(rename = "type")]
        deptypes: Option<DepTypes>,
    },
}

impl RawPackage {
    fn into_package(self, name: &str) -> KonkretResult<PackageDef> {
        let config_err = |message: String| KonkretError::Config {
            message: format!("package '{name}': {message}"),
        };

        let mut package = PackageDef::new(name);
        package.buildable = self.buildable;
        package.provides = self.provides;

        package.versions = self
            .versions
            .into_iter()
            .map(|raw| match raw {
                RawVersion::Short(version) => DeclaredVersion {
                    version,
                    preferred: false,
                },
                RawVersion::Detailed { version, preferred } => {
                    DeclaredVersion { version, preferred }
                }
            })
            .collect();

        package.variants = self
            .variants
            .into_iter()
            .map(|(vname, raw)| {
                let decl = match raw {
                    RawVariant::Short(default) => VariantDecl {
                        default,
                        description: String::new(),
                    },
                    RawVariant::Detailed {
                        default,
                        description,
                    } => VariantDecl {
                        default,
                        description,
                    },
                };
                (vname, decl)
            })
            .collect();

        for (dep_name, raw) in self.dependencies {
            let (constraint, deptypes) = match raw {
                RawDependency::Short(c) => (c, None),
                RawDependency::Detailed { spec, deptypes } => (spec, deptypes),
            };
            let spec = Spec::parse(&format!("{dep_name}{constraint}"))
                .map_err(|e| config_err(e.to_string()))?;
            if spec.name != dep_name {
                return Err(config_err(format!(
                    "dependency '{dep_name}' constraint names another package"
                )));
            }
            let deptypes = deptypes.unwrap_or(DepTypes::BUILD | DepTypes::LINK);
            if deptypes.is_empty() {
                return Err(config_err(format!("dependency '{dep_name}' has no type")));
            }
            package.dependencies.push(DependencyDecl { spec, deptypes });
        }

        for (spec_str, prefix) in self.externals {
            let mut spec = Spec::parse(&spec_str).map_err(|e| config_err(e.to_string()))?;
            if spec.name != name {
                return Err(config_err(format!(
                    "external '{spec_str}' is not a build of this package"
                )));
            }
            spec.external = Some(prefix.clone());
            package.externals.push(ExternalDecl { spec, prefix });
        }

        Ok(package)
    }
}
