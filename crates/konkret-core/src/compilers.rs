//! The compiler registry.
//!
//! Loaded from a TOML file with one `[[compiler]]` entry per installed
//! compiler:
//!
//! ```toml
//! [[compiler]]
//! spec = "gcc@9.1.0"
//! operating-system = "ubuntu22"
//! target = "x86_64"
//! flags = { cflags = "-O2" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use konkret_util::errors::{KonkretError, KonkretResult};

use crate::spec::{ArchField, ArchSpec, CompilerSpec, FlagKind, FlagMap};

/// One installed compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerEntry {
    /// Always concrete.
    pub spec: CompilerSpec,
    pub operating_system: String,
    /// `None` when the compiler targets any microarchitecture of its OS.
    pub target: Option<String>,
    pub flags: FlagMap,
}

impl CompilerEntry {
    /// Whether this entry can build for `arch`'s operating system and target.
    pub fn supports(&self, arch: &ArchSpec) -> bool {
        let os_ok = arch.named(ArchField::Os) == Some(self.operating_system.as_str());
        let target_ok = match (&self.target, arch.named(ArchField::Target)) {
            (None, _) => true,
            (Some(ours), Some(theirs)) => ours == theirs,
            (Some(_), None) => false,
        };
        os_ok && target_ok
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompilerRegistry {
    entries: Vec<CompilerEntry>,
}

impl CompilerRegistry {
    pub fn new(entries: Vec<CompilerEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CompilerEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_path(path: &Path) -> KonkretResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> KonkretResult<Self> {
        let file: CompilersFile = toml::from_str(content).map_err(|e| KonkretError::Config {
            message: format!("Failed to parse compiler registry: {e}"),
        })?;

        let mut entries = Vec::with_capacity(file.compiler.len());
        for raw in file.compiler {
            if !raw.spec.is_concrete() {
                return Err(KonkretError::Config {
                    message: format!("compiler '{}' must name a single version", raw.spec),
                });
            }
            let mut flags = FlagMap::new();
            for (key, value) in &raw.flags {
                let kind: FlagKind = key.parse().map_err(|_| KonkretError::Config {
                    message: format!("compiler '{}': unknown flag category '{key}'", raw.spec),
                })?;
                flags.set_from_str(kind, value);
            }
            entries.push(CompilerEntry {
                spec: raw.spec,
                operating_system: raw.operating_system,
                target: raw.target,
                flags,
            });
        }
        tracing::debug!("Loaded {} compilers", entries.len());
        Ok(Self { entries })
    }

    /// Distinct registered compiler specs, sorted by name then version.
    pub fn all_specs(&self) -> Vec<CompilerSpec> {
        let mut specs: Vec<CompilerSpec> = Vec::new();
        for entry in &self.entries {
            if !specs.contains(&entry.spec) {
                specs.push(entry.spec.clone());
            }
        }
        specs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.versions.cmp(&b.versions)));
        specs
    }

    /// A concrete spec that names exactly one registered compiler.
    pub fn is_registered(&self, cspec: &CompilerSpec) -> bool {
        cspec.is_concrete() && self.entries.iter().any(|e| e.spec == *cspec)
    }

    /// Registered specs that satisfy `cspec`.
    pub fn find(&self, cspec: &CompilerSpec) -> Vec<CompilerSpec> {
        self.all_specs()
            .into_iter()
            .filter(|s| s.satisfies(cspec, false))
            .collect()
    }

    /// Entries matching `cspec` that can build for `arch`.
    pub fn compilers_for_spec(&self, cspec: &CompilerSpec, arch: &ArchSpec) -> Vec<&CompilerEntry> {
        self.entries
            .iter()
            .filter(|e| e.spec.satisfies(cspec, false) && e.supports(arch))
            .collect()
    }

    pub fn compiler_for_spec(&self, cspec: &CompilerSpec, arch: &ArchSpec) -> Option<&CompilerEntry> {
        self.compilers_for_spec(cspec, arch).into_iter().next()
    }

    pub fn compilers_for_arch(&self, arch: &ArchSpec) -> Vec<&CompilerEntry> {
        self.entries.iter().filter(|e| e.supports(arch)).collect()
    }

    /// The distinct `os-target` pairs that have compilers, for diagnostics.
    pub fn available_arches(&self) -> String {
        let mut pairs: Vec<String> = self
            .entries
            .iter()
            .map(|e| match &e.target {
                Some(t) => format!("{}-{t}", e.operating_system),
                None => e.operating_system.clone(),
            })
            .collect();
        pairs.sort();
        pairs.dedup();
        pairs.join("\n\t")
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompilersFile {
    #[serde(default)]
    compiler: Vec<RawCompiler>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawCompiler {
    spec: CompilerSpec,
    operating_system: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    flags: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPILERS: &str = r#"
[[compiler]]
spec = "gcc@9.1.0"
operating-system = "ubuntu22"
target = "x86_64"
flags = { cflags = "-O2 -g" }

[[compiler]]
spec = "gcc@4.9.2"
operating-system = "ubuntu22"

[[compiler]]
spec = "clang@15.0.0"
operating-system = "centos7"
"#;

    fn arch(s: &str) -> ArchSpec {
        s.parse().unwrap()
    }

    #[test]
    fn test_load_registry() {
        let reg = CompilerRegistry::from_toml_str(COMPILERS).unwrap();
        assert_eq!(reg.entries().len(), 3);
        assert_eq!(
            reg.entries()[0].flags.get(FlagKind::Cflags).unwrap(),
            &["-O2", "-g"]
        );
        let names: Vec<String> = reg.all_specs().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["clang@15.0.0", "gcc@4.9.2", "gcc@9.1.0"]);
    }

    #[test]
    fn test_non_concrete_entry_is_rejected() {
        let content = "[[compiler]]\nspec = \"gcc@9:\"\noperating-system = \"ubuntu22\"\n";
        assert!(CompilerRegistry::from_toml_str(content).is_err());
    }

    #[test]
    fn test_find_and_registered() {
        let reg = CompilerRegistry::from_toml_str(COMPILERS).unwrap();
        assert_eq!(reg.find(&"gcc".parse().unwrap()).len(), 2);
        assert_eq!(reg.find(&"gcc@9".parse().unwrap()).len(), 1);
        assert!(reg.is_registered(&"gcc@9.1.0".parse().unwrap()));
        assert!(!reg.is_registered(&"gcc@9".parse().unwrap()));
    }

    #[test]
    fn test_compilers_for_arch() {
        let reg = CompilerRegistry::from_toml_str(COMPILERS).unwrap();
        assert_eq!(reg.compilers_for_arch(&arch("linux-ubuntu22-x86_64")).len(), 2);
        assert_eq!(reg.compilers_for_arch(&arch("linux-ubuntu22-aarch64")).len(), 1);
        assert!(reg.compilers_for_arch(&arch("linux-rhel9-x86_64")).is_empty());
        assert!(reg
            .compiler_for_spec(&"clang".parse().unwrap(), &arch("linux-ubuntu22-x86_64"))
            .is_none());
    }
}
