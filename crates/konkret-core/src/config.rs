//! User preferences (`packages.toml`).
//!
//! Each table is keyed by package name; the `all` table applies to every
//! package without its own entry for a setting.
//!
//! ```toml
//! [all]
//! compiler = ["gcc@9", "clang"]
//! providers = { mpi = ["mpich", "openmpi"] }
//!
//! [zlib]
//! version = ["1.2.11", "1.2:"]
//! variants = "+shared ~pic"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use konkret_util::errors::{KonkretError, KonkretResult};

use crate::spec::{CompilerSpec, Spec, VariantMap};
use crate::version::VersionList;

/// Table applied to every package.
pub const ALL_PACKAGES: &str = "all";

/// Parsed preferences for one package (or for `all`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackagePreferences {
    pub versions: Vec<VersionList>,
    pub compilers: Vec<CompilerSpec>,
    pub providers: BTreeMap<String, Vec<Spec>>,
    pub variants: VariantMap,
}

#[derive(Debug, Clone, Default)]
pub struct Preferences {
    packages: BTreeMap<String, PackagePreferences>,
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, package: impl Into<String>, prefs: PackagePreferences) {
        self.packages.insert(package.into(), prefs);
    }

    pub fn from_path(path: &Path) -> KonkretResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> KonkretResult<Self> {
        let raw: BTreeMap<String, RawPreferences> =
            toml::from_str(content).map_err(|e| KonkretError::Config {
                message: format!("Failed to parse preferences: {e}"),
            })?;

        let mut prefs = Preferences::new();
        for (package, raw) in raw {
            let parsed = raw.parse(&package).map_err(|e| KonkretError::Config {
                message: format!("preferences for '{package}': {e}"),
            })?;
            prefs.insert(package, parsed);
        }
        Ok(prefs)
    }

    /// The package's own setting when non-empty, otherwise the `all` one.
    fn lookup<'a, T: 'a>(
        &'a self,
        package: &str,
        pick: impl Fn(&'a PackagePreferences) -> &'a [T],
    ) -> &'a [T] {
        if let Some(own) = self.packages.get(package).map(&pick) {
            if !own.is_empty() {
                return own;
            }
        }
        self.packages
            .get(ALL_PACKAGES)
            .map(pick)
            .unwrap_or_default()
    }

    /// Preferred version constraints for `package`, most preferred first.
    pub fn version_order(&self, package: &str) -> &[VersionList] {
        self.lookup(package, |p| p.versions.as_slice())
    }

    pub fn compiler_order(&self, package: &str) -> &[CompilerSpec] {
        self.lookup(package, |p| p.compilers.as_slice())
    }

    /// Preferred providers of `virtual_name` as seen from `package`.
    pub fn provider_order(&self, package: &str, virtual_name: &str) -> &[Spec] {
        self.lookup(package, |p| {
            p.providers
                .get(virtual_name)
                .map(Vec::as_slice)
                .unwrap_or_default()
        })
    }

    /// Whether `package` itself (not `all`) orders providers of the virtual.
    pub fn has_provider_preference(&self, package: &str, virtual_name: &str) -> bool {
        self.packages
            .get(package)
            .and_then(|p| p.providers.get(virtual_name))
            .is_some_and(|list| !list.is_empty())
    }

    pub fn preferred_variants(&self, package: &str) -> &VariantMap {
        static EMPTY: VariantMap = VariantMap::new();
        match self.packages.get(package) {
            Some(own) if !own.variants.is_empty() => &own.variants,
            _ => self
                .packages
                .get(ALL_PACKAGES)
                .map(|p| &p.variants)
                .unwrap_or(&EMPTY),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPreferences {
    #[serde(default)]
    version: Vec<String>,
    #[serde(default)]
    compiler: Vec<String>,
    #[serde(default)]
    providers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    variants: Option<RawVariants>,
}

/// `"+debug ~shared"` or `["+debug", "fabric=ofi"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVariants {
    One(String),
    Many(Vec<String>),
}

impl RawPreferences {
    fn parse(self, package: &str) -> KonkretResult<PackagePreferences> {
        let versions = self
            .version
            .iter()
            .map(|v| v.parse::<VersionList>())
            .collect::<KonkretResult<Vec<_>>>()?;
        let compilers = self
            .compiler
            .iter()
            .map(|c| c.parse::<CompilerSpec>())
            .collect::<KonkretResult<Vec<_>>>()?;
        let mut providers = BTreeMap::new();
        for (virtual_name, list) in self.providers {
            let specs = list
                .iter()
                .map(|s| Spec::parse(s))
                .collect::<KonkretResult<Vec<_>>>()?;
            providers.insert(virtual_name, specs);
        }
        let variants = match self.variants {
            None => VariantMap::new(),
            Some(raw) => {
                let words = match raw {
                    RawVariants::One(s) => s,
                    RawVariants::Many(list) => list.join(" "),
                };
                Spec::parse(&format!("{package} {words}"))?.variants
            }
        };
        Ok(PackagePreferences {
            versions,
            compilers,
            providers,
            variants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::VariantValue;

    const PREFS: &str = r#"
[all]
compiler = ["gcc@9", "clang"]
providers = { mpi = ["mpich", "openmpi"] }
variants = "+shared"

[zlib]
version = ["1.2.11", "1.2:"]
variants = ["~shared", "pic=auto"]

[hdf5]
providers = { mpi = ["openmpi"] }
"#;

    #[test]
    fn test_package_table_overrides_all() {
        let prefs = Preferences::from_toml_str(PREFS).unwrap();
        assert_eq!(prefs.version_order("zlib").len(), 2);
        assert!(prefs.version_order("hdf5").is_empty());
        assert_eq!(prefs.compiler_order("zlib").len(), 2);
        assert_eq!(prefs.compiler_order("zlib")[0].to_string(), "gcc@9");
    }

    #[test]
    fn test_provider_order() {
        let prefs = Preferences::from_toml_str(PREFS).unwrap();
        assert_eq!(prefs.provider_order("hdf5", "mpi")[0].name, "openmpi");
        assert_eq!(prefs.provider_order("zlib", "mpi")[0].name, "mpich");
        assert!(prefs.has_provider_preference("hdf5", "mpi"));
        assert!(!prefs.has_provider_preference("zlib", "mpi"));
        assert!(prefs.provider_order("zlib", "blas").is_empty());
    }

    #[test]
    fn test_variant_preferences() {
        let prefs = Preferences::from_toml_str(PREFS).unwrap();
        let zlib = prefs.preferred_variants("zlib");
        assert_eq!(zlib.get("shared"), Some(&VariantValue::Bool(false)));
        assert_eq!(zlib.get("pic"), Some(&VariantValue::Value("auto".into())));
        let other = prefs.preferred_variants("hdf5");
        assert_eq!(other.get("shared"), Some(&VariantValue::Bool(true)));
    }

    #[test]
    fn test_bad_entries_are_config_errors() {
        assert!(Preferences::from_toml_str("[zlib]\nversion = [\"1.2+\"]\n").is_err());
        assert!(Preferences::from_toml_str("[zlib]\nunknown = 1\n").is_err());
    }
}
