use std::fs;

use tempfile::TempDir;

use konkret_core::compilers::CompilerRegistry;
use konkret_core::config::Preferences;
use konkret_core::package::{PackageRepository, Repository};
use konkret_core::spec::{ArchSpec, DepTypes};
use konkret_util::errors::KonkretError;

#[test]
fn load_collaborators_from_disk() {
    let tmp = TempDir::new().unwrap();
    let repo_path = tmp.path().join("repo.toml");
    let compilers_path = tmp.path().join("compilers.toml");
    let prefs_path = tmp.path().join("packages.toml");

    fs::write(
        &repo_path,
        r#"
[package.hdf5]
versions = ["1.10.7", "1.12.1"]
variants = { mpi = true }
dependencies = { mpi = "", cmake = { spec = "@3.12:", type = ["build"] } }

[package.cmake]
versions = ["3.20.0"]

[package.openmpi]
versions = ["4.1.1"]
provides = { mpi = "4:" }
"#,
    )
    .unwrap();
    fs::write(
        &compilers_path,
        "[[compiler]]\nspec = \"gcc@11.2.0\"\noperating-system = \"rhel8\"\n",
    )
    .unwrap();
    fs::write(&prefs_path, "[hdf5]\nversion = [\"1.10\"]\n").unwrap();

    let repo = Repository::from_path(&repo_path).unwrap();
    assert_eq!(repo.len(), 3);
    assert!(repo.is_virtual("mpi"));
    assert!(!repo.is_virtual("cmake"));
    let providers = repo.providers_for("mpi");
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].to_string(), "openmpi@4:");

    let hdf5 = repo.get("hdf5").unwrap();
    let cmake = hdf5
        .dependencies
        .iter()
        .find(|d| d.spec.name == "cmake")
        .unwrap();
    assert_eq!(cmake.deptypes, DepTypes::BUILD);
    assert_eq!(cmake.spec.versions.to_string(), "3.12:");

    let compilers = CompilerRegistry::from_path(&compilers_path).unwrap();
    let arch: ArchSpec = "linux-rhel8-x86_64".parse().unwrap();
    assert_eq!(compilers.compilers_for_arch(&arch).len(), 1);

    let prefs = Preferences::from_path(&prefs_path).unwrap();
    assert_eq!(prefs.version_order("hdf5")[0].to_string(), "1.10");
}

#[test]
fn missing_file_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let err = Repository::from_path(&tmp.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, KonkretError::Io(_)));
}

#[test]
fn external_for_another_package_is_rejected() {
    let content = r#"
[package.zlib]
versions = ["1.2.11"]
externals = { "bzip2@1.0.8" = "/usr" }
"#;
    let err = Repository::from_toml_str(content).unwrap_err();
    assert!(matches!(err, KonkretError::Config { .. }));
}
