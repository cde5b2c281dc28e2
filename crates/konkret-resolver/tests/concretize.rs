use konkret_core::compilers::CompilerRegistry;
use konkret_core::config::Preferences;
use konkret_core::package::{PackageRepository, Repository};
use konkret_core::spec::{FlagKind, Spec};
use konkret_resolver::{ConcretizationReport, Concretizer, SpecGraph};
use konkret_util::errors::KonkretError;

const REPO: &str = include_str!("fixtures/repo.toml");
const COMPILERS: &str = include_str!("fixtures/compilers.toml");
const PACKAGES: &str = include_str!("fixtures/packages.toml");
const SYSTEM_ARCH: &str = "linux-ubuntu22-x86_64";

struct Env {
    repo: Repository,
    compilers: CompilerRegistry,
    prefs: Preferences,
}

impl Env {
    fn new() -> Self {
        Self::with_prefs(PACKAGES)
    }

    fn with_prefs(prefs: &str) -> Self {
        Self::with(REPO, prefs)
    }

    fn with(repo: &str, prefs: &str) -> Self {
        Self {
            repo: Repository::from_toml_str(repo).unwrap(),
            compilers: CompilerRegistry::from_toml_str(COMPILERS).unwrap(),
            prefs: Preferences::from_toml_str(prefs).unwrap(),
        }
    }

    fn concretizer(&self) -> Concretizer<'_> {
        self.concretizer_for(SYSTEM_ARCH)
    }

    fn concretizer_for(&self, arch: &str) -> Concretizer<'_> {
        Concretizer::new(&self.repo, &self.compilers, &self.prefs, arch.parse().unwrap()).unwrap()
    }

    fn concretize(&self, request: &str) -> Result<(SpecGraph, ConcretizationReport), KonkretError> {
        self.concretizer().concretize_request(request)
    }
}

fn node<'g>(graph: &'g SpecGraph, name: &str) -> &'g Spec {
    graph.spec(graph.find(name).unwrap())
}

fn assert_fully_concrete(env: &Env, graph: &SpecGraph) {
    for idx in graph.nodes() {
        let spec = graph.spec(idx);
        let open = spec.unresolved_fields(env.repo.get(&spec.name));
        assert!(open.is_empty(), "{} still has {:?} open", spec.name, open);
    }
}

#[test]
fn mpileaks_is_fully_concretized() {
    let env = Env::new();
    let (graph, report) = env.concretize("mpileaks").unwrap();
    assert_fully_concrete(&env, &graph);

    let root = graph.spec(graph.root());
    assert_eq!(root.versions.to_string(), "2.3");
    assert_eq!(root.architecture.to_string(), SYSTEM_ARCH);
    assert_eq!(root.variants.len(), 2);
    assert_eq!(node(&graph, "dyninst").versions.to_string(), "8.2");
    assert!(report.sweeps >= 2);
    assert!(!report.is_empty());
}

#[test]
fn preferred_version_wins_over_newest() {
    let env = Env::new();
    let (graph, _) = env.concretize("libelf").unwrap();
    assert_eq!(graph.spec(graph.root()).versions.to_string(), "0.8.12");

    let (graph, _) = env.concretize("libelf@0.8.13").unwrap();
    assert_eq!(graph.spec(graph.root()).versions.to_string(), "0.8.13");
}

#[test]
fn no_valid_version_for_disjoint_range() {
    let env = Env::new();
    let err = env.concretize("a@1.0:1.5").unwrap_err();
    assert!(matches!(err, KonkretError::NoValidVersion { ref package, .. } if package == "a"));
}

#[test]
fn version_falls_back_to_constraint_without_declared_versions() {
    let env = Env::new();
    let (graph, _) = env.concretize("noversions@1.0:1.5").unwrap();
    assert_eq!(graph.spec(graph.root()).versions.to_string(), "1.5");
}

#[test]
fn shared_virtual_resolves_to_one_provider() {
    let env = Env::new();
    let (graph, report) = env.concretize("mpileaks").unwrap();
    let mpi = graph.find("mpi").unwrap();
    assert_eq!(graph.find("mpich"), Some(mpi));
    let mpich = graph.spec(mpi);
    assert_eq!(mpich.external.as_deref(), Some("/opt/intel/mpich"));
    assert!(graph.nodes().into_iter().all(|n| !graph.spec(n).is_virtual));

    let callpath = graph.find("callpath").unwrap();
    assert!(graph.dependencies_of(callpath).iter().any(|(n, _)| *n == mpi));
    assert_eq!(report.for_package("mpi").count(), 1);
}

#[test]
fn provider_follows_compiler_of_ancestor() {
    let env = Env::new();
    let (graph, _) = env.concretize("mpileaks%gcc@4.9.2").unwrap();
    let mpi = node(&graph, "mpi");
    assert_eq!(mpi.name, "openmpi");
    assert_eq!(mpi.external.as_deref(), Some("/opt/openmpi"));
    assert_eq!(mpi.compiler.as_ref().unwrap().to_string(), "gcc@4.9.2");
    // Externals are not expanded.
    assert!(graph.find("hwloc").is_none());
    assert_eq!(
        node(&graph, "callpath").compiler.as_ref().unwrap().to_string(),
        "gcc@4.9.2"
    );
}

#[test]
fn compiler_propagates_from_external_provider() {
    let env = Env::new();
    let (graph, _) = env.concretize("mpileaks").unwrap();
    for name in ["mpileaks", "callpath", "libelf"] {
        assert_eq!(
            node(&graph, name).compiler.as_ref().unwrap().to_string(),
            "intel@16.0.3",
            "{name}"
        );
    }
}

#[test]
fn package_provider_preference_overrides_all() {
    let env = Env::with_prefs(
        "[all]\ncompiler = [\"gcc\"]\nproviders = { mpi = [\"mpich\", \"openmpi\"] }\n\n\
         [mpileaks]\nproviders = { mpi = [\"openmpi\"] }\n",
    );
    let (graph, _) = env.concretize("mpileaks").unwrap();
    assert_eq!(node(&graph, "mpi").name, "openmpi");
}

#[test]
fn requested_provider_is_built_when_external_conflicts() {
    let env = Env::new();
    let (graph, _) = env.concretize("mpileaks ^openmpi@2.0.1").unwrap();
    let mpi = node(&graph, "mpi");
    assert_eq!(mpi.name, "openmpi");
    assert!(mpi.external.is_none());
    assert_eq!(mpi.versions.to_string(), "2.0.1");
    assert_eq!(node(&graph, "hwloc").versions.to_string(), "1.11.2");
    assert_fully_concrete(&env, &graph);
}

#[test]
fn provider_with_clashing_dependency_falls_back_to_next() {
    let env = Env::with(
        r#"
[package.app]
versions = ["1.0"]
dependencies = { mpi = "", hwloc = "@1.4:" }

[package.mpich]
versions = ["3.2"]
provides = { mpi = "" }
dependencies = { hwloc = "@:1.3" }

[package.openmpi]
versions = ["2.0.1"]
provides = { mpi = "" }
dependencies = { hwloc = "" }

[package.hwloc]
versions = ["1.3", "1.11.2"]
"#,
        PACKAGES,
    );
    let (graph, _) = env.concretize("app").unwrap();
    assert_eq!(node(&graph, "mpi").name, "openmpi");
    assert!(graph.find("mpich").is_none());
    assert_eq!(node(&graph, "hwloc").versions.to_string(), "1.11.2");
    assert_fully_concrete(&env, &graph);
}

#[test]
fn unbuildable_package_without_external_fails() {
    let env = Env::new();
    assert!(matches!(
        env.concretize("unbuildable"),
        Err(KonkretError::NoBuild { .. })
    ));
}

#[test]
fn compiler_errors_surface() {
    let env = Env::new();
    assert!(matches!(
        env.concretize("libelf%gcc@12"),
        Err(KonkretError::UnavailableCompilerVersion { arch: None, .. })
    ));
    assert!(matches!(
        env.concretizer_for("linux-rhel9-x86_64")
            .concretize_request("libelf"),
        Err(KonkretError::NoCompilersForArch { .. })
    ));
    assert!(matches!(
        env.concretizer_for("linux-ubuntu22-aarch64")
            .concretize_request("libelf%intel"),
        Err(KonkretError::UnavailableCompilerVersion { arch: Some(_), .. })
    ));

    let empty = CompilerRegistry::default();
    let concretizer =
        Concretizer::new(&env.repo, &empty, &env.prefs, SYSTEM_ARCH.parse().unwrap()).unwrap();
    assert!(matches!(
        concretizer.concretize_request("libelf"),
        Err(KonkretError::NoCompilers)
    ));
}

#[test]
fn flags_flow_from_parent_and_compiler_defaults() {
    let env = Env::new();
    let (graph, _) = env.concretize("mpileaks%gcc@9.1.0 cflags=\"-g\"").unwrap();
    for name in ["mpileaks", "callpath", "libelf"] {
        let flags = &node(&graph, name).compiler_flags;
        assert_eq!(flags.get(FlagKind::Cflags).unwrap(), &["-g", "-O2"], "{name}");
        assert!(flags.get(FlagKind::Ldflags).unwrap().is_empty());
    }
}

#[test]
fn concretization_is_idempotent() {
    let env = Env::new();
    let concretizer = env.concretizer();
    let (mut graph, _) = concretizer.concretize_request("mpileaks%gcc@9.1.0").unwrap();
    let before = graph.to_nodes();
    let report = concretizer.concretize(&mut graph).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.sweeps, 1);
    assert_eq!(graph.to_nodes(), before);
}

#[test]
fn unused_dependency_constraint_is_rejected() {
    let env = Env::new();
    let err = env.concretize("libelf ^hwloc").unwrap_err();
    assert!(matches!(
        err,
        KonkretError::InvalidDependency { ref package, ref dependency }
            if package == "libelf" && dependency == "hwloc"
    ));
}

#[test]
fn undeclared_variant_is_rejected() {
    let env = Env::new();
    assert!(matches!(
        env.concretize("libelf+debug"),
        Err(KonkretError::UnknownVariant { .. })
    ));
}

#[test]
fn concrete_dag_serializes() {
    let env = Env::new();
    let (graph, _) = env.concretize("libdwarf%clang@15.0.0").unwrap();
    let json = serde_json::to_value(graph.to_nodes()).unwrap();
    assert_eq!(json[0]["name"], "libdwarf");
    assert_eq!(json[0]["compiler"], "clang@15.0.0");
    assert_eq!(json[0]["dependencies"][0]["name"], "libelf");
    assert_eq!(json[0]["dependencies"][0]["type"][0], "build");
    assert_eq!(json[1]["version"], "0.8.12");

    let tree = graph.tree();
    assert!(tree.starts_with("libdwarf@20130729%clang@15.0.0"));
    assert!(tree.contains("└── libelf@0.8.12%clang@15.0.0"));
}
