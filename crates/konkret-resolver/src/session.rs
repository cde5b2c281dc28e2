//! The driving loop.
//!
//! Each sweep first settles providers and externals, restarting its scan
//! whenever the DAG changes shape, then runs the attribute resolvers over
//! every reachable node. Concretization ends with the first sweep that
//! changes nothing.

use petgraph::graph::NodeIndex;

use konkret_core::spec::{parse_request, Spec};
use konkret_util::errors::{KonkretError, KonkretResult};

use crate::concretizer::{Concretizer, Step};
use crate::graph::SpecGraph;
use crate::normalize;
use crate::report::ConcretizationReport;

/// Upper bound on how many times a node can change before the loop is
/// considered stuck.
const FIELDS_PER_NODE: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Attribute {
    Version,
    Architecture,
    Variants,
    Compiler,
    CompilerFlags,
}

impl Attribute {
    const ORDER: [Attribute; 5] = [
        Attribute::Version,
        Attribute::Architecture,
        Attribute::Variants,
        Attribute::Compiler,
        Attribute::CompilerFlags,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Attribute::Version => "version",
            Attribute::Architecture => "architecture",
            Attribute::Variants => "variants",
            Attribute::Compiler => "compiler",
            Attribute::CompilerFlags => "compiler_flags",
        }
    }

    fn value(self, spec: &Spec) -> String {
        match self {
            Attribute::Version => spec.versions.to_string(),
            Attribute::Architecture => spec.architecture.to_string(),
            Attribute::Variants => spec
                .variants
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" "),
            Attribute::Compiler => spec
                .compiler
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            Attribute::CompilerFlags => spec.compiler_flags.to_string(),
        }
    }
}

struct SweepOutcome {
    changed: bool,
    deferred: bool,
}

impl Concretizer<'_> {
    /// Parse a request string, build its DAG and concretize it.
    pub fn concretize_request(&self, request: &str) -> KonkretResult<(SpecGraph, ConcretizationReport)> {
        let request = parse_request(request)?;
        tracing::info!("Concretizing {}", request.root);
        let mut graph = normalize::build_graph(request, self.repo)?;
        let report = self.concretize(&mut graph)?;
        Ok((graph, report))
    }

    /// Run resolvers over `graph` until nothing changes.
    ///
    /// Running this again on an already concrete graph changes nothing and
    /// records no decisions.
    pub fn concretize(&self, graph: &mut SpecGraph) -> KonkretResult<ConcretizationReport> {
        let mut report = ConcretizationReport::new();
        self.fixpoint(graph, &mut report, |graph, report| self.sweep(graph, report))?;

        if let Some(unused) = graph.pending_constraints().next() {
            return Err(KonkretError::InvalidDependency {
                package: graph.spec(graph.root()).name.clone(),
                dependency: unused.name.clone(),
            });
        }

        tracing::info!(
            "Concretized {} packages in {} sweeps ({} decisions)",
            graph.node_count(),
            report.sweeps,
            report.len()
        );
        Ok(report)
    }

    /// Repeat `sweep` until one changes nothing. Fails when that quiet sweep
    /// still leaves work open, or when the sweep count passes
    /// `FIELDS_PER_NODE` per node.
    fn fixpoint(
        &self,
        graph: &mut SpecGraph,
        report: &mut ConcretizationReport,
        mut sweep: impl FnMut(&mut SpecGraph, &mut ConcretizationReport) -> KonkretResult<SweepOutcome>,
    ) -> KonkretResult<()> {
        loop {
            let limit = FIELDS_PER_NODE * graph.node_count() + 1;
            if report.sweeps >= limit {
                return Err(self.stalled(graph));
            }
            report.sweeps += 1;
            let outcome = sweep(graph, report)?;
            tracing::debug!(
                "Sweep {}: changed={}, deferred={}",
                report.sweeps,
                outcome.changed,
                outcome.deferred
            );
            if outcome.changed {
                continue;
            }
            if outcome.deferred || !self.unresolved(graph).is_empty() {
                return Err(self.stalled(graph));
            }
            return Ok(());
        }
    }

    fn sweep(&self, graph: &mut SpecGraph, report: &mut ConcretizationReport) -> KonkretResult<SweepOutcome> {
        let mut changed = false;

        'providers: loop {
            for idx in graph.nodes() {
                let before = graph.spec(idx).name.clone();
                if self.resolve_provider(graph, idx)? == Step::Changed {
                    // A redirected virtual resolves through its alias.
                    let after = graph.spec(graph.find(&before).unwrap_or(idx));
                    let (attribute, value) = match &after.external {
                        Some(prefix) => ("external", format!("{after} [{prefix}]")),
                        None => ("provider", after.to_string()),
                    };
                    report.add(before, attribute, value);
                    changed = true;
                    continue 'providers;
                }
            }
            break;
        }

        let mut deferred = false;
        for idx in graph.nodes() {
            if graph.spec(idx).is_virtual {
                continue;
            }
            for attribute in Attribute::ORDER {
                match self.run(attribute, graph, idx)? {
                    Step::Changed => {
                        let spec = graph.spec(idx);
                        report.add(spec.name.clone(), attribute.as_str(), attribute.value(spec));
                        changed = true;
                    }
                    Step::Deferred => deferred = true,
                    Step::Unchanged => {}
                }
            }
        }

        Ok(SweepOutcome { changed, deferred })
    }

    fn run(&self, attribute: Attribute, graph: &mut SpecGraph, idx: NodeIndex) -> KonkretResult<Step> {
        match attribute {
            Attribute::Version => self.concretize_version(graph, idx),
            Attribute::Architecture => self.concretize_architecture(graph, idx),
            Attribute::Variants => self.concretize_variants(graph, idx),
            Attribute::Compiler => self.concretize_compiler(graph, idx),
            Attribute::CompilerFlags => self.concretize_compiler_flags(graph, idx),
        }
    }

    /// `name: attribute` for every open attribute of every reachable node.
    fn unresolved(&self, graph: &SpecGraph) -> Vec<String> {
        graph
            .nodes()
            .into_iter()
            .flat_map(|idx| {
                let spec = graph.spec(idx);
                spec.unresolved_fields(self.repo.get(&spec.name))
                    .into_iter()
                    .map(move |field| format!("{}: {field}", spec.name))
            })
            .collect()
    }

    fn stalled(&self, graph: &SpecGraph) -> KonkretError {
        KonkretError::StalledFixpoint {
            unresolved: self.unresolved(graph).join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use konkret_core::compilers::CompilerRegistry;
    use konkret_core::config::Preferences;
    use konkret_core::package::Repository;
    use konkret_core::spec::DepTypes;

    use super::*;

    const REPO: &str = r#"
[package.app]
versions = ["1.0"]
dependencies = { zlib = "" }

[package.zlib]
versions = ["1.2.11"]
"#;

    struct Fixture {
        repo: Repository,
        compilers: CompilerRegistry,
        prefs: Preferences,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                repo: Repository::from_toml_str(REPO).unwrap(),
                compilers: CompilerRegistry::default(),
                prefs: Preferences::default(),
            }
        }

        fn concretizer(&self) -> Concretizer<'_> {
            Concretizer::new(
                &self.repo,
                &self.compilers,
                &self.prefs,
                "linux-ubuntu22-x86_64".parse().unwrap(),
            )
            .unwrap()
        }

        fn graph(&self, request: &str) -> SpecGraph {
            normalize::build_graph(parse_request(request).unwrap(), &self.repo).unwrap()
        }
    }

    fn outcome(changed: bool, deferred: bool) -> KonkretResult<SweepOutcome> {
        Ok(SweepOutcome { changed, deferred })
    }

    #[test]
    fn deferred_sweep_stalls() {
        let fx = Fixture::new();
        let mut g = fx.graph("zlib");
        let mut report = ConcretizationReport::new();
        let err = fx
            .concretizer()
            .fixpoint(&mut g, &mut report, |_, _| outcome(false, true))
            .unwrap_err();
        assert!(matches!(
            err,
            KonkretError::StalledFixpoint { ref unresolved } if unresolved.contains("zlib: version")
        ));
        assert_eq!(report.sweeps, 1);
    }

    #[test]
    fn quiet_sweep_with_open_attributes_stalls() {
        let fx = Fixture::new();
        let mut g = fx.graph("app");
        let mut report = ConcretizationReport::new();
        let err = fx
            .concretizer()
            .fixpoint(&mut g, &mut report, |_, _| outcome(false, false))
            .unwrap_err();
        let KonkretError::StalledFixpoint { unresolved } = err else {
            panic!("expected a stalled fixpoint, got {err:?}");
        };
        assert!(unresolved.contains("app: version"));
        assert!(unresolved.contains("zlib: compiler"));
    }

    #[test]
    fn endless_changes_stop_at_the_sweep_bound() {
        let fx = Fixture::new();
        let mut g = fx.graph("app");
        assert_eq!(g.node_count(), 2);
        let mut report = ConcretizationReport::new();
        let mut calls = 0;
        let err = fx
            .concretizer()
            .fixpoint(&mut g, &mut report, |_, _| {
                calls += 1;
                outcome(true, false)
            })
            .unwrap_err();
        assert!(matches!(err, KonkretError::StalledFixpoint { .. }));
        assert_eq!(calls, FIELDS_PER_NODE * 2 + 1);
        assert_eq!(report.sweeps, calls);
    }

    #[test]
    fn bound_grows_with_the_graph() {
        let fx = Fixture::new();
        let mut g = fx.graph("zlib");
        let mut report = ConcretizationReport::new();
        let mut calls = 0;
        let result = fx.concretizer().fixpoint(&mut g, &mut report, |graph, _| {
            calls += 1;
            if calls <= FIELDS_PER_NODE * 3 {
                if graph.node_count() < 3 {
                    let idx = graph.add_node(Spec::parse("extra").unwrap());
                    let root = graph.root();
                    graph.add_edge(root, idx, DepTypes::ALL);
                }
                return outcome(true, false);
            }
            outcome(false, true)
        });
        // Three nodes allow 25 sweeps, not the 9 a single node would.
        assert!(matches!(result, Err(KonkretError::StalledFixpoint { .. })));
        assert_eq!(calls, FIELDS_PER_NODE * 3 + 1);
    }

    #[test]
    fn consistent_repository_reaches_a_fixpoint() {
        let fx = Fixture::new();
        let compilers = CompilerRegistry::from_toml_str(
            "[[compiler]]\nspec = \"gcc@9.1.0\"\noperating-system = \"ubuntu22\"\n",
        )
        .unwrap();
        let concretizer = Concretizer::new(
            &fx.repo,
            &compilers,
            &fx.prefs,
            "linux-ubuntu22-x86_64".parse().unwrap(),
        )
        .unwrap();
        let mut g = fx.graph("app");
        let report = concretizer.concretize(&mut g).unwrap();
        assert!(report.sweeps <= FIELDS_PER_NODE * g.node_count() + 1);
        assert!(concretizer.unresolved(&g).is_empty());
    }
}
