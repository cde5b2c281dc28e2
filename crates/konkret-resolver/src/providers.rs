//! Virtual provider and external installation selection.
//!
//! A virtual node is replaced by one of its providers. A regular node may be
//! replaced by an installed external build of the same package, and must be
//! when the package is not buildable.

use std::cmp::Ordering;

use petgraph::graph::NodeIndex;

use konkret_core::spec::Spec;
use konkret_core::version::Version;
use konkret_util::errors::{KonkretError, KonkretResult};

use crate::concretizer::{Concretizer, Step};
use crate::graph::SpecGraph;
use crate::normalize;

impl Concretizer<'_> {
    /// Ordered replacement candidates for the node at `idx`, best first.
    ///
    /// For a virtual node these are its providers (and their externals); for
    /// a regular node, the node itself when buildable followed by its
    /// matching externals. Provider preference decides between different
    /// packages, then spec preference, then externals over builds. The
    /// result is finally re-ranked, stably, by ABI compatibility with the
    /// nearest relative that has a compiler.
    pub fn choose_virtual_or_external(&self, graph: &SpecGraph, idx: NodeIndex) -> KonkretResult<Vec<Spec>> {
        let spec = graph.spec(idx);

        let mut candidates = if spec.is_virtual {
            let providers = self.repo.providers_for(&spec.name);
            if providers.is_empty() {
                return Err(KonkretError::UnsatisfiableProvider {
                    virtual_name: spec.name.clone(),
                });
            }
            // A `^provider` constraint in the request picks among them.
            let requested: Vec<Spec> = providers
                .iter()
                .filter(|p| graph.pending_constraints().any(|c| c.name == p.name))
                .cloned()
                .collect();
            if requested.is_empty() {
                providers
            } else {
                requested
            }
        } else {
            vec![spec.clone()]
        };

        if spec.is_virtual {
            let holder = graph
                .find_spec(idx, |x| self.prefs.has_provider_preference(&x.name, &spec.name))
                .map_or(spec.name.as_str(), |p| graph.spec(p).name.as_str());
            let order = self.prefs.provider_order(holder, &spec.name);
            let rank = |c: &Spec| {
                order
                    .iter()
                    .position(|p| c.satisfies(p))
                    .unwrap_or(order.len())
            };
            candidates.sort_by_key(|c| rank(c));
        }

        let mut usable: Vec<Spec> = Vec::new();
        for candidate in &candidates {
            let Some(package) = self.repo.get(&candidate.name) else {
                continue;
            };
            if package.buildable {
                usable.push(candidate.clone());
            }
            for ext in &package.externals {
                if ext.spec.satisfies(candidate) && ext.spec.satisfies_attributes(spec) {
                    usable.push(ext.spec.clone());
                }
            }
        }
        if usable.is_empty() {
            return Err(KonkretError::NoBuild {
                package: spec.name.clone(),
            });
        }

        let index_of = |s: &Spec| {
            candidates
                .iter()
                .position(|c| c.name == s.name)
                .unwrap_or(candidates.len())
        };
        usable.sort_by(|a, b| {
            if a.name != b.name {
                return index_of(a).cmp(&index_of(b));
            }
            self.compare_specs(a, b)
                .then_with(|| match (&a.external, &b.external) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
        });

        let exemplar = graph
            .find_spec(idx, |x| x.compiler.is_some())
            .unwrap_or(graph.root());
        let exemplar = graph.spec(exemplar);
        usable.sort_by_key(|c| {
            let strict = self.abi.compatible(c, exemplar, false);
            let loose = self.abi.compatible(c, exemplar, true);
            std::cmp::Reverse((strict, loose))
        });
        Ok(usable)
    }

    /// Preference between two specs of the same package; `Less` is better.
    /// Versions and compilers only count when both sides are concrete.
    fn compare_specs(&self, a: &Spec, b: &Spec) -> Ordering {
        if let (Some(va), Some(vb)) = (a.versions.concrete(), b.versions.concrete()) {
            let preferred = |v: &Version| {
                self.repo
                    .get(&a.name)
                    .is_some_and(|p| p.versions.iter().any(|d| d.preferred && d.version == *v))
            };
            let ra = self.version_rank(&a.name, va, preferred(va));
            let rb = self.version_rank(&a.name, vb, preferred(vb));
            if ra != rb {
                return rb.cmp(&ra);
            }
        }
        if let (Some(ca), Some(cb)) = (&a.compiler, &b.compiler) {
            if ca.is_concrete() && cb.is_concrete() {
                return self.compare_compilers(&a.name, ca, cb);
            }
        }
        Ordering::Equal
    }

    /// Resolve a virtual node to a provider, or swap a regular node for an
    /// external installation when one ranks first.
    pub fn resolve_provider(&self, graph: &mut SpecGraph, idx: NodeIndex) -> KonkretResult<Step> {
        let spec = graph.spec(idx);
        if spec.external.is_some() {
            return Ok(Step::Unchanged);
        }

        if spec.is_virtual {
            if let Some(provider) = self.existing_provider(graph, idx) {
                tracing::debug!(
                    "{}: using {} already in the DAG",
                    spec.name,
                    graph.spec(provider).name
                );
                graph.redirect(idx, provider);
                return Ok(Step::Changed);
            }
        }

        let candidates = self.choose_virtual_or_external(graph, idx)?;
        let old = graph.spec(idx).clone();
        let mut last_err = None;
        for candidate in candidates {
            if !old.is_virtual && candidate.external.is_none() {
                return Ok(Step::Unchanged);
            }
            // Expansion can clash with nodes already in the DAG, so each
            // candidate is applied to a copy first.
            let attempt = self.replacement(graph, &old, candidate).and_then(|replacement| {
                let mut trial = graph.clone();
                self.apply(&mut trial, idx, &old, replacement)?;
                Ok(trial)
            });
            match attempt {
                Ok(trial) => {
                    *graph = trial;
                    return Ok(Step::Changed);
                }
                Err(e) => {
                    tracing::debug!("{}: skipping candidate: {e}", old.name);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(KonkretError::NoBuild { package: old.name }))
    }

    /// A reachable regular node whose package provides the virtual at `idx`.
    fn existing_provider(&self, graph: &SpecGraph, idx: NodeIndex) -> Option<NodeIndex> {
        let virtual_name = &graph.spec(idx).name;
        graph.nodes().into_iter().find(|&n| {
            let node = graph.spec(n);
            !node.is_virtual
                && self
                    .repo
                    .get(&node.name)
                    .is_some_and(|p| p.provides(virtual_name))
        })
    }

    fn replacement(&self, graph: &SpecGraph, old: &Spec, candidate: Spec) -> KonkretResult<Spec> {
        let mut replacement = candidate;
        replacement.inherit_missing(old);
        replacement.is_virtual = false;
        if let Some(constraint) = graph.pending_constraints().find(|c| c.name == replacement.name) {
            replacement.constrain(constraint)?;
        }
        Ok(replacement)
    }

    fn apply(&self, graph: &mut SpecGraph, idx: NodeIndex, old: &Spec, replacement: Spec) -> KonkretResult<()> {
        let external = replacement.external.is_some();
        tracing::debug!(
            "{}: replacing with {replacement}{}",
            old.name,
            if external { " (external)" } else { "" }
        );
        graph.take_constraint(&replacement.name);
        graph.replace(idx, replacement);
        if external {
            graph.clear_dependencies(idx);
        } else {
            normalize::expand(graph, self.repo, idx)?;
        }
        Ok(())
    }
}
