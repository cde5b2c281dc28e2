//! Dependency expansion: attach each package's declared dependencies to the
//! DAG, merging constraints into shared nodes.

use petgraph::graph::NodeIndex;

use konkret_core::package::PackageRepository;
use konkret_core::spec::SpecRequest;
use konkret_util::errors::{KonkretError, KonkretResult};

use crate::graph::SpecGraph;

/// Build the initial DAG for a request.
///
/// The `^` constraints are held on the graph and applied as the named
/// packages enter it.
pub fn build_graph(request: SpecRequest, repo: &dyn PackageRepository) -> KonkretResult<SpecGraph> {
    let SpecRequest {
        mut root,
        dependencies,
    } = request;

    for name in std::iter::once(&root.name).chain(dependencies.iter().map(|d| &d.name)) {
        if !repo.exists(name) && !repo.is_virtual(name) {
            return Err(KonkretError::UnknownPackage { name: name.clone() });
        }
    }

    root.is_virtual = repo.is_virtual(&root.name);
    let mut graph = SpecGraph::new(root);
    graph.set_constraints(dependencies);
    let root = graph.root();
    expand(&mut graph, repo, root)?;
    Ok(graph)
}

/// Attach declared dependencies below `start`, recursively.
///
/// Virtual and external nodes are not expanded. Returns whether the graph
/// changed.
pub fn expand(graph: &mut SpecGraph, repo: &dyn PackageRepository, start: NodeIndex) -> KonkretResult<bool> {
    let mut changed = false;
    let mut work = vec![start];

    while let Some(idx) = work.pop() {
        let spec = graph.spec(idx);
        if spec.is_virtual || spec.external.is_some() {
            continue;
        }
        let package = repo.get(&spec.name).ok_or_else(|| KonkretError::UnknownPackage {
            name: spec.name.clone(),
        })?;
        if let Some(variant) = spec.variants.keys().find(|v| !package.declares_variant(v)) {
            return Err(KonkretError::UnknownVariant {
                package: spec.name.clone(),
                variant: variant.clone(),
            });
        }

        for dep in &package.dependencies {
            let name = &dep.spec.name;
            if let Some(existing) = graph.find(name) {
                // An alias means a virtual already resolved to this node.
                if graph.spec(existing).name == *name {
                    changed |= graph.spec_mut(existing).constrain(&dep.spec)?;
                }
                graph.add_edge(idx, existing, dep.deptypes);
                continue;
            }

            let is_virtual = repo.is_virtual(name);
            if !is_virtual && !repo.exists(name) {
                return Err(KonkretError::UnknownPackage { name: name.clone() });
            }
            let mut node = dep.spec.clone();
            node.is_virtual = is_virtual;
            if let Some(constraint) = graph.take_constraint(name) {
                node.constrain(&constraint)?;
            }
            tracing::debug!("{}: adding dependency {node}", package.name);
            let child = graph.add_node(node);
            graph.add_edge(idx, child, dep.deptypes);
            work.push(child);
            changed = true;
        }
    }
    Ok(changed)
}
