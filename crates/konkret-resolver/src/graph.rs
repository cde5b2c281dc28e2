//! The spec DAG: one node per package, edges labelled with dependency types.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use konkret_core::spec::{DepTypes, FlagMap, Spec, VariantValue};

/// A build DAG rooted at the requested spec.
///
/// Nodes are looked up by package name. When a virtual node is resolved the
/// virtual's name stays in the index as an alias of its provider, so later
/// dependents of the same virtual attach to the same node.
#[derive(Debug, Clone)]
pub struct SpecGraph {
    graph: DiGraph<Spec, DepTypes>,
    index: HashMap<String, NodeIndex>,
    root: NodeIndex,
    /// `^name` constraints from the request not yet matched to a node.
    constraints: BTreeMap<String, Spec>,
}

impl SpecGraph {
    pub fn new(root: Spec) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let name = root.name.clone();
        let root = graph.add_node(root);
        index.insert(name, root);
        Self {
            graph,
            index,
            root,
            constraints: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn spec(&self, idx: NodeIndex) -> &Spec {
        &self.graph[idx]
    }

    pub fn spec_mut(&mut self, idx: NodeIndex) -> &mut Spec {
        &mut self.graph[idx]
    }

    /// Look up a node by package name or by a resolved virtual's name.
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    /// Add a node, or return the existing node with the same name.
    pub fn add_node(&mut self, spec: Spec) -> NodeIndex {
        if let Some(&idx) = self.index.get(&spec.name) {
            return idx;
        }
        let name = spec.name.clone();
        let idx = self.graph.add_node(spec);
        self.index.insert(name, idx);
        idx
    }

    /// Add an edge, merging dependency types into an existing one.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, deptypes: DepTypes) {
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                let merged = self.graph[edge] | deptypes;
                self.graph[edge] = merged;
            }
            None => {
                self.graph.add_edge(from, to, deptypes);
            }
        }
    }

    /// Replace the spec at `idx`. The old name keeps pointing at the node.
    pub fn replace(&mut self, idx: NodeIndex, spec: Spec) {
        self.index.insert(spec.name.clone(), idx);
        self.graph[idx] = spec;
    }

    /// Move every dependent of `from` onto `to`, leaving `from` detached.
    pub fn redirect(&mut self, from: NodeIndex, to: NodeIndex) {
        let incoming: Vec<(NodeIndex, DepTypes)> = self
            .graph
            .edges_directed(from, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect();
        while let Some(edge) = self
            .graph
            .edges_directed(from, Direction::Incoming)
            .next()
            .map(|e| e.id())
        {
            self.graph.remove_edge(edge);
        }
        for (parent, deptypes) in incoming {
            if parent != to {
                self.add_edge(parent, to, deptypes);
            }
        }
        for target in self.index.values_mut() {
            if *target == from {
                *target = to;
            }
        }
    }

    /// Drop every outgoing edge of `idx`.
    pub fn clear_dependencies(&mut self, idx: NodeIndex) {
        while let Some(edge) = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .next()
            .map(|e| e.id())
        {
            self.graph.remove_edge(edge);
        }
    }

    pub fn set_constraints(&mut self, constraints: impl IntoIterator<Item = Spec>) {
        self.constraints = constraints
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
    }

    /// Remove and return the pending request constraint for `name`.
    pub fn take_constraint(&mut self, name: &str) -> Option<Spec> {
        self.constraints.remove(name)
    }

    pub fn pending_constraints(&self) -> impl Iterator<Item = &Spec> {
        self.constraints.values()
    }

    /// Direct dependencies of a node, sorted by name.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, DepTypes)> {
        self.neighbors(idx, Direction::Outgoing)
    }

    /// Direct dependents of a node, sorted by name.
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, DepTypes)> {
        self.neighbors(idx, Direction::Incoming)
    }

    fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<(NodeIndex, DepTypes)> {
        let mut out: Vec<(NodeIndex, DepTypes)> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (other, *e.weight())
            })
            .collect();
        out.sort_by(|a, b| self.graph[a.0].name.cmp(&self.graph[b.0].name));
        out
    }

    /// Pre-order walk from `start` along edges whose types intersect
    /// `deptypes`. Siblings are visited in name order and every node once.
    pub fn traverse(
        &self,
        start: NodeIndex,
        direction: Direction,
        deptypes: DepTypes,
        include_start: bool,
    ) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            if idx != start || include_start {
                order.push(idx);
            }
            let next = self.neighbors(idx, direction);
            for (child, types) in next.into_iter().rev() {
                if types.intersects(deptypes) && !visited.contains(&child) {
                    stack.push(child);
                }
            }
        }
        order
    }

    /// Every node reachable from the root, in pre-order.
    pub fn nodes(&self) -> Vec<NodeIndex> {
        self.traverse(self.root, Direction::Outgoing, DepTypes::ALL, true)
    }

    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    /// Find the node nearest to `start` that matches `predicate`.
    ///
    /// Search order: build/link dependents of `start`, then its build/link
    /// dependencies, then the rest of the DAG from the root, and finally
    /// `start` itself.
    pub fn find_spec(&self, start: NodeIndex, predicate: impl Fn(&Spec) -> bool) -> Option<NodeIndex> {
        let nearby = DepTypes::BUILD | DepTypes::LINK;
        let mut visited = HashSet::new();

        let parents = self.traverse(start, Direction::Incoming, nearby, false);
        let children = self.traverse(start, Direction::Outgoing, nearby, false);
        for idx in parents.into_iter().chain(children) {
            if predicate(&self.graph[idx]) {
                return Some(idx);
            }
            visited.insert(idx);
        }

        for idx in self.nodes() {
            if idx == start || visited.contains(&idx) {
                continue;
            }
            if predicate(&self.graph[idx]) {
                return Some(idx);
            }
        }

        predicate(&self.graph[start]).then_some(start)
    }

    /// Render the DAG as an indented tree. A node already expanded higher
    /// up is marked with `(*)` and not expanded again.
    pub fn tree(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}\n", node_label(&self.graph[self.root])));
        let mut expanded = HashSet::new();
        expanded.insert(self.root);

        let deps = self.dependencies_of(self.root);
        let count = deps.len();
        for (i, (child, _)) in deps.into_iter().enumerate() {
            self.print_subtree(&mut output, child, "", i == count - 1, &mut expanded);
        }
        output
    }

    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        expanded: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let label = node_label(&self.graph[idx]);
        if !expanded.insert(idx) {
            output.push_str(&format!("{prefix}{connector}{label} (*)\n"));
            return;
        }
        output.push_str(&format!("{prefix}{connector}{label}\n"));

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let deps = self.dependencies_of(idx);
        let count = deps.len();
        for (i, (child, _)) in deps.into_iter().enumerate() {
            self.print_subtree(output, child, &child_prefix, i == count - 1, expanded);
        }
    }

    /// Flatten the reachable DAG into serializable records, root first.
    pub fn to_nodes(&self) -> Vec<ConcreteNode> {
        self.nodes()
            .into_iter()
            .map(|idx| {
                let spec = &self.graph[idx];
                ConcreteNode {
                    name: spec.name.clone(),
                    version: spec.versions.to_string(),
                    compiler: spec.compiler.as_ref().map(|c| c.to_string()),
                    architecture: spec.architecture.to_string(),
                    variants: spec.variants.clone(),
                    compiler_flags: spec.compiler_flags.clone(),
                    external: spec.external.clone(),
                    dependencies: self
                        .dependencies_of(idx)
                        .into_iter()
                        .map(|(child, deptypes)| ConcreteEdge {
                            name: self.graph[child].name.clone(),
                            deptypes,
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

fn node_label(spec: &Spec) -> String {
    match &spec.external {
        Some(prefix) => format!("{spec} [external: {prefix}]"),
        None => spec.to_string(),
    }
}

impl fmt::Display for SpecGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tree())
    }
}

/// One node of a concretized DAG, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcreteNode {
    pub name: String,
    pub version: String,
    pub compiler: Option<String>,
    pub architecture: String,
    pub variants: BTreeMap<String, VariantValue>,
    pub compiler_flags: FlagMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<String>,
    pub dependencies: Vec<ConcreteEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcreteEdge {
    pub name: String,
    #[serde(rename = "type")]
    pub deptypes: DepTypes,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(name: &str) -> Spec {
        Spec::parse(name).unwrap()
    }

    /// app -> (mpileaks -> (callpath -> mpi, mpi), zlib[build])
    fn sample() -> (SpecGraph, Vec<NodeIndex>) {
        let mut g = SpecGraph::new(s("app"));
        let app = g.root();
        let mpileaks = g.add_node(s("mpileaks"));
        let callpath = g.add_node(s("callpath"));
        let mpi = g.add_node(s("mpi"));
        let zlib = g.add_node(s("zlib"));
        let bl = DepTypes::BUILD | DepTypes::LINK;
        g.add_edge(app, mpileaks, bl);
        g.add_edge(app, zlib, DepTypes::BUILD);
        g.add_edge(mpileaks, callpath, bl);
        g.add_edge(mpileaks, mpi, bl);
        g.add_edge(callpath, mpi, bl);
        (g, vec![app, mpileaks, callpath, mpi, zlib])
    }

    fn names(g: &SpecGraph, order: &[NodeIndex]) -> Vec<String> {
        order.iter().map(|i| g.spec(*i).name.clone()).collect()
    }

    #[test]
    fn add_node_returns_existing() {
        let (mut g, idx) = sample();
        assert_eq!(g.add_node(s("zlib")), idx[4]);
        assert_eq!(g.find("callpath"), Some(idx[2]));
    }

    #[test]
    fn add_edge_merges_deptypes() {
        let (mut g, idx) = sample();
        g.add_edge(idx[0], idx[4], DepTypes::RUN);
        let deps = g.dependencies_of(idx[0]);
        let zlib = deps.iter().find(|(i, _)| *i == idx[4]).unwrap();
        assert_eq!(zlib.1, DepTypes::BUILD | DepTypes::RUN);
    }

    #[test]
    fn preorder_visits_siblings_by_name() {
        let (g, _) = sample();
        assert_eq!(
            names(&g, &g.nodes()),
            vec!["app", "mpileaks", "callpath", "mpi", "zlib"]
        );
    }

    #[test]
    fn traverse_filters_by_deptype() {
        let (g, idx) = sample();
        let link_only = g.traverse(idx[0], Direction::Outgoing, DepTypes::LINK, false);
        assert_eq!(names(&g, &link_only), vec!["mpileaks", "callpath", "mpi"]);
        let parents = g.traverse(idx[3], Direction::Incoming, DepTypes::ALL, false);
        assert_eq!(names(&g, &parents), vec!["callpath", "mpileaks", "app"]);
    }

    #[test]
    fn find_spec_prefers_parents_then_children_then_rest() {
        let (mut g, idx) = sample();
        g.spec_mut(idx[4]).compiler = Some("gcc@9.1.0".parse().unwrap());
        // zlib is only reachable through the whole-DAG pass.
        assert_eq!(g.find_spec(idx[2], |x| x.compiler.is_some()), Some(idx[4]));

        g.spec_mut(idx[3]).compiler = Some("clang@15".parse().unwrap());
        assert_eq!(g.find_spec(idx[2], |x| x.compiler.is_some()), Some(idx[3]));

        g.spec_mut(idx[0]).compiler = Some("gcc@4.9.2".parse().unwrap());
        assert_eq!(g.find_spec(idx[2], |x| x.compiler.is_some()), Some(idx[0]));
    }

    #[test]
    fn find_spec_falls_back_to_start() {
        let (g, idx) = sample();
        assert_eq!(g.find_spec(idx[2], |x| x.name == "callpath"), Some(idx[2]));
        assert_eq!(g.find_spec(idx[2], |x| x.name == "nothing"), None);
    }

    #[test]
    fn redirect_moves_dependents_and_aliases() {
        let (mut g, idx) = sample();
        let mpich = g.add_node(s("mpich"));
        g.redirect(idx[3], mpich);
        assert_eq!(g.find("mpi"), Some(mpich));
        assert!(g.dependents_of(idx[3]).is_empty());
        let parents: Vec<_> = g.dependents_of(mpich).into_iter().map(|(i, _)| i).collect();
        assert_eq!(parents, vec![idx[2], idx[1]]);
        assert!(!g.nodes().contains(&idx[3]));
    }

    #[test]
    fn replace_keeps_old_name_as_alias() {
        let (mut g, idx) = sample();
        g.replace(idx[3], s("openmpi"));
        assert_eq!(g.find("openmpi"), Some(idx[3]));
        assert_eq!(g.find("mpi"), Some(idx[3]));
    }

    #[test]
    fn clear_dependencies_detaches_subtree() {
        let (mut g, idx) = sample();
        g.clear_dependencies(idx[1]);
        assert_eq!(names(&g, &g.nodes()), vec!["app", "mpileaks", "zlib"]);
    }

    #[test]
    fn tree_marks_repeated_nodes() {
        let (g, _) = sample();
        let tree = g.tree();
        assert!(tree.starts_with("app\n"));
        assert!(tree.contains("├── mpileaks"));
        assert!(tree.contains("│   ├── callpath"));
        assert!(tree.contains("│   └── mpi (*)"));
        assert!(tree.contains("└── zlib"));
    }

    #[test]
    fn to_nodes_lists_edges() {
        let (g, _) = sample();
        let nodes = g.to_nodes();
        assert_eq!(nodes.len(), 5);
        assert_eq!(nodes[0].name, "app");
        let deps: Vec<_> = nodes[0].dependencies.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(deps, vec!["mpileaks", "zlib"]);
    }
}
