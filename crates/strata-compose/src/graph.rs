//! Cross-project scope graph using `petgraph`.
//!
//! Built from a [`ProjectTree`] once every project is evaluated. Nodes are
//! scopes; an edge `a -> b` means resolving `a` walks into `b` (through an
//! extends edge or a scope reference).

use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;
use strata_common::error::{Result, StrataError};
use strata_common::types::ScopeId;

use crate::project::ProjectTree;
use crate::scope::DependencyScope;

/// Snapshot of every scope and scope-to-scope edge in a tree.
#[derive(Debug)]
pub struct ScopeGraph {
    graph: petgraph::Graph<ScopeId, ()>,
    index: BTreeMap<ScopeId, NodeIndex>,
    dangling: Vec<(ScopeId, ScopeId)>,
}

impl ScopeGraph {
    /// Builds the graph from every declared scope, in declaration order.
    #[must_use]
    pub fn from_tree(tree: &ProjectTree) -> Self {
        let mut graph = Self {
            graph: petgraph::Graph::new(),
            index: BTreeMap::new(),
            dangling: Vec::new(),
        };
        let scopes: Vec<&DependencyScope> = tree
            .projects()
            .flat_map(|p| p.units().iter())
            .flat_map(|u| u.scopes().iter())
            .collect();
        for scope in &scopes {
            let _ = graph.add_scope(scope.id().clone());
        }
        for scope in &scopes {
            for target in scope.scope_edges() {
                match graph.index.get(target).copied() {
                    Some(to) => graph.add_edge(scope.id(), to),
                    None => graph.dangling.push((scope.id().clone(), target.clone())),
                }
            }
        }
        graph
    }

    fn add_scope(&mut self, id: ScopeId) -> NodeIndex {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        let _ = self.index.insert(id, idx);
        idx
    }

    fn add_edge(&mut self, from: &ScopeId, to: NodeIndex) {
        if let Some(&from) = self.index.get(from) {
            let _ = self.graph.add_edge(from, to, ());
        }
    }

    /// Number of scopes.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of scope-to-scope edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges whose target scope does not exist, as `(from, to)`.
    #[must_use]
    pub fn dangling(&self) -> &[(ScopeId, ScopeId)] {
        &self.dangling
    }

    /// Returns a cycle as a scope chain starting and ending with the same
    /// scope, or `None` if the graph is acyclic.
    ///
    /// The reported cycle starts at the earliest-declared scope of the
    /// first strongly connected component that contains one.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<ScopeId>> {
        let start = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || scc.iter().any(|&n| self.graph.contains_edge(n, n)))
            .filter_map(|scc| scc.into_iter().min())
            .min()?;
        let mut path = vec![start];
        if self.walk_back_to(start, start, &mut path) {
            Some(path.into_iter().map(|idx| self.graph[idx].clone()).collect())
        } else {
            None
        }
    }

    fn walk_back_to(&self, node: NodeIndex, start: NodeIndex, path: &mut Vec<NodeIndex>) -> bool {
        let mut next: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        next.sort_unstable();
        for candidate in next {
            if candidate == start {
                path.push(start);
                return true;
            }
            if path.contains(&candidate) {
                continue;
            }
            path.push(candidate);
            if self.walk_back_to(candidate, start, path) {
                return true;
            }
            let _ = path.pop();
        }
        false
    }

    /// Returns scopes ordered so that every scope comes after the scopes it
    /// walks into.
    ///
    /// # Errors
    ///
    /// Returns `CyclicScope` if the graph contains a cycle.
    pub fn resolve_order(&self) -> Result<Vec<ScopeId>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .rev()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(_cycle) => Err(StrataError::CyclicScope {
                cycle: self.find_cycle().unwrap_or_default(),
            }),
        }
    }
}
