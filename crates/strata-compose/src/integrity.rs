//! Cycle and integrity checks.
//!
//! Two passes: an incremental check as each scope edge is added, which only
//! sees edges that already exist, and a global check over the complete
//! cross-project graph before composition.

use std::collections::BTreeSet;

use strata_common::error::{Result, StrataError};
use strata_common::types::{ProjectPath, ScopeId};

use crate::graph::ScopeGraph;
use crate::project::ProjectTree;
use crate::scope::ReferenceTarget;

/// Rejects an edge `from -> to` that would close a cycle over the edges
/// declared so far.
///
/// # Errors
///
/// Returns `CyclicScope` with the chain `from -> to -> ... -> from`.
pub fn check_new_edge(tree: &ProjectTree, from: &ScopeId, to: &ScopeId) -> Result<()> {
    if from == to {
        return Err(StrataError::CyclicScope {
            cycle: vec![from.clone(), to.clone()],
        });
    }
    let mut visited = BTreeSet::new();
    let mut path = vec![to.clone()];
    if reaches(tree, to, from, &mut visited, &mut path) {
        let mut cycle = vec![from.clone()];
        cycle.extend(path);
        return Err(StrataError::CyclicScope { cycle });
    }
    Ok(())
}

fn reaches(
    tree: &ProjectTree,
    node: &ScopeId,
    goal: &ScopeId,
    visited: &mut BTreeSet<ScopeId>,
    path: &mut Vec<ScopeId>,
) -> bool {
    if !visited.insert(node.clone()) {
        return false;
    }
    let Ok(scope) = tree.scope(node) else {
        return false;
    };
    for next in scope.scope_edges() {
        path.push(next.clone());
        if next == goal || reaches(tree, next, goal, visited, path) {
            return true;
        }
        let _ = path.pop();
    }
    false
}

/// Fails if `project` still holds references that were never resolved.
///
/// # Errors
///
/// Returns `UnresolvedDependency` naming the first outstanding reference.
pub fn check_project_resolved(tree: &ProjectTree, project: &ProjectPath) -> Result<()> {
    match tree.project(project)?.pending().first() {
        Some(pending) => Err(StrataError::UnresolvedDependency {
            scope: pending.scope().clone(),
            reference: pending.edge().to_string(),
            reason: format!(
                "deferred reference waiting on {} was never resolved",
                pending.wait()
            ),
        }),
        None => Ok(()),
    }
}

/// Global pass over the whole tree: outstanding deferred references,
/// dangling references, and cycles across project boundaries.
///
/// # Errors
///
/// Returns `UnresolvedDependency` or `CyclicScope`.
pub fn check_global(tree: &ProjectTree) -> Result<()> {
    tracing::info!(projects = tree.len(), "running global integrity check");
    for project in tree.projects() {
        check_project_resolved(tree, project.path())?;
        for scope in project.units().iter().flat_map(|u| u.scopes().iter()) {
            for dep in scope.dependencies() {
                let exists = match &dep.target {
                    ReferenceTarget::Scope(target) => tree.has_scope(target),
                    ReferenceTarget::Output(unit) => tree.unit(unit).is_ok(),
                    ReferenceTarget::External(_) => true,
                };
                if !exists {
                    return Err(StrataError::UnresolvedDependency {
                        scope: scope.id().clone(),
                        reference: dep.target.to_string(),
                        reason: "target does not exist".into(),
                    });
                }
            }
        }
    }

    let graph = ScopeGraph::from_tree(tree);
    if let Some((scope, target)) = graph.dangling().first() {
        return Err(StrataError::UnresolvedDependency {
            scope: scope.clone(),
            reference: format!("extends {target}"),
            reason: "target does not exist".into(),
        });
    }
    if let Some(cycle) = graph.find_cycle() {
        tracing::warn!(length = cycle.len(), "cycle found by global check");
        return Err(StrataError::CyclicScope { cycle });
    }
    tracing::debug!(
        scopes = graph.scope_count(),
        edges = graph.edge_count(),
        "scope graph is acyclic"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use strata_common::constants::IMPLEMENTATION;
    use strata_common::types::{UnitId, UnitKind};

    use super::*;
    use crate::project::Actor;
    use crate::scope::Attach;

    fn path(s: &str) -> ProjectPath {
        ProjectPath::parse(s).expect("valid path")
    }

    fn tree() -> (ProjectTree, UnitId) {
        let mut tree = ProjectTree::new();
        tree.declare_project(ProjectPath::root(), false).expect("root");
        let main = tree
            .declare_unit(&Actor::Declaration, &ProjectPath::root(), "main", UnitKind::Ordinary)
            .expect("main");
        (tree, main)
    }

    #[test]
    fn fresh_tree_passes_global_check() {
        let (tree, _) = tree();
        check_global(&tree).expect("clean tree");
    }

    #[test]
    fn incremental_check_reports_long_chain() {
        let (mut tree, main) = tree();
        let ids: Vec<ScopeId> = ["a", "b", "c"]
            .iter()
            .map(|n| tree.declare_scope(&Actor::Declaration, &main, n).expect("scope"))
            .collect();
        for pair in ids.windows(2) {
            let attach = tree
                .add_extends(&Actor::Declaration, &pair[0], &pair[1])
                .expect("extends");
            assert!(matches!(attach, Attach::Applied));
        }
        let err = check_new_edge(&tree, &ids[2], &ids[0]).unwrap_err();
        match err {
            StrataError::CyclicScope { cycle } => assert_eq!(
                cycle,
                vec![ids[2].clone(), ids[0].clone(), ids[1].clone(), ids[2].clone()]
            ),
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn uses_edges_participate_in_cycles() {
        let (mut tree, main) = tree();
        let a = tree.declare_scope(&Actor::Declaration, &main, "a").expect("a");
        let attach = tree
            .add_dependency(&Actor::Declaration, &a, ReferenceTarget::Scope(main.scope(IMPLEMENTATION)))
            .expect("uses");
        assert!(matches!(attach, Attach::Applied));
        let err = tree
            .add_extends(&Actor::Declaration, &main.scope(IMPLEMENTATION), &a)
            .unwrap_err();
        assert!(matches!(err, StrataError::CyclicScope { .. }));
    }

    #[test]
    fn undeferred_pending_edge_is_unresolved() {
        let (mut tree, main) = tree();
        tree.declare_project(path(":common"), false).expect("common");
        let target = ScopeId::new(path(":common"), "main", IMPLEMENTATION);
        let attach = tree
            .add_extends(&Actor::Declaration, &main.scope(IMPLEMENTATION), &target)
            .expect("pending");
        assert!(matches!(attach, Attach::Pending(_)));

        let err = check_project_resolved(&tree, &ProjectPath::root()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(":/main.implementation"), "got: {msg}");
        assert!(msg.contains(":common@self-evaluated"), "got: {msg}");
        assert!(check_global(&tree).is_err());
    }

    #[test]
    fn global_check_finds_dangling_output() {
        let (mut tree, main) = tree();
        tree.unit_mut(&main)
            .expect("unit")
            .scope_mut(IMPLEMENTATION)
            .expect("scope")
            .insert_dependency(
                crate::scope::DependencyReference {
                    target: ReferenceTarget::Output(UnitId::new(ProjectPath::root(), "ghost")),
                    resolution: crate::scope::Resolution::Eager,
                },
                u64::MAX,
            );
        let err = check_global(&tree).unwrap_err();
        assert!(matches!(err, StrataError::UnresolvedDependency { .. }), "got: {err}");
        assert!(err.to_string().contains(":/ghost"), "got: {err}");
    }
}
