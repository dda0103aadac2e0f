//! Scope graph: dependency scopes, references and extends edges.
//!
//! Resolving a scope yields its direct dependencies (scope references are
//! expanded in place) followed by the resolved set of every scope it
//! extends, in declaration order, keeping the first occurrence of each
//! artifact. Classpath order decides symbol precedence downstream, so this
//! order is part of the contract.

use std::collections::BTreeSet;
use std::fmt;

use strata_common::error::{Result, StrataError};
use strata_common::types::{
    ArtifactRef, Barrier, BarrierWait, ProjectPath, ScopeId, UnitId, is_identifier,
};

use crate::integrity;
use crate::project::{Actor, ProjectTree};

/// What a dependency reference points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReferenceTarget {
    /// Everything resolvable through another scope.
    Scope(ScopeId),
    /// The output of a compilation unit.
    Output(UnitId),
    /// An external artifact coordinate.
    External(String),
}

impl ReferenceTarget {
    /// Project owning the target, `None` for external artifacts.
    #[must_use]
    pub const fn project(&self) -> Option<&ProjectPath> {
        match self {
            Self::Scope(scope) => Some(&scope.project),
            Self::Output(unit) => Some(&unit.project),
            Self::External(_) => None,
        }
    }
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope(scope) => write!(f, "scope {scope}"),
            Self::Output(unit) => write!(f, "output {unit}"),
            Self::External(coordinate) => write!(f, "artifact {coordinate}"),
        }
    }
}

/// How a reference was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The target was readable when the reference was added.
    Eager,
    /// The reference waited on a barrier and was attached by a callback.
    Deferred,
}

/// A direct dependency of a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReference {
    /// The referenced target.
    pub target: ReferenceTarget,
    /// How it was attached.
    pub resolution: Resolution,
}

/// A named dependency bucket within a unit.
#[derive(Debug, Clone)]
pub struct DependencyScope {
    id: ScopeId,
    dependencies: Vec<DependencyReference>,
    extends: Vec<ScopeId>,
    // Declaration slot of each entry, parallel to the lists above.
    dependency_slots: Vec<u64>,
    extends_slots: Vec<u64>,
}

/// Inserts `item` at its declaration slot. An equal entry declared later
/// is moved up; one declared earlier keeps its place.
fn insert_slotted<T>(
    items: &mut Vec<T>,
    slots: &mut Vec<u64>,
    item: T,
    slot: u64,
    same: impl Fn(&T, &T) -> bool,
) {
    if let Some(pos) = items.iter().position(|existing| same(existing, &item)) {
        if slots[pos] <= slot {
            return;
        }
        let _ = items.remove(pos);
        let _ = slots.remove(pos);
    }
    let at = slots.partition_point(|s| *s <= slot);
    items.insert(at, item);
    slots.insert(at, slot);
}

impl DependencyScope {
    pub(crate) const fn new(id: ScopeId) -> Self {
        Self {
            id,
            dependencies: Vec::new(),
            extends: Vec::new(),
            dependency_slots: Vec::new(),
            extends_slots: Vec::new(),
        }
    }

    pub(crate) fn insert_dependency(&mut self, reference: DependencyReference, slot: u64) {
        insert_slotted(
            &mut self.dependencies,
            &mut self.dependency_slots,
            reference,
            slot,
            |a, b| a.target == b.target,
        );
    }

    pub(crate) fn insert_extends(&mut self, target: ScopeId, slot: u64) {
        insert_slotted(&mut self.extends, &mut self.extends_slots, target, slot, |a, b| a == b);
    }

    /// Identity of this scope.
    #[must_use]
    pub const fn id(&self) -> &ScopeId {
        &self.id
    }

    /// Direct dependencies in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[DependencyReference] {
        &self.dependencies
    }

    /// Extended scopes in declaration order.
    #[must_use]
    pub fn extends(&self) -> &[ScopeId] {
        &self.extends
    }

    /// Every scope this one reaches in a single step: scope references
    /// first, then extends edges.
    pub fn scope_edges(&self) -> impl Iterator<Item = &ScopeId> {
        self.dependencies
            .iter()
            .filter_map(|dep| match &dep.target {
                ReferenceTarget::Scope(scope) => Some(scope),
                ReferenceTarget::Output(_) | ReferenceTarget::External(_) => None,
            })
            .chain(self.extends.iter())
    }
}

/// An edge that can be added to a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edge {
    /// A direct dependency.
    Dependency(ReferenceTarget),
    /// An extends edge.
    Extends(ScopeId),
}

impl Edge {
    /// Project owning the edge target, `None` for external artifacts.
    #[must_use]
    pub const fn target_project(&self) -> Option<&ProjectPath> {
        match self {
            Self::Dependency(target) => target.project(),
            Self::Extends(scope) => Some(&scope.project),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dependency(target) => write!(f, "{target}"),
            Self::Extends(scope) => write!(f, "extends {scope}"),
        }
    }
}

/// A cross-project edge that cannot be attached until its target project
/// is evaluated. It must be handed to the scheduler via `defer`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending edge must be deferred or composition fails"]
pub struct PendingEdge {
    id: u64,
    scope: ScopeId,
    edge: Edge,
    target: ProjectPath,
}

impl PendingEdge {
    /// Token identifier, also the edge's declaration slot.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Scope the edge belongs to.
    #[must_use]
    pub const fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// The edge itself.
    #[must_use]
    pub const fn edge(&self) -> &Edge {
        &self.edge
    }

    /// Barrier the edge waits on.
    #[must_use]
    pub fn wait(&self) -> BarrierWait {
        BarrierWait {
            project: self.target.clone(),
            barrier: Barrier::SelfEvaluated,
        }
    }
}

/// Outcome of adding an edge.
#[derive(Debug)]
#[must_use = "a pending edge must be deferred or composition fails"]
pub enum Attach {
    /// The edge is part of the graph.
    Applied,
    /// The edge waits on another project; defer it.
    Pending(PendingEdge),
}

impl ProjectTree {
    /// Declares a scope on `unit`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateScope` if the unit already has a scope of that
    /// name, `NotFound` if the unit is missing, or a mutation error.
    pub fn declare_scope(&mut self, actor: &Actor, unit: &UnitId, name: &str) -> Result<ScopeId> {
        if !is_identifier(name) {
            return Err(StrataError::Config {
                message: format!("invalid scope name \"{name}\" in unit {unit}"),
            });
        }
        let _ = self.writable(actor, &unit.project)?;
        let target = self.unit_mut(unit)?;
        if target.scope(name).is_some() {
            return Err(StrataError::DuplicateScope {
                unit: unit.clone(),
                scope: name.to_owned(),
            });
        }
        let id = unit.scope(name);
        target.scopes.push(DependencyScope::new(id.clone()));
        tracing::debug!(scope = %id, "declared scope");
        Ok(id)
    }

    /// Looks up a scope.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project, unit or scope is missing.
    pub fn scope(&self, id: &ScopeId) -> Result<&DependencyScope> {
        self.unit(&id.unit_id())?
            .scope(&id.scope)
            .ok_or_else(|| scope_not_found(id))
    }

    /// Returns `true` if the scope exists.
    #[must_use]
    pub fn has_scope(&self, id: &ScopeId) -> bool {
        self.scope(id).is_ok()
    }

    fn scope_mut(&mut self, id: &ScopeId) -> Result<&mut DependencyScope> {
        self.unit_mut(&id.unit_id())?
            .scope_mut(&id.scope)
            .ok_or_else(|| scope_not_found(id))
    }

    /// Adds a direct dependency to `scope`.
    ///
    /// A target in another project that is not yet evaluated yields
    /// [`Attach::Pending`]; the caller must defer it.
    ///
    /// # Errors
    ///
    /// Returns a mutation error, `NotFound` for a missing scope or target,
    /// or `CyclicScope` if a scope reference closes a cycle.
    pub fn add_dependency(
        &mut self,
        actor: &Actor,
        scope: &ScopeId,
        target: ReferenceTarget,
    ) -> Result<Attach> {
        self.add_edge(actor, scope, Edge::Dependency(target))
    }

    /// Adds an extends edge from `scope` to `target`.
    ///
    /// Runs the incremental cycle check against the edges declared so far.
    ///
    /// # Errors
    ///
    /// Returns a mutation error, `NotFound` for a missing scope, or
    /// `CyclicScope` naming the full cycle.
    pub fn add_extends(&mut self, actor: &Actor, scope: &ScopeId, target: &ScopeId) -> Result<Attach> {
        self.add_edge(actor, scope, Edge::Extends(target.clone()))
    }

    /// Adds `edge` to `scope`, attaching it now or returning a pending token.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_dependency`] and [`ProjectTree::add_extends`].
    pub fn add_edge(&mut self, actor: &Actor, scope: &ScopeId, edge: Edge) -> Result<Attach> {
        let _ = self.writable(actor, &scope.project)?;
        let _ = self.scope(scope)?;
        let slot = self.next_edge_slot();

        if let Some(target) = edge.target_project().cloned() {
            if target != scope.project && !self.is_evaluated(&target)? {
                let pending = PendingEdge {
                    id: slot,
                    scope: scope.clone(),
                    edge,
                    target,
                };
                tracing::debug!(scope = %scope, edge = %pending.edge, waits_on = %pending.target, "edge pending");
                self.project_mut(&scope.project)?
                    .pending
                    .push(pending.clone());
                return Ok(Attach::Pending(pending));
            }
        }

        self.attach(scope, edge, Resolution::Eager, slot)?;
        Ok(Attach::Applied)
    }

    /// Attaches a previously pending edge once its target is readable.
    pub(crate) fn apply_pending(&mut self, actor: &Actor, pending: &PendingEdge) -> Result<()> {
        let _ = self.writable(actor, &pending.scope.project)?;
        if !self.is_evaluated(&pending.target)? {
            return Err(unresolved(pending, "target project is not evaluated"));
        }
        self.attach(&pending.scope, pending.edge.clone(), Resolution::Deferred, pending.id)
            .map_err(|err| match err {
                StrataError::NotFound { kind, id } => {
                    unresolved(pending, &format!("{kind} {id} does not exist"))
                }
                other => other,
            })?;
        self.project_mut(&pending.scope.project)?
            .pending
            .retain(|p| p.id != pending.id);
        tracing::debug!(scope = %pending.scope, edge = %pending.edge, "deferred edge resolved");
        Ok(())
    }

    fn attach(&mut self, scope: &ScopeId, edge: Edge, resolution: Resolution, slot: u64) -> Result<()> {
        match &edge {
            Edge::Dependency(ReferenceTarget::Scope(target)) | Edge::Extends(target) => {
                let _ = self.scope(target)?;
                integrity::check_new_edge(self, scope, target)?;
            }
            Edge::Dependency(ReferenceTarget::Output(unit)) => {
                let _ = self.unit(unit)?;
            }
            Edge::Dependency(ReferenceTarget::External(_)) => {}
        }

        let owner = self.scope_mut(scope)?;
        match edge {
            Edge::Dependency(target) => {
                owner.insert_dependency(DependencyReference { target, resolution }, slot);
            }
            Edge::Extends(target) => owner.insert_extends(target, slot),
        }
        Ok(())
    }

    /// Resolves `scope` into its ordered, de-duplicated artifact list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a dangling reference or `CyclicScope` if the
    /// walk revisits a scope on the current path.
    pub fn resolve_scope(&self, scope: &ScopeId) -> Result<Vec<ArtifactRef>> {
        let mut walk = Walk::default();
        walk.visit(self, scope)?;
        Ok(walk.entries)
    }
}

#[derive(Default)]
struct Walk {
    entries: Vec<ArtifactRef>,
    seen: BTreeSet<ArtifactRef>,
    done: BTreeSet<ScopeId>,
    stack: Vec<ScopeId>,
}

impl Walk {
    fn push(&mut self, artifact: ArtifactRef) {
        if self.seen.insert(artifact.clone()) {
            self.entries.push(artifact);
        }
    }

    fn visit(&mut self, tree: &ProjectTree, id: &ScopeId) -> Result<()> {
        if let Some(pos) = self.stack.iter().position(|s| s == id) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(id.clone());
            return Err(StrataError::CyclicScope { cycle });
        }
        // Every artifact of a finished scope is already recorded.
        if self.done.contains(id) {
            return Ok(());
        }
        let scope = tree.scope(id)?;
        self.stack.push(id.clone());
        for dep in &scope.dependencies {
            match &dep.target {
                ReferenceTarget::Scope(target) => self.visit(tree, target)?,
                ReferenceTarget::Output(unit) => {
                    let unit = tree.unit(unit)?;
                    self.push(unit.output());
                }
                ReferenceTarget::External(coordinate) => {
                    self.push(ArtifactRef::External(coordinate.clone()));
                }
            }
        }
        for parent in &scope.extends {
            self.visit(tree, parent)?;
        }
        let _ = self.stack.pop();
        let _ = self.done.insert(id.clone());
        Ok(())
    }
}

pub(crate) fn scope_not_found(id: &ScopeId) -> StrataError {
    StrataError::NotFound {
        kind: "scope",
        id: id.to_string(),
    }
}

fn unresolved(pending: &PendingEdge, reason: &str) -> StrataError {
    StrataError::UnresolvedDependency {
        scope: pending.scope.clone(),
        reference: pending.edge.to_string(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use strata_common::constants::{COMPILE_CLASSPATH, IMPLEMENTATION};
    use strata_common::types::{ProjectState, UnitKind};

    use super::*;

    fn path(s: &str) -> ProjectPath {
        ProjectPath::parse(s).expect("valid path")
    }

    fn external(coordinate: &str) -> ReferenceTarget {
        ReferenceTarget::External(coordinate.into())
    }

    fn ext(coordinate: &str) -> ArtifactRef {
        ArtifactRef::External(coordinate.into())
    }

    fn applied(attach: Attach) {
        assert!(matches!(attach, Attach::Applied), "expected applied: {attach:?}");
    }

    fn single_project() -> (ProjectTree, UnitId) {
        let mut tree = ProjectTree::new();
        tree.declare_project(ProjectPath::root(), false).expect("root");
        let main = tree
            .declare_unit(&Actor::Declaration, &ProjectPath::root(), "main", UnitKind::Ordinary)
            .expect("main");
        (tree, main)
    }

    #[test]
    fn direct_dependencies_keep_declaration_order() {
        let (mut tree, main) = single_project();
        let scope = main.scope(IMPLEMENTATION);
        for coordinate in ["g:b:1", "g:a:1", "g:c:1"] {
            applied(
                tree.add_dependency(&Actor::Declaration, &scope, external(coordinate))
                    .expect("add"),
            );
        }
        let resolved = tree.resolve_scope(&scope).expect("resolve");
        assert_eq!(resolved, vec![ext("g:b:1"), ext("g:a:1"), ext("g:c:1")]);
    }

    #[test]
    fn extends_is_transitive() {
        let (mut tree, main) = single_project();
        let a = tree.declare_scope(&Actor::Declaration, &main, "a").expect("a");
        let b = tree.declare_scope(&Actor::Declaration, &main, "b").expect("b");
        let c = tree.declare_scope(&Actor::Declaration, &main, "c").expect("c");
        applied(tree.add_dependency(&Actor::Declaration, &c, external("g:c:1")).expect("dep"));
        applied(tree.add_extends(&Actor::Declaration, &a, &b).expect("a->b"));
        applied(tree.add_extends(&Actor::Declaration, &b, &c).expect("b->c"));

        let resolved = tree.resolve_scope(&a).expect("resolve");
        assert!(resolved.contains(&ext("g:c:1")));
    }

    #[test]
    fn duplicates_keep_first_position() {
        let (mut tree, main) = single_project();
        let a = tree.declare_scope(&Actor::Declaration, &main, "a").expect("a");
        let b = tree.declare_scope(&Actor::Declaration, &main, "b").expect("b");
        applied(tree.add_dependency(&Actor::Declaration, &b, external("g:shared:1")).expect("b"));
        applied(tree.add_dependency(&Actor::Declaration, &b, external("g:b:1")).expect("b"));
        applied(tree.add_dependency(&Actor::Declaration, &a, external("g:a:1")).expect("a"));
        applied(tree.add_dependency(&Actor::Declaration, &a, external("g:shared:1")).expect("a"));
        applied(tree.add_extends(&Actor::Declaration, &a, &b).expect("a->b"));

        let resolved = tree.resolve_scope(&a).expect("resolve");
        assert_eq!(
            resolved,
            vec![ext("g:a:1"), ext("g:shared:1"), ext("g:b:1")]
        );
    }

    #[test]
    fn scope_reference_expands_in_place() {
        let (mut tree, main) = single_project();
        let a = tree.declare_scope(&Actor::Declaration, &main, "a").expect("a");
        let b = tree.declare_scope(&Actor::Declaration, &main, "b").expect("b");
        applied(tree.add_dependency(&Actor::Declaration, &b, external("g:b:1")).expect("b"));
        applied(tree.add_dependency(&Actor::Declaration, &a, external("g:first:1")).expect("a"));
        applied(
            tree.add_dependency(&Actor::Declaration, &a, ReferenceTarget::Scope(b))
                .expect("a uses b"),
        );
        applied(tree.add_dependency(&Actor::Declaration, &a, external("g:last:1")).expect("a"));

        let resolved = tree.resolve_scope(&a).expect("resolve");
        assert_eq!(
            resolved,
            vec![ext("g:first:1"), ext("g:b:1"), ext("g:last:1")]
        );
    }

    #[test]
    fn compile_classpath_sees_implementation() {
        let (mut tree, main) = single_project();
        applied(
            tree.add_dependency(&Actor::Declaration, &main.scope(IMPLEMENTATION), external("g:impl:1"))
                .expect("dep"),
        );
        let resolved = tree
            .resolve_scope(&main.scope(COMPILE_CLASSPATH))
            .expect("resolve");
        assert_eq!(resolved, vec![ext("g:impl:1")]);
    }

    #[test]
    fn mutual_extends_rejected_with_full_cycle() {
        let (mut tree, main) = single_project();
        let a = tree.declare_scope(&Actor::Declaration, &main, "a").expect("a");
        let b = tree.declare_scope(&Actor::Declaration, &main, "b").expect("b");
        applied(tree.add_extends(&Actor::Declaration, &a, &b).expect("a->b"));
        let err = tree.add_extends(&Actor::Declaration, &b, &a).unwrap_err();
        match err {
            StrataError::CyclicScope { cycle } => {
                assert_eq!(cycle, vec![b.clone(), a.clone(), b]);
            }
            other => panic!("expected cycle, got {other}"),
        }
        assert!(tree.scope(&a).expect("a").extends().len() == 1);
    }

    #[test]
    fn self_extends_rejected() {
        let (mut tree, main) = single_project();
        let a = tree.declare_scope(&Actor::Declaration, &main, "a").expect("a");
        let err = tree.add_extends(&Actor::Declaration, &a, &a).unwrap_err();
        assert!(matches!(err, StrataError::CyclicScope { .. }));
    }

    #[test]
    fn duplicate_scope_rejected() {
        let (mut tree, main) = single_project();
        let err = tree
            .declare_scope(&Actor::Declaration, &main, IMPLEMENTATION)
            .unwrap_err();
        assert!(matches!(err, StrataError::DuplicateScope { .. }));
    }

    #[test]
    fn extends_missing_scope_is_not_found() {
        let (mut tree, main) = single_project();
        let err = tree
            .add_extends(&Actor::Declaration, &main.scope(IMPLEMENTATION), &main.scope("ghost"))
            .unwrap_err();
        assert_eq!(err.to_string(), "scope not found: :/main.ghost");
    }

    #[test]
    fn cross_project_edge_is_pending_until_target_evaluated() {
        let (mut tree, main) = single_project();
        tree.declare_project(path(":common"), false).expect("common");
        let common_main = tree
            .declare_unit(&Actor::Declaration, &path(":common"), "main", UnitKind::Ordinary)
            .expect("common main");

        let scope = main.scope(IMPLEMENTATION);
        let target = common_main.scope(IMPLEMENTATION);
        let pending = match tree
            .add_extends(&Actor::Declaration, &scope, &target)
            .expect("add")
        {
            Attach::Pending(pending) => pending,
            Attach::Applied => panic!("cross-project edge must wait"),
        };
        assert_eq!(pending.wait().project, path(":common"));
        assert_eq!(tree.project(&ProjectPath::root()).expect("root").pending().len(), 1);

        tree.set_state(&path(":common"), ProjectState::Evaluated)
            .expect("state");
        tree.apply_pending(&Actor::Project(ProjectPath::root()), &pending)
            .expect("apply");
        assert!(tree.project(&ProjectPath::root()).expect("root").pending().is_empty());
        assert_eq!(tree.scope(&scope).expect("scope").extends(), &[target]);
    }

    #[test]
    fn deferred_edge_keeps_declaration_position() {
        let (mut tree, main) = single_project();
        tree.declare_project(path(":common"), false).expect("common");
        let common_main = tree
            .declare_unit(&Actor::Declaration, &path(":common"), "main", UnitKind::Ordinary)
            .expect("common main");
        let extra = tree.declare_scope(&Actor::Declaration, &main, "extra").expect("extra");
        let scope = main.scope(IMPLEMENTATION);
        let remote = common_main.scope(IMPLEMENTATION);

        let Attach::Pending(pending) = tree
            .add_extends(&Actor::Declaration, &scope, &remote)
            .expect("remote")
        else {
            panic!("cross-project edge must wait");
        };
        applied(tree.add_extends(&Actor::Declaration, &scope, &extra).expect("extra"));
        tree.set_state(&path(":common"), ProjectState::Evaluated)
            .expect("state");
        tree.apply_pending(&Actor::Project(ProjectPath::root()), &pending)
            .expect("apply");

        assert_eq!(tree.scope(&scope).expect("scope").extends(), &[remote, extra]);
    }

    #[test]
    fn pending_edge_to_missing_scope_is_unresolved() {
        let (mut tree, main) = single_project();
        tree.declare_project(path(":common"), false).expect("common");
        let ghost = ScopeId::new(path(":common"), "main", "implementation");
        let Attach::Pending(pending) = tree
            .add_extends(&Actor::Declaration, &main.scope(IMPLEMENTATION), &ghost)
            .expect("add")
        else {
            panic!("cross-project edge must wait");
        };
        tree.set_state(&path(":common"), ProjectState::Evaluated)
            .expect("state");
        let err = tree
            .apply_pending(&Actor::Project(ProjectPath::root()), &pending)
            .unwrap_err();
        assert!(matches!(err, StrataError::UnresolvedDependency { .. }), "got: {err}");
        assert!(err.to_string().contains(":common/main"), "got: {err}");
    }

    #[test]
    fn unit_output_dependency_resolves_to_output() {
        let (mut tree, main) = single_project();
        let launch = tree
            .declare_unit(&Actor::Declaration, &ProjectPath::root(), "launch", UnitKind::Bootstrap)
            .expect("launch");
        applied(
            tree.add_dependency(
                &Actor::Declaration,
                &main.scope(IMPLEMENTATION),
                ReferenceTarget::Output(launch.clone()),
            )
            .expect("dep"),
        );
        let resolved = tree
            .resolve_scope(&main.scope(IMPLEMENTATION))
            .expect("resolve");
        assert_eq!(resolved, vec![ArtifactRef::Output(launch)]);
    }
}
