//! Workspace: the project tree, its scheduler and configuration.
//!
//! Declaration happens first (projects, units, scopes, configuration
//! actions), then [`Workspace::evaluate`] runs every project through its
//! lifecycle, then [`Workspace::compose`] validates the frozen graph and
//! composes every classpath.

use strata_common::config::ComposerConfig;
use strata_common::error::{Result, StrataError};
use strata_common::types::{
    ArtifactRef, Barrier, BarrierWait, ProjectPath, Role, ScopeId, UnitId, UnitKind,
};

use crate::classpath::{self, Composition};
use crate::graph::ScopeGraph;
use crate::integrity;
use crate::project::{Actor, ProjectTree};
use crate::registry::UnitLookup;
use crate::scheduler::{ProjectContext, Scheduler};
use crate::scope::{Attach, Edge, PendingEdge, ReferenceTarget};

/// A multi-project build being composed.
#[derive(Debug, Default)]
pub struct Workspace {
    tree: ProjectTree,
    scheduler: Scheduler,
    config: ComposerConfig,
}

impl Workspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            tree: ProjectTree::new(),
            scheduler: Scheduler::new(),
            config,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Read access to the project tree.
    #[must_use]
    pub const fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    /// Declares a project; its parent must already be declared.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::declare_project`].
    pub fn declare_project(&mut self, path: ProjectPath, evaluation_depends_on_children: bool) -> Result<()> {
        self.tree.declare_project(path, evaluation_depends_on_children)
    }

    /// Declares a unit.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::declare_unit`].
    pub fn declare_unit(&mut self, project: &ProjectPath, name: &str, kind: UnitKind) -> Result<UnitId> {
        self.tree.declare_unit(&Actor::Declaration, project, name, kind)
    }

    /// Records that `unit` builds on the same-project unit `on`.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_unit_dependency`].
    pub fn add_unit_dependency(&mut self, unit: &UnitId, on: &str) -> Result<()> {
        self.tree.add_unit_dependency(&Actor::Declaration, unit, on)
    }

    /// Declares a scope.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::declare_scope`].
    pub fn declare_scope(&mut self, unit: &UnitId, name: &str) -> Result<ScopeId> {
        self.tree.declare_scope(&Actor::Declaration, unit, name)
    }

    /// Adds a direct dependency; cross-project targets come back pending.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_dependency`].
    pub fn add_dependency(&mut self, scope: &ScopeId, target: ReferenceTarget) -> Result<Attach> {
        self.tree.add_dependency(&Actor::Declaration, scope, target)
    }

    /// Adds an extends edge; cross-project targets come back pending.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_extends`].
    pub fn add_extends(&mut self, scope: &ScopeId, target: &ScopeId) -> Result<Attach> {
        self.tree.add_extends(&Actor::Declaration, scope, target)
    }

    /// Adds `edge` and defers it when its target is not evaluated yet.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_edge`].
    pub fn link(&mut self, scope: &ScopeId, edge: Edge) -> Result<()> {
        match self.tree.add_edge(&Actor::Declaration, scope, edge)? {
            Attach::Applied => Ok(()),
            Attach::Pending(pending) => self.defer(pending),
        }
    }

    /// Attaches `pending` once its target project is evaluated. The
    /// project owning the edge cannot finish before that.
    ///
    /// # Errors
    ///
    /// After evaluation the edge is attached at once, so this returns
    /// the error attaching it raises (`Frozen` for an evaluated owner).
    pub fn defer(&mut self, pending: PendingEdge) -> Result<()> {
        self.scheduler.defer_pending(pending);
        self.scheduler.run_ready(&mut self.tree)
    }

    /// Adds configuration code for `project`, run when it configures.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project is not declared.
    pub fn configure<F>(&mut self, project: &ProjectPath, action: F) -> Result<()>
    where
        F: FnOnce(&mut ProjectContext<'_>) -> Result<()> + 'static,
    {
        let _ = self.tree.project(project)?;
        self.scheduler.configure(project.clone(), action);
        Ok(())
    }

    /// Registers an observer callback on `barrier` of `project`. It runs
    /// exactly once; a barrier that already fired runs it before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project is not declared, or the error of
    /// a callback run at once.
    pub fn on_barrier<F>(&mut self, project: &ProjectPath, barrier: Barrier, callback: F) -> Result<()>
    where
        F: FnOnce(&mut ProjectContext<'_>) -> Result<()> + 'static,
    {
        let _ = self.tree.project(project)?;
        self.scheduler.on_barrier(
            BarrierWait {
                project: project.clone(),
                barrier,
            },
            callback,
        );
        self.scheduler.run_ready(&mut self.tree)
    }

    /// Looks up a unit from declaration code.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::lookup_unit`].
    pub fn lookup_unit(&self, unit: &UnitId) -> Result<UnitLookup<'_>> {
        self.tree.lookup_unit(None, unit)
    }

    /// Runs every project through configuration and evaluation.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::evaluate`].
    pub fn evaluate(&mut self) -> Result<()> {
        self.scheduler.evaluate(&mut self.tree, &self.config)
    }

    /// Returns `true` once every project is evaluated.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.tree.projects().all(|p| p.is_evaluated())
    }

    /// Projects in the order they were evaluated.
    #[must_use]
    pub fn evaluation_order(&self) -> &[ProjectPath] {
        self.scheduler.evaluation_order()
    }

    /// Barriers in the order they fired.
    #[must_use]
    pub fn fired_barriers(&self) -> &[BarrierWait] {
        self.scheduler.fired_barriers()
    }

    /// Composes one classpath from the frozen graph.
    ///
    /// # Errors
    ///
    /// See [`classpath::compose_classpath`].
    pub fn compose_classpath(&self, unit: &UnitId, role: Role) -> Result<Vec<ArtifactRef>> {
        classpath::compose_classpath(&self.tree, unit, role)
    }

    /// Evaluates if needed, runs the global integrity check, and composes
    /// every classpath.
    ///
    /// # Errors
    ///
    /// Returns any evaluation or integrity error; no partial report is
    /// produced.
    pub fn compose(&mut self) -> Result<Composition> {
        if !self.is_evaluated() {
            self.evaluate()?;
        }
        integrity::check_global(&self.tree)?;
        Composition::compose(&self.tree, self.scheduler.evaluation_order())
    }

    /// Scopes ordered so each comes after everything it walks into.
    ///
    /// # Errors
    ///
    /// Returns `NotEvaluated` before evaluation or `CyclicScope`.
    pub fn scope_order(&self) -> Result<Vec<ScopeId>> {
        self.ensure_evaluated()?;
        ScopeGraph::from_tree(&self.tree).resolve_order()
    }

    fn ensure_evaluated(&self) -> Result<()> {
        match self.tree.projects().find(|p| !p.is_evaluated()) {
            Some(project) => Err(StrataError::NotEvaluated {
                project: project.path().clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use strata_common::constants::IMPLEMENTATION;

    use super::*;

    fn path(s: &str) -> ProjectPath {
        ProjectPath::parse(s).expect("valid path")
    }

    #[test]
    fn compose_evaluates_on_demand() {
        let mut ws = Workspace::default();
        ws.declare_project(ProjectPath::root(), false).expect("root");
        let main = ws
            .declare_unit(&ProjectPath::root(), "main", UnitKind::Ordinary)
            .expect("main");
        let report = ws.compose().expect("compose");
        assert!(ws.is_evaluated());
        assert_eq!(report.evaluation_order, vec![ProjectPath::root()]);
        assert_eq!(
            report.classpath(&main, Role::Compile).expect("classpath"),
            &[ArtifactRef::Output(main.clone())]
        );
    }

    #[test]
    fn declaration_time_link_defers_cross_project_edge() {
        let mut ws = Workspace::default();
        ws.declare_project(ProjectPath::root(), false).expect("root");
        ws.declare_project(path(":lib"), false).expect("lib");
        let app = ws
            .declare_unit(&ProjectPath::root(), "main", UnitKind::Ordinary)
            .expect("app");
        let lib = ws
            .declare_unit(&path(":lib"), "main", UnitKind::Ordinary)
            .expect("lib");
        let attach = ws
            .add_dependency(&lib.scope(IMPLEMENTATION), ReferenceTarget::External("g:lib-dep:1".into()))
            .expect("dep");
        assert!(matches!(attach, Attach::Applied));
        ws.link(&app.scope(IMPLEMENTATION), Edge::Extends(lib.scope(IMPLEMENTATION)))
            .expect("link");

        ws.evaluate().expect("evaluate");
        assert_eq!(ws.evaluation_order(), &[path(":lib"), ProjectPath::root()]);
        let classpath = ws.compose_classpath(&app, Role::Runtime).expect("classpath");
        assert_eq!(
            classpath,
            vec![ArtifactRef::External("g:lib-dep:1".into()), ArtifactRef::Output(app)]
        );
    }

    #[test]
    fn cross_project_callback_runs_once_after_parent() {
        let mut ws = Workspace::default();
        ws.declare_project(ProjectPath::root(), true).expect("parent");
        ws.declare_project(path(":child"), false).expect("child");
        let runs = Rc::new(Cell::new(0));
        let seen = Rc::clone(&runs);
        ws.configure(&path(":child"), move |cx| {
            cx.on_barrier(&ProjectPath::root(), Barrier::SelfEvaluated, move |cx| {
                assert!(cx.tree().is_evaluated(&ProjectPath::root())?);
                seen.set(seen.get() + 1);
                Ok(())
            })
        })
        .expect("configure");

        ws.evaluate().expect("evaluate");
        assert_eq!(runs.get(), 1);
        assert_eq!(ws.evaluation_order(), &[path(":child"), ProjectPath::root()]);
    }

    #[test]
    fn callback_registered_after_evaluation_runs_once() {
        let mut ws = Workspace::default();
        ws.declare_project(ProjectPath::root(), false).expect("root");
        ws.evaluate().expect("evaluate");

        let runs = Rc::new(Cell::new(0));
        let seen = Rc::clone(&runs);
        ws.on_barrier(&ProjectPath::root(), Barrier::SelfEvaluated, move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        })
        .expect("late registration");
        assert_eq!(runs.get(), 1);

        let _ = ws.compose().expect("compose");
        ws.on_barrier(&ProjectPath::root(), Barrier::ChildrenEvaluated, |_| Ok(()))
            .expect("second late registration");
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn failing_late_callback_reports_its_error() {
        let mut ws = Workspace::default();
        ws.declare_project(ProjectPath::root(), false).expect("root");
        ws.evaluate().expect("evaluate");
        let err = ws
            .on_barrier(&ProjectPath::root(), Barrier::SelfEvaluated, |cx| {
                let _ = cx.declare_unit(&ProjectPath::root(), "late", UnitKind::Ordinary)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StrataError::Frozen { .. }), "got: {err}");
    }

    #[test]
    fn compose_before_evaluation_of_every_project_fails() {
        let mut ws = Workspace::default();
        ws.declare_project(ProjectPath::root(), false).expect("root");
        let main = ws
            .declare_unit(&ProjectPath::root(), "main", UnitKind::Ordinary)
            .expect("main");
        assert!(matches!(
            ws.compose_classpath(&main, Role::Compile),
            Err(StrataError::NotEvaluated { .. })
        ));
        assert!(ws.scope_order().is_err());
    }

    #[test]
    fn configure_unknown_project_fails() {
        let mut ws = Workspace::default();
        let err = ws.configure(&path(":ghost"), |_| Ok(())).unwrap_err();
        assert!(matches!(err, StrataError::NotFound { .. }));
    }

    #[test]
    fn scope_order_lists_every_scope() {
        let mut ws = Workspace::default();
        ws.declare_project(ProjectPath::root(), false).expect("root");
        let _ = ws
            .declare_unit(&ProjectPath::root(), "main", UnitKind::Ordinary)
            .expect("main");
        ws.evaluate().expect("evaluate");
        assert_eq!(ws.scope_order().expect("order").len(), 5);
    }
}
