//! Evaluation barrier scheduler.
//!
//! Projects are configured and evaluated cooperatively on one thread.
//! Cross-project work is a callback queued on a named barrier of the
//! target project; firing the barrier drains its queue in registration
//! order. A callback registered by a project blocks that project from
//! finishing until it ran. Observer callbacks block nothing.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use strata_common::config::ComposerConfig;
use strata_common::error::{Result, StalledProject, StrataError};
use strata_common::types::{
    Barrier, BarrierWait, ProjectPath, ProjectState, ScopeId, UnitId, UnitKind,
};

use crate::integrity;
use crate::project::{Actor, ProjectTree};
use crate::registry::UnitLookup;
use crate::scope::{Attach, Edge, PendingEdge, ReferenceTarget};

/// Work run against a project: its configuration or a barrier callback.
pub type BarrierCallback = Box<dyn FnOnce(&mut ProjectContext<'_>) -> Result<()>>;

struct Registration {
    id: u64,
    owner: Option<ProjectPath>,
    wait: BarrierWait,
    callback: BarrierCallback,
}

/// Barrier queues and project evaluation driver.
#[derive(Default)]
pub struct Scheduler {
    configure: BTreeMap<ProjectPath, Vec<BarrierCallback>>,
    queued: BTreeMap<BarrierWait, Vec<Registration>>,
    ready: VecDeque<Registration>,
    fired: BTreeSet<BarrierWait>,
    fired_log: Vec<BarrierWait>,
    waits: BTreeMap<ProjectPath, Vec<(u64, BarrierWait)>>,
    evaluation_order: Vec<ProjectPath>,
    next_id: u64,
    started: bool,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("configure", &self.configure.keys().collect::<Vec<_>>())
            .field("queued", &self.queued.keys().collect::<Vec<_>>())
            .field("ready", &self.ready.len())
            .field("fired", &self.fired_log)
            .field("evaluation_order", &self.evaluation_order)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configuration action for `project`. Actions run in the
    /// order they were added, with the project as actor.
    pub fn configure<F>(&mut self, project: ProjectPath, action: F)
    where
        F: FnOnce(&mut ProjectContext<'_>) -> Result<()> + 'static,
    {
        self.configure.entry(project).or_default().push(Box::new(action));
    }

    /// Registers an observer callback on `wait`. It runs exactly once.
    /// If the barrier already fired it is ready at once: inside
    /// evaluation it runs on the current drain, afterwards on the next
    /// [`Scheduler::run_ready`].
    pub fn on_barrier<F>(&mut self, wait: BarrierWait, callback: F)
    where
        F: FnOnce(&mut ProjectContext<'_>) -> Result<()> + 'static,
    {
        self.register(None, wait, Box::new(callback));
    }

    /// Barriers fired so far, in firing order.
    #[must_use]
    pub fn fired_barriers(&self) -> &[BarrierWait] {
        &self.fired_log
    }

    /// Returns `true` if `wait` already fired.
    #[must_use]
    pub fn has_fired(&self, wait: &BarrierWait) -> bool {
        self.fired.contains(wait)
    }

    /// Projects in the order they reached `self-evaluated`.
    #[must_use]
    pub fn evaluation_order(&self) -> &[ProjectPath] {
        &self.evaluation_order
    }

    fn register(&mut self, owner: Option<ProjectPath>, wait: BarrierWait, callback: BarrierCallback) {
        self.next_id += 1;
        let id = self.next_id;
        if let Some(owner) = &owner {
            self.waits
                .entry(owner.clone())
                .or_default()
                .push((id, wait.clone()));
        }
        let registration = Registration {
            id,
            owner,
            wait,
            callback,
        };
        if self.fired.contains(&registration.wait) {
            tracing::debug!(wait = %registration.wait, "barrier already fired, callback ready");
            self.ready.push_back(registration);
        } else {
            tracing::debug!(wait = %registration.wait, "callback queued");
            self.queued
                .entry(registration.wait.clone())
                .or_default()
                .push(registration);
        }
    }

    /// Queues `pending` on its target's `self-evaluated` barrier, bound to
    /// the project owning the edge.
    pub(crate) fn defer_pending(&mut self, pending: PendingEdge) {
        let owner = pending.scope().project.clone();
        let wait = pending.wait();
        self.register(
            Some(owner),
            wait,
            Box::new(move |cx: &mut ProjectContext<'_>| cx.tree.apply_pending(&cx.actor, &pending)),
        );
    }

    fn fire(&mut self, wait: BarrierWait) {
        if !self.fired.insert(wait.clone()) {
            return;
        }
        let queued = self.queued.remove(&wait).unwrap_or_default();
        tracing::debug!(%wait, callbacks = queued.len(), "barrier fired");
        self.fired_log.push(wait);
        self.ready.extend(queued);
    }

    fn drain(&mut self, tree: &mut ProjectTree) -> Result<()> {
        while let Some(registration) = self.ready.pop_front() {
            let Registration {
                id,
                owner,
                wait,
                callback,
            } = registration;
            let actor = owner.clone().map_or(Actor::Observer, Actor::Project);
            tracing::debug!(%wait, %actor, "running barrier callback");
            callback(&mut ProjectContext {
                actor,
                tree: &mut *tree,
                scheduler: &mut *self,
            })?;
            if let Some(owner) = owner {
                if let Some(waits) = self.waits.get_mut(&owner) {
                    waits.retain(|(wait_id, _)| *wait_id != id);
                }
            }
        }
        Ok(())
    }

    /// Runs callbacks whose barrier already fired once evaluation has
    /// started. Before that nothing has fired and this does nothing.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a callback.
    pub fn run_ready(&mut self, tree: &mut ProjectTree) -> Result<()> {
        if !self.started || self.ready.is_empty() {
            return Ok(());
        }
        tracing::debug!(callbacks = self.ready.len(), "running late callbacks");
        self.drain(tree)
    }

    fn outstanding(&self, project: &ProjectPath) -> &[(u64, BarrierWait)] {
        self.waits.get(project).map(Vec::as_slice).unwrap_or_default()
    }

    fn children_evaluated(project: &ProjectPath) -> BarrierWait {
        BarrierWait {
            project: project.clone(),
            barrier: Barrier::ChildrenEvaluated,
        }
    }

    /// Evaluates every project of `tree`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by configuration code or a
    /// callback, `UnresolvedDependency` for a reference that was never
    /// deferred, or `EvaluationDeadlock` when a pass makes no progress or
    /// the pass bound is exceeded.
    pub fn evaluate(&mut self, tree: &mut ProjectTree, config: &ComposerConfig) -> Result<()> {
        if self.started {
            return Err(StrataError::Config {
                message: "evaluation already ran for this workspace".into(),
            });
        }
        self.started = true;

        let bound = config.pass_bound(tree.len());
        tracing::info!(projects = tree.len(), pass_bound = bound, "evaluation started");

        for path in tree.order().to_vec() {
            if tree.project(&path)?.children().is_empty() {
                self.fire(Self::children_evaluated(&path));
            }
        }
        self.drain(tree)?;

        let mut passes = 0;
        while self.evaluation_order.len() < tree.len() {
            if passes == bound {
                tracing::warn!(passes, "pass bound exceeded");
                return Err(self.deadlock(tree));
            }
            passes += 1;
            if !self.pass(tree)? {
                return Err(self.deadlock(tree));
            }
        }
        tracing::info!(passes, "evaluation finished");
        Ok(())
    }

    fn pass(&mut self, tree: &mut ProjectTree) -> Result<bool> {
        let mut progressed = false;
        for path in tree.order().to_vec() {
            let project = tree.project(&path)?;
            match project.state() {
                ProjectState::Declared => {
                    if !project.evaluation_depends_on_children()
                        || self.has_fired(&Self::children_evaluated(&path))
                    {
                        self.configure_project(tree, &path)?;
                        progressed = true;
                    }
                }
                ProjectState::Configuring => {
                    if self.outstanding(&path).is_empty() {
                        self.finish_project(tree, &path)?;
                        progressed = true;
                    }
                }
                ProjectState::Evaluated => {}
            }
        }
        Ok(progressed)
    }

    fn configure_project(&mut self, tree: &mut ProjectTree, path: &ProjectPath) -> Result<()> {
        tracing::info!(project = %path, "configuring project");
        tree.set_state(path, ProjectState::Configuring)?;
        for action in self.configure.remove(path).unwrap_or_default() {
            action(&mut ProjectContext {
                actor: Actor::Project(path.clone()),
                tree: &mut *tree,
                scheduler: &mut *self,
            })?;
        }
        self.drain(tree)
    }

    fn finish_project(&mut self, tree: &mut ProjectTree, path: &ProjectPath) -> Result<()> {
        integrity::check_project_resolved(tree, path)?;
        tree.set_state(path, ProjectState::Evaluated)?;
        self.evaluation_order.push(path.clone());
        tracing::info!(project = %path, "project evaluated");
        self.fire(BarrierWait {
            project: path.clone(),
            barrier: Barrier::SelfEvaluated,
        });

        if let Some(parent) = path.parent() {
            let mut all_done = true;
            for child in tree.project(&parent)?.children() {
                all_done &= tree.is_evaluated(child)?;
            }
            if all_done {
                self.fire(Self::children_evaluated(&parent));
            }
        }
        self.drain(tree)
    }

    fn deadlock(&self, tree: &ProjectTree) -> StrataError {
        let stalled: Vec<StalledProject> = tree
            .projects()
            .filter(|p| !p.is_evaluated())
            .map(|project| {
                let path = project.path();
                let mut waits: Vec<BarrierWait> = self
                    .outstanding(path)
                    .iter()
                    .map(|(_, wait)| wait.clone())
                    .collect();
                let own_children = Self::children_evaluated(path);
                if project.state() == ProjectState::Declared
                    && project.evaluation_depends_on_children()
                    && !self.has_fired(&own_children)
                {
                    waits.push(own_children);
                }
                StalledProject {
                    project: path.clone(),
                    state: project.state(),
                    waits,
                }
            })
            .collect();
        tracing::warn!(stalled = stalled.len(), "evaluation deadlock");
        StrataError::EvaluationDeadlock { stalled }
    }
}

/// Handle given to configuration code and barrier callbacks.
///
/// Mutations go through the tree's mutation rule with this context's
/// actor: a project context may only change its own project, an
/// observer context may only read.
pub struct ProjectContext<'a> {
    actor: Actor,
    tree: &'a mut ProjectTree,
    scheduler: &'a mut Scheduler,
}

impl fmt::Debug for ProjectContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectContext")
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}

impl ProjectContext<'_> {
    /// Who this context acts as.
    #[must_use]
    pub const fn actor(&self) -> &Actor {
        &self.actor
    }

    /// The project this context configures, `None` for observers.
    #[must_use]
    pub const fn owner(&self) -> Option<&ProjectPath> {
        self.actor.owner()
    }

    /// Read access to the whole tree.
    #[must_use]
    pub fn tree(&self) -> &ProjectTree {
        self.tree
    }

    /// Declares a unit in `project`.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::declare_unit`].
    pub fn declare_unit(&mut self, project: &ProjectPath, name: &str, kind: UnitKind) -> Result<UnitId> {
        self.tree.declare_unit(&self.actor, project, name, kind)
    }

    /// Records a same-project unit dependency.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_unit_dependency`].
    pub fn add_unit_dependency(&mut self, unit: &UnitId, on: &str) -> Result<()> {
        self.tree.add_unit_dependency(&self.actor, unit, on)
    }

    /// Declares a scope on `unit`.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::declare_scope`].
    pub fn declare_scope(&mut self, unit: &UnitId, name: &str) -> Result<ScopeId> {
        self.tree.declare_scope(&self.actor, unit, name)
    }

    /// Adds a direct dependency; a cross-project target may come back
    /// pending.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_dependency`].
    pub fn add_dependency(&mut self, scope: &ScopeId, target: ReferenceTarget) -> Result<Attach> {
        self.tree.add_dependency(&self.actor, scope, target)
    }

    /// Adds an extends edge; a cross-project target may come back pending.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_extends`].
    pub fn add_extends(&mut self, scope: &ScopeId, target: &ScopeId) -> Result<Attach> {
        self.tree.add_extends(&self.actor, scope, target)
    }

    /// Adds `edge` to `scope` and defers it if its target is not ready.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::add_edge`].
    pub fn link(&mut self, scope: &ScopeId, edge: Edge) -> Result<()> {
        match self.tree.add_edge(&self.actor, scope, edge)? {
            Attach::Applied => Ok(()),
            Attach::Pending(pending) => self.defer(pending),
        }
    }

    /// Registers a pending edge to be attached once its target project is
    /// evaluated. The owning project cannot finish until then.
    ///
    /// # Errors
    ///
    /// Returns `CrossProjectMutation` if the edge belongs to a project
    /// other than this context's owner.
    pub fn defer(&mut self, pending: PendingEdge) -> Result<()> {
        let owner = pending.scope().project.clone();
        if self.actor.owner() != Some(&owner) {
            return Err(StrataError::CrossProjectMutation {
                actor: self.actor.to_string(),
                target: owner,
            });
        }
        self.scheduler.defer_pending(pending);
        Ok(())
    }

    /// Runs `callback` as this project once `project` is evaluated. The
    /// owner cannot finish before the callback ran.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error from an observer context.
    pub fn after_evaluated<F>(&mut self, project: &ProjectPath, callback: F) -> Result<()>
    where
        F: FnOnce(&mut ProjectContext<'_>) -> Result<()> + 'static,
    {
        let Some(owner) = self.actor.owner().cloned() else {
            return Err(StrataError::Config {
                message: format!("{} cannot wait on {project} as a project", self.actor),
            });
        };
        let _ = self.tree.project(project)?;
        self.scheduler.register(
            Some(owner),
            BarrierWait {
                project: project.clone(),
                barrier: Barrier::SelfEvaluated,
            },
            Box::new(callback),
        );
        Ok(())
    }

    /// Registers an observer callback on `barrier` of `project`. It runs
    /// exactly once and does not hold up this context's project.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `project` is not declared.
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
        Ok(())
    }

    /// Looks up a unit as this context's owner.
    ///
    /// # Errors
    ///
    /// See [`ProjectTree::lookup_unit`].
    pub fn lookup_unit(&self, unit: &UnitId) -> Result<UnitLookup<'_>> {
        self.tree.lookup_unit(self.actor.owner(), unit)
    }
}
