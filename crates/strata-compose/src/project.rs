//! Project tree model and the mutation-exclusivity rule.
//!
//! A [`ProjectTree`] owns every project of a build. Projects move through
//! `declared -> configuring -> evaluated`; once evaluated they are frozen.
//! Before that only the project's own configuration code may mutate it,
//! which is enforced through [`Actor`].

use std::collections::BTreeMap;
use std::fmt;

use strata_common::error::{Result, StrataError};
use strata_common::types::{ProjectPath, ProjectState};

use crate::registry::UnitRegistry;
use crate::scope::PendingEdge;

/// Who is performing a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Declarative setup before evaluation starts.
    Declaration,
    /// Configuration code (or a deferred callback) owned by a project.
    Project(ProjectPath),
    /// A barrier observer not bound to any project.
    Observer,
}

impl Actor {
    /// Returns the owning project, if any.
    #[must_use]
    pub const fn owner(&self) -> Option<&ProjectPath> {
        match self {
            Self::Project(path) => Some(path),
            Self::Declaration | Self::Observer => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declaration => write!(f, "declaration"),
            Self::Project(path) => write!(f, "project {path}"),
            Self::Observer => write!(f, "barrier observer"),
        }
    }
}

/// A node of the project tree.
#[derive(Debug)]
pub struct Project {
    path: ProjectPath,
    state: ProjectState,
    evaluation_depends_on_children: bool,
    children: Vec<ProjectPath>,
    pub(crate) units: UnitRegistry,
    pub(crate) pending: Vec<PendingEdge>,
}

impl Project {
    fn new(path: ProjectPath, evaluation_depends_on_children: bool) -> Self {
        Self {
            path,
            state: ProjectState::Declared,
            evaluation_depends_on_children,
            children: Vec::new(),
            units: UnitRegistry::default(),
            pending: Vec::new(),
        }
    }

    /// Path of this project.
    #[must_use]
    pub const fn path(&self) -> &ProjectPath {
        &self.path
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ProjectState {
        self.state
    }

    /// Whether this project configures only after all children evaluated.
    #[must_use]
    pub const fn evaluation_depends_on_children(&self) -> bool {
        self.evaluation_depends_on_children
    }

    /// Direct children, in declaration order.
    #[must_use]
    pub fn children(&self) -> &[ProjectPath] {
        &self.children
    }

    /// Units declared by this project.
    #[must_use]
    pub const fn units(&self) -> &UnitRegistry {
        &self.units
    }

    /// Pending references that have not been resolved yet.
    #[must_use]
    pub fn pending(&self) -> &[PendingEdge] {
        &self.pending
    }

    /// Returns `true` once the project is frozen.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.state == ProjectState::Evaluated
    }
}

/// Every project of a build, in declaration order.
#[derive(Debug, Default)]
pub struct ProjectTree {
    projects: BTreeMap<ProjectPath, Project>,
    order: Vec<ProjectPath>,
    next_slot: u64,
}

impl ProjectTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a project. Non-root projects require their parent to be
    /// declared first.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is already declared, the parent is
    /// missing, or the parent is already frozen.
    pub fn declare_project(
        &mut self,
        path: ProjectPath,
        evaluation_depends_on_children: bool,
    ) -> Result<()> {
        if self.projects.contains_key(&path) {
            return Err(StrataError::DuplicateProject { project: path });
        }
        if let Some(parent_path) = path.parent() {
            let parent = self.project_mut(&parent_path)?;
            if parent.is_evaluated() {
                return Err(StrataError::Frozen {
                    project: parent_path,
                });
            }
            parent.children.push(path.clone());
        }
        tracing::debug!(project = %path, evaluation_depends_on_children, "declared project");
        self.order.push(path.clone());
        let _ = self
            .projects
            .insert(path.clone(), Project::new(path, evaluation_depends_on_children));
        Ok(())
    }

    /// Looks up a project.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project is not declared.
    pub fn project(&self, path: &ProjectPath) -> Result<&Project> {
        self.projects.get(path).ok_or_else(|| not_found(path))
    }

    pub(crate) fn project_mut(&mut self, path: &ProjectPath) -> Result<&mut Project> {
        self.projects.get_mut(path).ok_or_else(|| not_found(path))
    }

    /// Returns a project for mutation by `actor`, enforcing that frozen
    /// projects are immutable and that only the owner configures itself.
    pub(crate) fn writable(&mut self, actor: &Actor, path: &ProjectPath) -> Result<&mut Project> {
        let project = self.project_mut(path)?;
        if project.is_evaluated() {
            return Err(StrataError::Frozen {
                project: path.clone(),
            });
        }
        match actor {
            Actor::Declaration => Ok(project),
            Actor::Project(owner) if owner == path => Ok(project),
            other => Err(StrataError::CrossProjectMutation {
                actor: other.to_string(),
                target: path.clone(),
            }),
        }
    }

    pub(crate) fn set_state(&mut self, path: &ProjectPath, state: ProjectState) -> Result<()> {
        self.project_mut(path)?.state = state;
        Ok(())
    }

    /// Allocates the declaration slot of a new edge. Slots order edges
    /// across the whole tree, so deferred edges keep their place.
    pub(crate) fn next_edge_slot(&mut self) -> u64 {
        self.next_slot += 1;
        self.next_slot
    }

    /// Returns `true` if the project exists and is evaluated.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project is not declared.
    pub fn is_evaluated(&self, path: &ProjectPath) -> Result<bool> {
        Ok(self.project(path)?.is_evaluated())
    }

    /// Project paths in declaration order.
    #[must_use]
    pub fn order(&self) -> &[ProjectPath] {
        &self.order
    }

    /// Projects in declaration order.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.order.iter().filter_map(|path| self.projects.get(path))
    }

    /// Number of declared projects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no project is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn not_found(path: &ProjectPath) -> StrataError {
    StrataError::NotFound {
        kind: "project",
        id: path.to_string(),
    }
}
