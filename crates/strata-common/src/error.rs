//! Unified error types for the strata workspace.
//!
//! Every failure is fatal to the composition pass: there is no partial
//! classpath. Variants carry enough identity (project path, unit, scope,
//! and for cycles and deadlocks the full chain) to act on the failure
//! without re-running anything.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{BarrierWait, ProjectPath, ProjectState, ScopeId, UnitId};

/// A project the scheduler could not finish evaluating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledProject {
    /// The stalled project.
    pub project: ProjectPath,
    /// State the project was left in.
    pub state: ProjectState,
    /// Barriers the project was still waiting on.
    pub waits: Vec<BarrierWait>,
}

impl fmt::Display for StalledProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) waiting on [", self.project, self.state)?;
        for (idx, wait) in self.waits.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{wait}")?;
        }
        write!(f, "]")
    }
}

fn join_chain(cycle: &[ScopeId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn join_stalled(stalled: &[StalledProject]) -> String {
    stalled
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StrataError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or description is semantically invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A project description could not be tokenized or parsed.
    #[error("syntax error: {message}")]
    Parse {
        /// Description of the syntax error.
        message: String,
    },

    /// A project, unit or scope lookup missed.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing item.
        kind: &'static str,
        /// Identifier of the missing item.
        id: String,
    },

    /// A project path was declared twice.
    #[error("duplicate project: {project}")]
    DuplicateProject {
        /// The duplicated path.
        project: ProjectPath,
    },

    /// A unit name was declared twice within one project.
    #[error("duplicate unit \"{unit}\" in project {project}")]
    DuplicateUnit {
        /// Owning project.
        project: ProjectPath,
        /// The duplicated unit name.
        unit: String,
    },

    /// A scope name was declared twice within one unit.
    #[error("duplicate scope \"{scope}\" in unit {unit}")]
    DuplicateScope {
        /// Owning unit.
        unit: UnitId,
        /// The duplicated scope name.
        scope: String,
    },

    /// A scope is reachable from itself through extends edges.
    #[error("cyclic scope inheritance: {}", join_chain(.cycle))]
    CyclicScope {
        /// The cycle, starting and ending with the same scope.
        cycle: Vec<ScopeId>,
    },

    /// A dependency reference could not be resolved.
    #[error("unresolved dependency {reference} in scope {scope}: {reason}")]
    UnresolvedDependency {
        /// Scope holding the reference.
        scope: ScopeId,
        /// Rendered reference.
        reference: String,
        /// Why it is unresolved.
        reason: String,
    },

    /// Evaluation stopped making progress with projects left.
    #[error("evaluation deadlock: {}", join_stalled(.stalled))]
    EvaluationDeadlock {
        /// Every project left unevaluated.
        stalled: Vec<StalledProject>,
    },

    /// A project was mutated after it fired `self-evaluated`.
    #[error("project {project} is evaluated and can no longer be mutated")]
    Frozen {
        /// The frozen project.
        project: ProjectPath,
    },

    /// Configuration code tried to mutate a project it does not own.
    #[error("{actor} may not mutate project {target}")]
    CrossProjectMutation {
        /// Who attempted the mutation.
        actor: String,
        /// The project it tried to mutate.
        target: ProjectPath,
    },

    /// A frozen view of a project was requested before evaluation.
    #[error("project {project} has not been evaluated yet")]
    NotEvaluated {
        /// The unevaluated project.
        project: ProjectPath,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StrataError>;
