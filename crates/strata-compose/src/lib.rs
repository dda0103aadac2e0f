//! # strata-compose
//!
//! Composition engine for layered, multi-project builds.
//!
//! Handles:
//! - **Project / Registry**: the project tree and the compilation units
//!   each project declares.
//! - **Scope**: named dependency scopes, their references and extends
//!   edges, and declaration-order resolution.
//! - **Scheduler**: evaluation barriers and deferred callbacks that order
//!   cross-project resolution.
//! - **Integrity**: incremental and global cycle and dangling-reference
//!   checks.
//! - **Classpath**: per-unit, per-role classpath composition and the
//!   fingerprinted composition report.
//! - **Conventions**: kind-based layer wiring between units.
//! - **Parser / Loader**: the `.strata` description language and its
//!   translation into a [`Workspace`](workspace::Workspace).

pub mod classpath;
pub mod conventions;
pub mod graph;
pub mod integrity;
pub mod loader;
pub mod parser;
pub mod project;
pub mod registry;
pub mod scheduler;
pub mod scope;
pub mod workspace;
