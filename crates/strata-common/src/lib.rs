//! # strata-common
//!
//! Shared identity types, error definitions, configuration models, and
//! constants used across the entire strata workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives (project paths, unit and
//! scope identifiers, artifact references) that the composition engine
//! and its front ends build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
