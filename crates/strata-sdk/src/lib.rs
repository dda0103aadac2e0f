//! # strata-sdk
//!
//! Public SDK for using strata as a Rust library.
//!
//! Provides two main entry points:
//! - [`DescriptionBuilder`](builder::DescriptionBuilder): Fluent API for
//!   declaring projects, units and scopes without writing a `.strata` file.
//! - [`ClasspathResolver`](resolver::ClasspathResolver): Loads a
//!   description, evaluates it and answers classpath queries.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_common::types::{Role, UnitKind};
//! use strata_sdk::builder::{DescriptionBuilder, ProjectBuilder, ScopeBuilder};
//! use strata_sdk::resolver::ClasspathResolver;
//!
//! let description = DescriptionBuilder::new()
//!     .project(
//!         ProjectBuilder::new(":")
//!             .conventions(true)
//!             .unit("launch", UnitKind::Bootstrap)
//!             .unit("main", UnitKind::Ordinary)
//!             .scope(ScopeBuilder::new("main", "implementation").artifact("org.ow2.asm:asm:9.2")),
//!     )
//!     .build();
//!
//! let mut resolver = ClasspathResolver::default();
//! resolver.load_description(&description)?;
//! let classpath = resolver.classpath(":/main", Role::Compile)?;
//! assert!(!classpath.is_empty());
//! # Ok::<(), strata_common::error::StrataError>(())
//! ```

pub mod builder;
pub mod resolver;
