//! Fluent API for declaring a build without a `.strata` file.
//!
//! The builders produce the same AST the parser does, so a built
//! description goes through the same validation and loading.

use strata_common::config::ComposerConfig;
use strata_common::error::Result;
use strata_common::types::UnitKind;
use strata_compose::loader;
use strata_compose::parser::ast::{
    DescriptionFile, ProjectDecl, ScopeDecl, ScopeEntry, ScopeKey, UnitDecl,
};
use strata_compose::workspace::Workspace;

/// Builder for a whole description.
#[derive(Debug, Default)]
pub struct DescriptionBuilder {
    projects: Vec<ProjectDecl>,
}

impl DescriptionBuilder {
    /// Creates an empty description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a project.
    #[must_use]
    pub fn project(mut self, project: ProjectBuilder) -> Self {
        self.projects.push(project.decl);
        self
    }

    /// Returns the description AST.
    #[must_use]
    pub fn build(self) -> DescriptionFile {
        DescriptionFile {
            projects: self.projects,
        }
    }

    /// Validates the description and loads it into a workspace.
    ///
    /// # Errors
    ///
    /// Returns a validation or declaration error.
    pub fn load(self, config: ComposerConfig) -> Result<Workspace> {
        loader::load(&self.build(), config)
    }
}

/// Builder for one project.
#[derive(Debug)]
pub struct ProjectBuilder {
    decl: ProjectDecl,
}

impl ProjectBuilder {
    /// Starts a project at `path` (`":"`, `":common"`).
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            decl: ProjectDecl {
                path: path.into(),
                ..ProjectDecl::default()
            },
        }
    }

    /// Evaluates this project only after all of its children.
    #[must_use]
    pub const fn evaluation_depends_on_children(mut self, enabled: bool) -> Self {
        self.decl.evaluation_depends_on_children = enabled;
        self
    }

    /// Turns kind-based layer wiring on or off for this project.
    #[must_use]
    pub const fn conventions(mut self, enabled: bool) -> Self {
        self.decl.conventions = Some(enabled);
        self
    }

    /// Builds each unit on the same-named unit of `project`.
    #[must_use]
    pub fn layers_from(mut self, project: impl Into<String>) -> Self {
        self.decl.layers_from.push(project.into());
        self
    }

    /// Declares a unit.
    #[must_use]
    pub fn unit(self, name: impl Into<String>, kind: UnitKind) -> Self {
        self.unit_depending(name, kind, Vec::<String>::new())
    }

    /// Declares a unit that builds on other units of this project.
    #[must_use]
    pub fn unit_depending<I, S>(mut self, name: impl Into<String>, kind: UnitKind, on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.decl.units.push(UnitDecl {
            name: name.into(),
            kind,
            depends_on: on.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Adds a scope block.
    #[must_use]
    pub fn scope(mut self, scope: ScopeBuilder) -> Self {
        self.decl.scopes.push(scope.decl);
        self
    }
}

/// Builder for one scope block. Entries keep the order they are added in.
#[derive(Debug)]
pub struct ScopeBuilder {
    decl: ScopeDecl,
}

impl ScopeBuilder {
    /// Starts a block for `unit.scope`.
    #[must_use]
    pub fn new(unit: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            decl: ScopeDecl {
                unit: unit.into(),
                scope: scope.into(),
                entries: Vec::new(),
            },
        }
    }

    fn entry(mut self, key: ScopeKey, value: impl Into<String>) -> Self {
        self.decl.entries.push(ScopeEntry {
            key,
            value: value.into(),
        });
        self
    }

    /// External artifact coordinate.
    #[must_use]
    pub fn artifact(self, coordinate: impl Into<String>) -> Self {
        self.entry(ScopeKey::Artifacts, coordinate)
    }

    /// Output of a unit, `unit` or `:path/unit`.
    #[must_use]
    pub fn output(self, unit: impl Into<String>) -> Self {
        self.entry(ScopeKey::Outputs, unit)
    }

    /// Everything another scope resolves to, `unit.scope` or
    /// `:path/unit.scope`.
    #[must_use]
    pub fn uses(self, scope: impl Into<String>) -> Self {
        self.entry(ScopeKey::Uses, scope)
    }

    /// Extends another scope.
    #[must_use]
    pub fn extends(self, scope: impl Into<String>) -> Self {
        self.entry(ScopeKey::Extends, scope)
    }
}
