//! Loads, evaluates and composes a build, then answers classpath queries.
//!
//! Wraps `strata-compose`'s loader and workspace into a high-level API
//! for SDK consumers.

use std::path::Path;

use strata_common::config::ComposerConfig;
use strata_common::error::{Result, StrataError};
use strata_common::types::{ArtifactRef, Role, Sha256Hash, UnitId};
use strata_compose::classpath::Composition;
use strata_compose::loader;
use strata_compose::parser::ast::DescriptionFile;
use strata_compose::workspace::Workspace;

/// High-level resolver for composed classpaths.
#[derive(Debug, Default)]
pub struct ClasspathResolver {
    config: ComposerConfig,
    composition: Option<Composition>,
}

impl ClasspathResolver {
    /// Creates a resolver with the given configuration.
    #[must_use]
    pub const fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            composition: None,
        }
    }

    /// Loads and composes a `.strata` file.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, parsing, evaluation or composition
    /// fails. A previous composition is discarded either way.
    pub fn load_file(&mut self, path: &Path) -> Result<&Composition> {
        tracing::info!(path = %path.display(), "resolving description file");
        self.composition = None;
        let workspace = loader::load_file(path, self.config.clone())?;
        self.finish(workspace)
    }

    /// Loads and composes description source text.
    ///
    /// # Errors
    ///
    /// See [`ClasspathResolver::load_file`].
    pub fn load_str(&mut self, input: &str) -> Result<&Composition> {
        self.composition = None;
        let workspace = loader::load_str(input, self.config.clone())?;
        self.finish(workspace)
    }

    /// Loads and composes an already built description.
    ///
    /// # Errors
    ///
    /// See [`ClasspathResolver::load_file`].
    pub fn load_description(&mut self, file: &DescriptionFile) -> Result<&Composition> {
        self.composition = None;
        let workspace = loader::load(file, self.config.clone())?;
        self.finish(workspace)
    }

    fn finish(&mut self, mut workspace: Workspace) -> Result<&Composition> {
        let composition = workspace.compose()?;
        tracing::info!(
            classpaths = composition.classpaths.len(),
            "classpaths resolved"
        );
        Ok(&*self.composition.insert(composition))
    }

    /// The last successful composition.
    #[must_use]
    pub const fn composition(&self) -> Option<&Composition> {
        self.composition.as_ref()
    }

    /// Classpath of `unit` (`":path/unit"`) for `role`.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if nothing is loaded or the identifier is
    /// malformed, and `NotFound` for an unknown unit.
    pub fn classpath(&self, unit: &str, role: Role) -> Result<&[ArtifactRef]> {
        let composition = self.loaded()?;
        let id: UnitId = unit.parse()?;
        composition
            .classpath(&id, role)
            .ok_or_else(|| StrataError::NotFound {
                kind: "unit",
                id: id.to_string(),
            })
    }

    /// Fingerprint of the loaded composition.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if nothing is loaded.
    pub fn fingerprint(&self) -> Result<Sha256Hash> {
        self.loaded()?.fingerprint()
    }

    fn loaded(&self) -> Result<&Composition> {
        self.composition.as_ref().ok_or_else(|| StrataError::Config {
            message: "no description loaded".into(),
        })
    }
}
