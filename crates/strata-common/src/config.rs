//! Configuration model for the composition engine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Root configuration for a composition run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Upper bound on scheduler passes. `None` derives the bound from the
    /// number of projects (two lifecycle steps per project, plus one).
    pub max_passes: Option<usize>,
    /// Apply kind-based layer wiring to projects that do not say
    /// otherwise.
    pub layer_conventions: bool,
}

impl ComposerConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| StrataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Returns the scheduler pass bound for `projects` projects.
    #[must_use]
    pub fn pass_bound(&self, projects: usize) -> usize {
        self.max_passes.unwrap_or(projects * 2 + 1)
    }
}
