//! Classpath composition and the composition report.
//!
//! Composition is pure over a frozen tree: the same declared graph always
//! yields the same ordered lists, and therefore the same fingerprint.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strata_common::error::{Result, StrataError};
use strata_common::types::{ArtifactRef, ProjectPath, Role, Sha256Hash, UnitId, UnitKind};

use crate::project::ProjectTree;

/// Composes the classpath of `unit` for `role`: the resolved role scope
/// followed by the unit's own output, without duplicates.
///
/// # Errors
///
/// Returns `NotEvaluated` if the unit's project is not frozen yet,
/// `NotFound` for a missing unit or dangling reference, or `CyclicScope`.
pub fn compose_classpath(tree: &ProjectTree, unit: &UnitId, role: Role) -> Result<Vec<ArtifactRef>> {
    if !tree.is_evaluated(&unit.project)? {
        return Err(StrataError::NotEvaluated {
            project: unit.project.clone(),
        });
    }
    let output = tree.unit(unit)?.output();
    let mut entries = tree.resolve_scope(&unit.scope(role.scope_name()))?;
    if !entries.contains(&output) {
        entries.push(output);
    }
    tracing::debug!(%unit, %role, entries = entries.len(), "composed classpath");
    Ok(entries)
}

/// One composed classpath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitClasspath {
    /// The unit.
    pub unit: UnitId,
    /// Its kind.
    pub kind: UnitKind,
    /// Requested role.
    pub role: Role,
    /// Ordered artifacts, consumed verbatim as the classpath.
    pub entries: Vec<ArtifactRef>,
}

/// Every classpath of a workspace plus the evaluation order taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    /// Projects in the order they were evaluated.
    pub evaluation_order: Vec<ProjectPath>,
    /// Classpaths by project, unit and role, in declaration order.
    pub classpaths: Vec<UnitClasspath>,
}

impl Composition {
    /// Composes every (project, unit, role) of an evaluated tree.
    ///
    /// # Errors
    ///
    /// See [`compose_classpath`].
    pub fn compose(tree: &ProjectTree, evaluation_order: &[ProjectPath]) -> Result<Self> {
        let mut classpaths = Vec::new();
        for project in tree.projects() {
            for unit in project.units().iter() {
                for role in Role::ALL {
                    classpaths.push(UnitClasspath {
                        unit: unit.id().clone(),
                        kind: unit.kind(),
                        role,
                        entries: compose_classpath(tree, unit.id(), role)?,
                    });
                }
            }
        }
        tracing::info!(classpaths = classpaths.len(), "composition complete");
        Ok(Self {
            evaluation_order: evaluation_order.to_vec(),
            classpaths,
        })
    }

    /// Looks up the classpath of `unit` for `role`.
    #[must_use]
    pub fn classpath(&self, unit: &UnitId, role: Role) -> Option<&[ArtifactRef]> {
        self.classpaths
            .iter()
            .find(|c| &c.unit == unit && c.role == role)
            .map(|c| c.entries.as_slice())
    }

    /// Units that appear in at least one classpath as an output.
    #[must_use]
    pub fn referenced_outputs(&self) -> BTreeSet<&UnitId> {
        self.classpaths
            .iter()
            .flat_map(|c| c.entries.iter())
            .filter_map(|entry| match entry {
                ArtifactRef::Output(unit) => Some(unit),
                ArtifactRef::External(_) => None,
            })
            .collect()
    }

    /// SHA-256 over the serialized classpaths. Evaluation order is left
    /// out so equal classpaths always share a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the classpaths cannot be encoded.
    pub fn fingerprint(&self) -> Result<Sha256Hash> {
        let bytes = serde_json::to_vec(&self.classpaths)?;
        let digest = Sha256::digest(&bytes);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Sha256Hash::from_hex(hex)
    }

    /// Pretty-printed JSON report.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
