//! Static analysis and validation of the parsed AST.
//!
//! Checks project paths, duplicate names and every reference against the
//! declarations in the file before anything is loaded.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use strata_common::constants::STANDARD_SCOPES;
use strata_common::error::{Result, StrataError};
use strata_common::types::{ProjectPath, is_identifier};

use super::ast::{DescriptionFile, ProjectDecl, ScopeKey};
use super::reference::{parse_artifact, parse_output_ref, parse_scope_ref};

/// Units and scopes of every project, keyed by path.
type Index = BTreeMap<ProjectPath, BTreeMap<String, BTreeSet<String>>>;

/// Validates a parsed description for semantic correctness.
///
/// # Checks performed
///
/// 1. Project paths are valid, unique, and every non-root project's
///    parent is declared.
/// 2. Unit names are valid and unique within their project.
/// 3. `DEPENDS` lists name other units of the same project.
/// 4. `SCOPE` blocks name a declared unit and appear once per scope.
/// 5. Every reference parses and names a declared project, unit and
///    scope.
/// 6. `layers_from` names other declared projects.
///
/// # Errors
///
/// Returns an error if any semantic check fails.
pub fn validate(file: &DescriptionFile) -> Result<()> {
    tracing::info!(projects = file.projects.len(), "validating description");
    let paths = check_project_paths(file)?;
    let mut index = Index::new();
    for (project, path) in file.projects.iter().zip(&paths) {
        let _ = index.insert(path.clone(), check_units(project, path)?);
    }
    for (project, path) in file.projects.iter().zip(&paths) {
        check_scope_references(project, path, &index)?;
        check_layers_from(project, path, &index)?;
    }
    Ok(())
}

fn invalid(message: String) -> StrataError {
    StrataError::Config { message }
}

fn check_project_paths(file: &DescriptionFile) -> Result<Vec<ProjectPath>> {
    let mut seen = HashSet::new();
    let mut paths = Vec::with_capacity(file.projects.len());
    for project in &file.projects {
        let path = ProjectPath::parse(project.path.as_str())?;
        if !seen.insert(path.clone()) {
            return Err(StrataError::DuplicateProject { project: path });
        }
        paths.push(path);
    }
    for path in &paths {
        if let Some(parent) = path.parent() {
            if !seen.contains(&parent) {
                return Err(StrataError::NotFound {
                    kind: "project",
                    id: format!("{parent} (parent of {path})"),
                });
            }
        }
    }
    Ok(paths)
}

fn check_units(
    project: &ProjectDecl,
    path: &ProjectPath,
) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut units: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for unit in &project.units {
        if !is_identifier(&unit.name) {
            return Err(invalid(format!(
                "invalid unit name \"{}\" in project {path}",
                unit.name
            )));
        }
        let standard = STANDARD_SCOPES.iter().map(ToString::to_string).collect();
        if units.insert(unit.name.clone(), standard).is_some() {
            return Err(StrataError::DuplicateUnit {
                project: path.clone(),
                unit: unit.name.clone(),
            });
        }
    }

    for unit in &project.units {
        for on in &unit.depends_on {
            if on == &unit.name {
                return Err(invalid(format!(
                    "unit {} in project {path} cannot depend on itself",
                    unit.name
                )));
            }
            if !units.contains_key(on) {
                return Err(StrataError::NotFound {
                    kind: "unit",
                    id: format!("{path}/{on} (DEPENDS of {})", unit.name),
                });
            }
        }
    }

    let mut blocks = HashSet::new();
    for scope in &project.scopes {
        let Some(scopes) = units.get_mut(&scope.unit) else {
            return Err(StrataError::NotFound {
                kind: "unit",
                id: format!("{path}/{} (SCOPE {}.{})", scope.unit, scope.unit, scope.scope),
            });
        };
        if !is_identifier(&scope.scope) {
            return Err(invalid(format!(
                "invalid scope name \"{}\" in project {path}",
                scope.scope
            )));
        }
        if !blocks.insert((scope.unit.as_str(), scope.scope.as_str())) {
            return Err(invalid(format!(
                "duplicate SCOPE block {}.{} in project {path}",
                scope.unit, scope.scope
            )));
        }
        let _ = scopes.insert(scope.scope.clone());
    }
    Ok(units)
}

fn check_scope_references(project: &ProjectDecl, path: &ProjectPath, index: &Index) -> Result<()> {
    for scope in &project.scopes {
        for entry in &scope.entries {
            let text = entry.value.as_str();
            match entry.key {
                ScopeKey::Artifacts => {
                    let _ = parse_artifact(text)?;
                }
                ScopeKey::Outputs => {
                    let unit = parse_output_ref(text, path)?;
                    let known = index
                        .get(&unit.project)
                        .is_some_and(|units| units.contains_key(&unit.unit));
                    if !known {
                        return Err(StrataError::NotFound {
                            kind: "unit",
                            id: format!("{unit} (outputs of {}.{} in {path})", scope.unit, scope.scope),
                        });
                    }
                }
                ScopeKey::Uses | ScopeKey::Extends => {
                    let target = parse_scope_ref(text, path)?;
                    let known = index
                        .get(&target.project)
                        .and_then(|units| units.get(&target.unit))
                        .is_some_and(|scopes| scopes.contains(&target.scope));
                    if !known {
                        return Err(StrataError::NotFound {
                            kind: "scope",
                            id: format!("{target} (referenced by {}.{} in {path})", scope.unit, scope.scope),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_layers_from(project: &ProjectDecl, path: &ProjectPath, index: &Index) -> Result<()> {
    for from in &project.layers_from {
        let source = ProjectPath::parse(from.as_str())?;
        if &source == path {
            return Err(invalid(format!("project {path} cannot inherit layers from itself")));
        }
        if !index.contains_key(&source) {
            return Err(StrataError::NotFound {
                kind: "project",
                id: format!("{source} (layers_from of {path})"),
            });
        }
    }
    Ok(())
}
