//! Translates a parsed `.strata` description into a [`Workspace`].
//!
//! Projects, units and extra scopes are declared up front. Everything
//! else (unit wiring, layer conventions, `SCOPE` block references and
//! `layers_from`) becomes configuration code of the owning project, so
//! cross-project references are ordered by the scheduler.

use std::path::Path;

use strata_common::config::ComposerConfig;
use strata_common::error::{Result, StrataError};
use strata_common::types::{ProjectPath, ScopeId, UnitId};

use crate::conventions;
use crate::parser::ast::{DescriptionFile, ProjectDecl, ScopeKey};
use crate::parser::reference::{parse_artifact, parse_output_ref, parse_scope_ref};
use crate::parser::{self, validator};
use crate::scheduler::ProjectContext;
use crate::scope::{Edge, ReferenceTarget};
use crate::workspace::Workspace;

/// Configuration work for one project, resolved from its block.
#[derive(Debug)]
struct ProjectPlan {
    path: ProjectPath,
    conventions: bool,
    links: Vec<(ScopeId, Edge)>,
    layers_from: Vec<ProjectPath>,
}

impl ProjectPlan {
    fn from_decl(decl: &ProjectDecl, path: ProjectPath, config: &ComposerConfig) -> Result<Self> {
        let mut links = Vec::new();
        for block in &decl.scopes {
            let scope = ScopeId::new(path.clone(), block.unit.as_str(), block.scope.as_str());
            for entry in &block.entries {
                let text = entry.value.as_str();
                let edge = match entry.key {
                    ScopeKey::Artifacts => Edge::Dependency(ReferenceTarget::External(parse_artifact(text)?)),
                    ScopeKey::Outputs => Edge::Dependency(ReferenceTarget::Output(parse_output_ref(text, &path)?)),
                    ScopeKey::Uses => Edge::Dependency(ReferenceTarget::Scope(parse_scope_ref(text, &path)?)),
                    ScopeKey::Extends => Edge::Extends(parse_scope_ref(text, &path)?),
                };
                links.push((scope.clone(), edge));
            }
        }
        let layers_from = decl
            .layers_from
            .iter()
            .map(|from| ProjectPath::parse(from.as_str()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            path,
            conventions: decl.conventions.unwrap_or(config.layer_conventions),
            links,
            layers_from,
        })
    }

    fn apply(self, cx: &mut ProjectContext<'_>) -> Result<()> {
        conventions::wire_unit_dependencies(cx, &self.path)?;
        if self.conventions {
            conventions::apply_layer_conventions(cx, &self.path)?;
        }
        for (scope, edge) in self.links {
            cx.link(&scope, edge)?;
        }
        for from in &self.layers_from {
            conventions::inherit_layers(cx, from)?;
        }
        Ok(())
    }
}

/// Validates `file` and builds a workspace from it.
///
/// # Errors
///
/// Returns a validation error, or any error raised while declaring the
/// description's projects, units and scopes.
pub fn load(file: &DescriptionFile, config: ComposerConfig) -> Result<Workspace> {
    validator::validate(file)?;
    build(file, config)
}

/// Parses and loads a description from source text.
///
/// # Errors
///
/// Returns a parse, validation or declaration error.
pub fn load_str(input: &str, config: ComposerConfig) -> Result<Workspace> {
    let file = parser::parse_description(input)?;
    build(&file, config)
}

/// Reads, parses and loads a description file.
///
/// # Errors
///
/// Returns an `Io` error if the file cannot be read, otherwise see
/// [`load_str`].
pub fn load_file(path: &Path, config: ComposerConfig) -> Result<Workspace> {
    tracing::info!(path = %path.display(), "loading description");
    let input = std::fs::read_to_string(path).map_err(|source| StrataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&input, config)
}

fn build(file: &DescriptionFile, config: ComposerConfig) -> Result<Workspace> {
    let mut decls = file
        .projects
        .iter()
        .map(|decl| Ok((ProjectPath::parse(decl.path.as_str())?, decl)))
        .collect::<Result<Vec<_>>>()?;
    // Parents before children; file order otherwise.
    decls.sort_by_key(|(path, _)| path.depth());

    let mut plans = Vec::with_capacity(decls.len());
    let mut workspace = Workspace::new(config);
    for (path, decl) in &decls {
        workspace.declare_project(path.clone(), decl.evaluation_depends_on_children)?;
        for unit in &decl.units {
            let _ = workspace.declare_unit(path, &unit.name, unit.kind)?;
        }
        for unit in &decl.units {
            let id = UnitId::new(path.clone(), unit.name.as_str());
            for on in &unit.depends_on {
                workspace.add_unit_dependency(&id, on)?;
            }
        }
        for block in &decl.scopes {
            let scope = ScopeId::new(path.clone(), block.unit.as_str(), block.scope.as_str());
            if !workspace.tree().has_scope(&scope) {
                let _ = workspace.declare_scope(&scope.unit_id(), &block.scope)?;
            }
        }
        plans.push(ProjectPlan::from_decl(decl, path.clone(), workspace.config())?);
    }

    for plan in plans {
        let path = plan.path.clone();
        workspace.configure(&path, move |cx| plan.apply(cx))?;
    }
    tracing::info!(projects = decls.len(), "description loaded");
    Ok(workspace)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use strata_common::types::{ArtifactRef, Role};

    use super::*;

    fn path(s: &str) -> ProjectPath {
        ProjectPath::parse(s).expect("valid path")
    }

    fn unit(project: &str, name: &str) -> UnitId {
        UnitId::new(path(project), name)
    }

    const LAYERED: &str = r#"
PROJECT ":" {
    conventions = true
    UNIT launch KIND bootstrap
    UNIT main
    SCOPE main.implementation {
        artifacts = ["org.ow2.asm:asm:9.2"]
    }
}
"#;

    #[test]
    fn load_applies_conventions_before_scope_blocks() {
        let mut ws = load_str(LAYERED, ComposerConfig::default()).expect("load");
        let report = ws.compose().expect("compose");
        assert_eq!(
            report.classpath(&unit(":", "main"), Role::Compile).expect("main"),
            &[
                ArtifactRef::Output(unit(":", "launch")),
                ArtifactRef::External("org.ow2.asm:asm:9.2".into()),
                ArtifactRef::Output(unit(":", "main")),
            ]
        );
    }

    #[test]
    fn project_property_overrides_config_default() {
        let input = LAYERED.replace("conventions = true", "conventions = false");
        let config = ComposerConfig {
            layer_conventions: true,
            ..ComposerConfig::default()
        };
        let mut ws = load_str(&input, config).expect("load");
        let classpath = ws
            .compose()
            .and_then(|_| ws.compose_classpath(&unit(":", "main"), Role::Compile))
            .expect("classpath");
        assert!(!classpath.contains(&ArtifactRef::Output(unit(":", "launch"))));
    }

    #[test]
    fn custom_scope_block_declares_scope() {
        let input = r#"
PROJECT ":" {
    UNIT main
    SCOPE main.mixinsCompile {
        artifacts = ["org.spongepowered:mixin:0.8"]
    }
    SCOPE main.compileOnly {
        uses = ["main.mixinsCompile"]
    }
}
"#;
        let mut ws = load_str(input, ComposerConfig::default()).expect("load");
        assert!(ws.tree().has_scope(&ScopeId::new(ProjectPath::root(), "main", "mixinsCompile")));
        let _ = ws.compose().expect("compose");
        let classpath = ws
            .compose_classpath(&unit(":", "main"), Role::Compile)
            .expect("classpath");
        assert_eq!(classpath[0], ArtifactRef::External("org.spongepowered:mixin:0.8".into()));
    }

    #[test]
    fn child_listed_first_is_declared_after_parent() {
        let input = r#"
PROJECT ":lib" { UNIT main }
PROJECT ":" { UNIT main }
"#;
        let ws = load_str(input, ComposerConfig::default()).expect("load");
        assert_eq!(ws.tree().order(), &[ProjectPath::root(), path(":lib")]);
    }

    #[test]
    fn layers_from_flagged_parent_deadlocks() {
        let input = r#"
PROJECT ":" {
    evaluation_depends_on_children = true
    UNIT main
}
PROJECT ":vanilla" {
    layers_from = [":"]
    UNIT main
}
"#;
        let mut ws = load_str(input, ComposerConfig::default()).expect("load");
        let err = ws.compose().unwrap_err();
        let StrataError::EvaluationDeadlock { stalled } = err else {
            panic!("expected deadlock, got {err}");
        };
        assert_eq!(stalled.len(), 2);
    }

    #[test]
    fn load_rejects_invalid_ast() {
        let file = DescriptionFile {
            projects: vec![ProjectDecl {
                path: ":child".into(),
                ..ProjectDecl::default()
            }],
        };
        assert!(load(&file, ComposerConfig::default()).is_err());
    }

    #[test]
    fn load_file_reads_description() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(LAYERED.as_bytes()).expect("write");
        let ws = load_file(file.path(), ComposerConfig::default()).expect("load");
        assert_eq!(ws.tree().len(), 1);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_file(Path::new("/nonexistent/build.strata"), ComposerConfig::default())
            .unwrap_err();
        assert!(matches!(err, StrataError::Io { .. }), "got: {err}");
    }
}
