//! Kind-based layer wiring between the units of a project.
//!
//! A unit "builds on" a lower unit when it sees the lower unit's output
//! and everything its `implementation` scope exposes. Layers, bottom-up:
//!
//! | kind                  | builds on                         |
//! |-----------------------|-----------------------------------|
//! | bootstrap, wrapper    | nothing (wrappers use `depends_on`) |
//! | accessor              | bootstrap                         |
//! | ordinary, legacy      | bootstrap, accessor               |
//! | transform             | bootstrap, accessor, ordinary     |

use strata_common::constants::IMPLEMENTATION;
use strata_common::error::{Result, StrataError};
use strata_common::types::{ProjectPath, UnitId, UnitKind};

use crate::scheduler::ProjectContext;
use crate::scope::{Edge, ReferenceTarget};

/// Kinds a unit of `kind` builds on by convention.
#[must_use]
pub const fn layers_below(kind: UnitKind) -> &'static [UnitKind] {
    match kind {
        UnitKind::Bootstrap | UnitKind::Wrapper => &[],
        UnitKind::Accessor => &[UnitKind::Bootstrap],
        UnitKind::Ordinary | UnitKind::Legacy => &[UnitKind::Bootstrap, UnitKind::Accessor],
        UnitKind::Transform => &[UnitKind::Bootstrap, UnitKind::Accessor, UnitKind::Ordinary],
    }
}

/// Makes `unit` build on `lower`: `lower`'s output becomes a direct
/// dependency of `unit.implementation`, which also extends
/// `lower.implementation`. A `lower` in another project is deferred.
///
/// # Errors
///
/// Returns a mutation, lookup or cycle error from the scope graph.
pub fn wire(cx: &mut ProjectContext<'_>, unit: &UnitId, lower: &UnitId) -> Result<()> {
    let scope = unit.scope(IMPLEMENTATION);
    cx.link(&scope, Edge::Dependency(ReferenceTarget::Output(lower.clone())))?;
    cx.link(&scope, Edge::Extends(lower.scope(IMPLEMENTATION)))?;
    tracing::debug!(%unit, %lower, "wired layer");
    Ok(())
}

/// Wires every unit of `project` to the units named in its `depends_on`.
///
/// # Errors
///
/// See [`wire`].
pub fn wire_unit_dependencies(cx: &mut ProjectContext<'_>, project: &ProjectPath) -> Result<()> {
    let pairs: Vec<(UnitId, UnitId)> = cx
        .tree()
        .project(project)?
        .units()
        .iter()
        .flat_map(|unit| {
            unit.depends_on()
                .iter()
                .map(move |on| (unit.id().clone(), UnitId::new(project.clone(), on.as_str())))
        })
        .collect();
    for (unit, lower) in &pairs {
        wire(cx, unit, lower)?;
    }
    Ok(())
}

/// Wires every unit of `project` to the project's units of the kinds
/// given by [`layers_below`], in unit declaration order.
///
/// # Errors
///
/// See [`wire`].
pub fn apply_layer_conventions(cx: &mut ProjectContext<'_>, project: &ProjectPath) -> Result<()> {
    let units: Vec<(UnitId, UnitKind)> = cx
        .tree()
        .project(project)?
        .units()
        .iter()
        .map(|u| (u.id().clone(), u.kind()))
        .collect();
    let mut wired = 0_usize;
    for (unit, kind) in &units {
        for (lower, lower_kind) in &units {
            if lower != unit && layers_below(*kind).contains(lower_kind) {
                wire(cx, unit, lower)?;
                wired += 1;
            }
        }
    }
    tracing::debug!(project = %project, wired, "applied layer conventions");
    Ok(())
}

/// Once `from` is evaluated, wires each unit of the context's project to
/// the unit of the same name in `from`. Names `from` lacks are skipped.
///
/// # Errors
///
/// Returns an error if `from` is not declared or the context has no
/// owning project.
pub fn inherit_layers(cx: &mut ProjectContext<'_>, from: &ProjectPath) -> Result<()> {
    let Some(owner) = cx.owner().cloned() else {
        return Err(StrataError::Config {
            message: format!("{} cannot inherit layers from {from}", cx.actor()),
        });
    };
    let source = from.clone();
    cx.after_evaluated(from, move |cx| {
        let pairs: Vec<(UnitId, UnitId)> = {
            let tree = cx.tree();
            let inherited = tree.project(&source)?.units();
            tree.project(&owner)?
                .units()
                .iter()
                .filter_map(|unit| {
                    inherited
                        .get(unit.name())
                        .map(|lower| (unit.id().clone(), lower.id().clone()))
                })
                .collect()
        };
        tracing::debug!(project = %owner, from = %source, units = pairs.len(), "inheriting layers");
        for (unit, lower) in &pairs {
            wire(cx, unit, lower)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use strata_common::config::ComposerConfig;
    use strata_common::types::{ArtifactRef, Role};

    use super::*;
    use crate::classpath::compose_classpath;
    use crate::project::{Actor, ProjectTree};
    use crate::scheduler::Scheduler;

    fn path(s: &str) -> ProjectPath {
        ProjectPath::parse(s).expect("valid path")
    }

    fn declare(tree: &mut ProjectTree, project: &ProjectPath, units: &[(&str, UnitKind)]) -> Vec<UnitId> {
        units
            .iter()
            .map(|(name, kind)| {
                tree.declare_unit(&Actor::Declaration, project, name, *kind)
                    .expect("unit")
            })
            .collect()
    }

    fn outputs(entries: &[ArtifactRef]) -> Vec<String> {
        entries.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn layers_are_strictly_below() {
        for kind in UnitKind::ALL {
            assert!(!layers_below(kind).contains(&kind));
            for lower in layers_below(kind) {
                assert!(!layers_below(*lower).contains(&kind));
            }
        }
        assert_eq!(layers_below(UnitKind::Legacy), layers_below(UnitKind::Ordinary));
    }

    #[test]
    fn conventions_order_layers_bottom_up() {
        let mut tree = ProjectTree::new();
        let root = ProjectPath::root();
        tree.declare_project(root.clone(), false).expect("root");
        let ids = declare(
            &mut tree,
            &root,
            &[
                ("main", UnitKind::Ordinary),
                ("mixins", UnitKind::Transform),
                ("accessors", UnitKind::Accessor),
                ("launch", UnitKind::Bootstrap),
            ],
        );
        let mut scheduler = Scheduler::new();
        let project = root.clone();
        scheduler.configure(root, move |cx| apply_layer_conventions(cx, &project));
        scheduler
            .evaluate(&mut tree, &ComposerConfig::default())
            .expect("evaluate");

        let mixins = compose_classpath(&tree, &ids[1], Role::Compile).expect("mixins");
        assert_eq!(outputs(&mixins), vec![":/main", ":/accessors", ":/launch", ":/mixins"]);
        let accessors = compose_classpath(&tree, &ids[2], Role::Runtime).expect("accessors");
        assert_eq!(outputs(&accessors), vec![":/launch", ":/accessors"]);
        let launch = compose_classpath(&tree, &ids[3], Role::Compile).expect("launch");
        assert_eq!(outputs(&launch), vec![":/launch"]);
    }

    #[test]
    fn wrapper_builds_only_on_declared_dependencies() {
        let mut tree = ProjectTree::new();
        let root = ProjectPath::root();
        tree.declare_project(root.clone(), false).expect("root");
        let ids = declare(
            &mut tree,
            &root,
            &[("launch", UnitKind::Bootstrap), ("launchWrapper", UnitKind::Wrapper)],
        );
        tree.add_unit_dependency(&Actor::Declaration, &ids[1], "launch")
            .expect("depends");
        let mut scheduler = Scheduler::new();
        let project = root.clone();
        scheduler.configure(root, move |cx| {
            wire_unit_dependencies(cx, &project)?;
            apply_layer_conventions(cx, &project)
        });
        scheduler
            .evaluate(&mut tree, &ComposerConfig::default())
            .expect("evaluate");
        let wrapper = compose_classpath(&tree, &ids[1], Role::Compile).expect("wrapper");
        assert_eq!(outputs(&wrapper), vec![":/launch", ":/launchWrapper"]);
    }

    #[test]
    fn explicit_dependency_against_layers_is_a_cycle() {
        let mut tree = ProjectTree::new();
        let root = ProjectPath::root();
        tree.declare_project(root.clone(), false).expect("root");
        let ids = declare(
            &mut tree,
            &root,
            &[("launch", UnitKind::Bootstrap), ("accessors", UnitKind::Accessor)],
        );
        tree.add_unit_dependency(&Actor::Declaration, &ids[0], "accessors")
            .expect("depends");
        let mut scheduler = Scheduler::new();
        let project = root.clone();
        scheduler.configure(root, move |cx| {
            wire_unit_dependencies(cx, &project)?;
            apply_layer_conventions(cx, &project)
        });
        let err = scheduler
            .evaluate(&mut tree, &ComposerConfig::default())
            .unwrap_err();
        assert!(matches!(err, StrataError::CyclicScope { .. }), "got: {err}");
    }

    #[test]
    fn inherited_layers_wait_for_source_project() {
        let mut tree = ProjectTree::new();
        let root = ProjectPath::root();
        let common = path(":common");
        tree.declare_project(root.clone(), false).expect("root");
        tree.declare_project(common.clone(), false).expect("common");
        let own = declare(&mut tree, &root, &[("launch", UnitKind::Bootstrap), ("extra", UnitKind::Ordinary)]);
        let _ = declare(&mut tree, &common, &[("launch", UnitKind::Bootstrap)]);

        let mut scheduler = Scheduler::new();
        let source = common.clone();
        scheduler.configure(root.clone(), move |cx| inherit_layers(cx, &source));
        scheduler
            .evaluate(&mut tree, &ComposerConfig::default())
            .expect("evaluate");

        assert_eq!(scheduler.evaluation_order(), &[common, root]);
        let launch = compose_classpath(&tree, &own[0], Role::Compile).expect("launch");
        assert_eq!(outputs(&launch), vec![":common/launch", ":/launch"]);
        let extra = compose_classpath(&tree, &own[1], Role::Compile).expect("extra");
        assert_eq!(outputs(&extra), vec![":/extra"]);
    }
}
