//! Unit registry: the compilation units each project declares.
//!
//! Every unit is created with the standard scopes; the two classpath
//! scopes extend `implementation` plus their role-specific bucket so the
//! compile and runtime roles can diverge.

use strata_common::constants::{
    COMPILE_CLASSPATH, COMPILE_ONLY, IMPLEMENTATION, RUNTIME_CLASSPATH, RUNTIME_ONLY,
    STANDARD_SCOPES,
};
use strata_common::error::{Result, StrataError};
use strata_common::types::{
    ArtifactRef, Barrier, BarrierWait, ProjectPath, UnitId, UnitKind, is_identifier,
};

use crate::project::{Actor, ProjectTree};
use crate::scope::DependencyScope;

/// A named, independently classpathed partition of a project's sources.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    id: UnitId,
    kind: UnitKind,
    depends_on: Vec<String>,
    pub(crate) scopes: Vec<DependencyScope>,
}

impl CompilationUnit {
    fn new(id: UnitId, kind: UnitKind) -> Self {
        let mut scopes: Vec<DependencyScope> = STANDARD_SCOPES
            .iter()
            .map(|name| DependencyScope::new(id.scope(*name)))
            .collect();
        for scope in &mut scopes {
            let parents: &[&str] = match scope.id().scope.as_str() {
                COMPILE_CLASSPATH => &[COMPILE_ONLY, IMPLEMENTATION],
                RUNTIME_CLASSPATH => &[RUNTIME_ONLY, IMPLEMENTATION],
                _ => &[],
            };
            for parent in parents {
                scope.insert_extends(id.scope(*parent), 0);
            }
        }
        Self {
            id,
            kind,
            depends_on: Vec::new(),
            scopes,
        }
    }

    /// Identity of this unit.
    #[must_use]
    pub const fn id(&self) -> &UnitId {
        &self.id
    }

    /// Unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.id.unit
    }

    /// Declared kind.
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        self.kind
    }

    /// The artifact other units depend on.
    #[must_use]
    pub fn output(&self) -> ArtifactRef {
        ArtifactRef::Output(self.id.clone())
    }

    /// Same-project units this unit explicitly builds on.
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Scopes in declaration order.
    #[must_use]
    pub fn scopes(&self) -> &[DependencyScope] {
        &self.scopes
    }

    /// Looks up a scope by name.
    #[must_use]
    pub fn scope(&self, name: &str) -> Option<&DependencyScope> {
        self.scopes.iter().find(|s| s.id().scope == name)
    }

    pub(crate) fn scope_mut(&mut self, name: &str) -> Option<&mut DependencyScope> {
        self.scopes.iter_mut().find(|s| s.id().scope == name)
    }
}

/// The units of one project, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: Vec<CompilationUnit>,
}

impl UnitRegistry {
    fn declare(&mut self, project: &ProjectPath, name: &str, kind: UnitKind) -> Result<UnitId> {
        if !is_identifier(name) {
            return Err(StrataError::Config {
                message: format!("invalid unit name \"{name}\" in project {project}"),
            });
        }
        if self.get(name).is_some() {
            return Err(StrataError::DuplicateUnit {
                project: project.clone(),
                unit: name.to_owned(),
            });
        }
        let id = UnitId::new(project.clone(), name);
        self.units.push(CompilationUnit::new(id.clone(), kind));
        Ok(id)
    }

    /// Looks up a unit by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CompilationUnit> {
        self.units.iter().find(|u| u.name() == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut CompilationUnit> {
        self.units.iter_mut().find(|u| u.name() == name)
    }

    /// Units in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.iter()
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the project declares no unit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Result of a unit lookup that may have to wait for the owning project.
#[derive(Debug)]
pub enum UnitLookup<'a> {
    /// The unit is safe to read.
    Ready(&'a CompilationUnit),
    /// The owning project is not evaluated; wait on this barrier first.
    Pending(BarrierWait),
}

impl ProjectTree {
    /// Declares a unit in `project`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateUnit` if the name is taken, or a mutation error if
    /// `actor` may not modify `project`.
    pub fn declare_unit(
        &mut self,
        actor: &Actor,
        project: &ProjectPath,
        name: &str,
        kind: UnitKind,
    ) -> Result<UnitId> {
        let id = self.writable(actor, project)?.units.declare(project, name, kind)?;
        tracing::debug!(unit = %id, %kind, "declared unit");
        Ok(id)
    }

    /// Records that `unit` builds on the same-project unit `on`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if either unit is missing, or a `Config` error if
    /// a unit depends on itself.
    pub fn add_unit_dependency(&mut self, actor: &Actor, unit: &UnitId, on: &str) -> Result<()> {
        if unit.unit == on {
            return Err(StrataError::Config {
                message: format!("unit {unit} cannot depend on itself"),
            });
        }
        let project = self.writable(actor, &unit.project)?;
        if project.units.get(on).is_none() {
            return Err(unit_not_found(&UnitId::new(unit.project.clone(), on)));
        }
        let target = project
            .units
            .get_mut(&unit.unit)
            .ok_or_else(|| unit_not_found(unit))?;
        if !target.depends_on.iter().any(|d| d == on) {
            target.depends_on.push(on.to_owned());
        }
        Ok(())
    }

    /// Looks up a unit on behalf of `caller`.
    ///
    /// Same-project callers and declaration code read directly. A caller
    /// from another project gets [`UnitLookup::Pending`] until the target
    /// project is evaluated, so it never observes a partially built unit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project or (once readable) the unit is
    /// missing.
    pub fn lookup_unit(&self, caller: Option<&ProjectPath>, unit: &UnitId) -> Result<UnitLookup<'_>> {
        let project = self.project(&unit.project)?;
        let cross_project = caller.is_some_and(|c| c != &unit.project);
        if cross_project && !project.is_evaluated() {
            return Ok(UnitLookup::Pending(BarrierWait {
                project: unit.project.clone(),
                barrier: Barrier::SelfEvaluated,
            }));
        }
        project
            .units
            .get(&unit.unit)
            .map(UnitLookup::Ready)
            .ok_or_else(|| unit_not_found(unit))
    }

    /// Reads a unit directly, regardless of the owning project's state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project or unit is missing.
    pub fn unit(&self, unit: &UnitId) -> Result<&CompilationUnit> {
        self.project(&unit.project)?
            .units
            .get(&unit.unit)
            .ok_or_else(|| unit_not_found(unit))
    }

    pub(crate) fn unit_mut(&mut self, unit: &UnitId) -> Result<&mut CompilationUnit> {
        self.project_mut(&unit.project)?
            .units
            .get_mut(&unit.unit)
            .ok_or_else(|| unit_not_found(unit))
    }
}

pub(crate) fn unit_not_found(unit: &UnitId) -> StrataError {
    StrataError::NotFound {
        kind: "unit",
        id: unit.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use strata_common::types::ProjectState;

    use super::*;

    fn path(s: &str) -> ProjectPath {
        ProjectPath::parse(s).expect("valid path")
    }

    fn tree() -> ProjectTree {
        let mut tree = ProjectTree::new();
        tree.declare_project(ProjectPath::root(), false).expect("root");
        tree.declare_project(path(":common"), false).expect("common");
        tree
    }

    #[test]
    fn declared_unit_has_standard_scopes() {
        let mut tree = tree();
        let id = tree
            .declare_unit(&Actor::Declaration, &path(":common"), "launch", UnitKind::Bootstrap)
            .expect("declare");
        let unit = tree.unit(&id).expect("unit");
        assert_eq!(unit.kind(), UnitKind::Bootstrap);
        let names: Vec<&str> = unit.scopes().iter().map(|s| s.id().scope.as_str()).collect();
        assert_eq!(names, STANDARD_SCOPES);

        let compile = unit.scope(COMPILE_CLASSPATH).expect("compile");
        assert_eq!(
            compile.extends(),
            &[id.scope(COMPILE_ONLY), id.scope(IMPLEMENTATION)]
        );
        let runtime = unit.scope(RUNTIME_CLASSPATH).expect("runtime");
        assert_eq!(
            runtime.extends(),
            &[id.scope(RUNTIME_ONLY), id.scope(IMPLEMENTATION)]
        );
    }

    #[test]
    fn duplicate_unit_in_project_fails() {
        let mut tree = tree();
        let common = path(":common");
        let _ = tree
            .declare_unit(&Actor::Declaration, &common, "main", UnitKind::Ordinary)
            .expect("first");
        let err = tree
            .declare_unit(&Actor::Declaration, &common, "main", UnitKind::Legacy)
            .unwrap_err();
        assert!(matches!(err, StrataError::DuplicateUnit { .. }), "got: {err}");
    }

    #[test]
    fn same_name_in_different_projects_is_fine() {
        let mut tree = tree();
        let _ = tree
            .declare_unit(&Actor::Declaration, &path(":common"), "main", UnitKind::Ordinary)
            .expect("common main");
        let _ = tree
            .declare_unit(&Actor::Declaration, &ProjectPath::root(), "main", UnitKind::Ordinary)
            .expect("root main");
    }

    #[test]
    fn lookup_missing_unit_is_not_found() {
        let tree = tree();
        let err = tree
            .lookup_unit(None, &UnitId::new(path(":common"), "ghost"))
            .unwrap_err();
        assert_eq!(err.to_string(), "unit not found: :common/ghost");
    }

    #[test]
    fn cross_project_lookup_waits_for_evaluation() {
        let mut tree = tree();
        let id = tree
            .declare_unit(&Actor::Declaration, &path(":common"), "main", UnitKind::Ordinary)
            .expect("declare");
        let caller = ProjectPath::root();

        match tree.lookup_unit(Some(&caller), &id).expect("lookup") {
            UnitLookup::Pending(wait) => {
                assert_eq!(wait.project, path(":common"));
                assert_eq!(wait.barrier, Barrier::SelfEvaluated);
            }
            UnitLookup::Ready(_) => panic!("cross-project lookup must wait"),
        }
        assert!(matches!(
            tree.lookup_unit(Some(&path(":common")), &id).expect("lookup"),
            UnitLookup::Ready(_)
        ));

        tree.set_state(&path(":common"), ProjectState::Evaluated)
            .expect("state");
        assert!(matches!(
            tree.lookup_unit(Some(&caller), &id).expect("lookup"),
            UnitLookup::Ready(_)
        ));
    }

    #[test]
    fn unit_dependency_requires_existing_unit() {
        let mut tree = tree();
        let common = path(":common");
        let wrapper = tree
            .declare_unit(&Actor::Declaration, &common, "launchWrapper", UnitKind::Wrapper)
            .expect("wrapper");
        let err = tree
            .add_unit_dependency(&Actor::Declaration, &wrapper, "launch")
            .unwrap_err();
        assert!(matches!(err, StrataError::NotFound { .. }));

        let _ = tree
            .declare_unit(&Actor::Declaration, &common, "launch", UnitKind::Bootstrap)
            .expect("launch");
        tree.add_unit_dependency(&Actor::Declaration, &wrapper, "launch")
            .expect("depends");
        tree.add_unit_dependency(&Actor::Declaration, &wrapper, "launch")
            .expect("idempotent");
        assert_eq!(tree.unit(&wrapper).expect("unit").depends_on(), &["launch"]);
    }
}
