//! Abstract Syntax Tree for `.strata` description files.

use strata_common::types::UnitKind;

/// Root node of a parsed `.strata` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptionFile {
    /// Project blocks in file order.
    pub projects: Vec<ProjectDecl>,
}

/// A `PROJECT` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDecl {
    /// Project path as written (`":"`, `":common"`).
    pub path: String,
    /// `evaluation_depends_on_children` property.
    pub evaluation_depends_on_children: bool,
    /// `conventions` property; `None` defers to the composer config.
    pub conventions: Option<bool>,
    /// `layers_from` property: projects whose same-named units this
    /// project builds on.
    pub layers_from: Vec<String>,
    /// `UNIT` declarations.
    pub units: Vec<UnitDecl>,
    /// `SCOPE` blocks.
    pub scopes: Vec<ScopeDecl>,
}

/// A `UNIT` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDecl {
    /// Unit name.
    pub name: String,
    /// Declared kind, `ordinary` when omitted.
    pub kind: UnitKind,
    /// Same-project units named after `DEPENDS`.
    pub depends_on: Vec<String>,
}

/// Key of a `SCOPE` block entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKey {
    /// `artifacts`: external coordinates.
    Artifacts,
    /// `outputs`: unit outputs.
    Outputs,
    /// `uses`: scope references.
    Uses,
    /// `extends`: extends edges.
    Extends,
}

impl ScopeKey {
    /// Parses a property name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "artifacts" => Some(Self::Artifacts),
            "outputs" => Some(Self::Outputs),
            "uses" => Some(Self::Uses),
            "extends" => Some(Self::Extends),
            _ => None,
        }
    }
}

/// One reference inside a `SCOPE` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    /// Which list it appeared in.
    pub key: ScopeKey,
    /// The reference text.
    pub value: String,
}

/// A `SCOPE unit.scope { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDecl {
    /// Owning unit.
    pub unit: String,
    /// Scope name; unknown names declare a new scope.
    pub scope: String,
    /// Entries in source order.
    pub entries: Vec<ScopeEntry>,
}

impl ScopeDecl {
    /// Values listed under `key`, in source order.
    pub fn values(&self, key: ScopeKey) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |e| e.key == key)
            .map(|e| e.value.as_str())
    }
}
