//! Domain primitive types used across the strata workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{COMPILE_CLASSPATH, ROOT_PATH, RUNTIME_CLASSPATH};
use crate::error::{Result, StrataError};

/// Returns `true` if `s` is a valid identifier for a project segment,
/// unit, or scope name.
///
/// Identifiers start with an ASCII letter or `_` and continue with ASCII
/// alphanumerics, `_` or `-`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Path of a project in the project tree.
///
/// `:` is the root project; `:common` is a child of the root and
/// `:common:api` a child of `:common`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectPath(String);

impl ProjectPath {
    /// Returns the root project path (`:`).
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT_PATH.to_owned())
    }

    /// Parses and validates a project path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not start with `:` or contains an
    /// invalid segment.
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path == ROOT_PATH {
            return Ok(Self(path));
        }
        match path.strip_prefix(':') {
            Some(rest) if rest.split(':').all(is_identifier) => Ok(Self(path)),
            _ => Err(StrataError::Config {
                message: format!("invalid project path: \"{path}\""),
            }),
        }
    }

    /// Returns `true` for the root project.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_PATH
    }

    /// Returns the parent project path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(':') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_owned())),
            None => None,
        }
    }

    /// Returns the last segment of the path (empty for the root).
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }

    /// Returns the path of a direct child project.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid identifier.
    pub fn child(&self, name: &str) -> Result<Self> {
        if self.is_root() {
            Self::parse(format!(":{name}"))
        } else {
            Self::parse(format!("{}:{name}", self.0))
        }
    }

    /// Number of segments between this project and the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches(':').count()
        }
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectPath {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProjectPath {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.0
    }
}

/// Role a compilation unit plays in the layered build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// A plain source set (`main`).
    #[default]
    Ordinary,
    /// Bootstrap/launch layer loaded before everything else.
    Bootstrap,
    /// Accessor interfaces onto otherwise inaccessible members.
    Accessor,
    /// Bytecode transformation ("mixin") layer.
    Transform,
    /// Wrapper around another layer, wired through explicit `depends_on`.
    Wrapper,
    /// Legacy unit slated for removal; resolved like any other unit.
    Legacy,
}

impl UnitKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Ordinary,
        Self::Bootstrap,
        Self::Accessor,
        Self::Transform,
        Self::Wrapper,
        Self::Legacy,
    ];

    /// Returns the lowercase keyword for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ordinary => "ordinary",
            Self::Bootstrap => "bootstrap",
            Self::Accessor => "accessor",
            Self::Transform => "transform",
            Self::Wrapper => "wrapper",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StrataError::Config {
                message: format!("unknown unit kind: \"{s}\""),
            })
    }
}

/// Classpath role requested from the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Compile-time visibility.
    Compile,
    /// Run-time visibility.
    Runtime,
}

impl Role {
    /// All roles, in composition order.
    pub const ALL: [Self; 2] = [Self::Compile, Self::Runtime];

    /// Name of the scope composed for this role.
    #[must_use]
    pub const fn scope_name(self) -> &'static str {
        match self {
            Self::Compile => COMPILE_CLASSPATH,
            Self::Runtime => RUNTIME_CLASSPATH,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

impl FromStr for Role {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "compile" => Ok(Self::Compile),
            "runtime" => Ok(Self::Runtime),
            other => Err(StrataError::Config {
                message: format!("unknown classpath role: \"{other}\""),
            }),
        }
    }
}

/// Named checkpoint in a project's evaluation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Barrier {
    /// Every direct child project has fired [`Barrier::SelfEvaluated`].
    ChildrenEvaluated,
    /// The project itself is evaluated and frozen.
    SelfEvaluated,
}

impl fmt::Display for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChildrenEvaluated => write!(f, "children-evaluated"),
            Self::SelfEvaluated => write!(f, "self-evaluated"),
        }
    }
}

/// Lifecycle state of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectState {
    /// Units are being declared; configuration has not run.
    Declared,
    /// Configuration ran; deferred references may still be outstanding.
    Configuring,
    /// Frozen; other projects may read it.
    Evaluated,
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared => write!(f, "declared"),
            Self::Configuring => write!(f, "configuring"),
            Self::Evaluated => write!(f, "evaluated"),
        }
    }
}

/// A barrier on a specific project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BarrierWait {
    /// Project owning the barrier.
    pub project: ProjectPath,
    /// The awaited checkpoint.
    pub barrier: Barrier,
}

impl fmt::Display for BarrierWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.project, self.barrier)
    }
}

/// Identity of a compilation unit: `<project>/<unit>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId {
    /// Owning project.
    pub project: ProjectPath,
    /// Unit name, unique within the project.
    pub unit: String,
}

impl UnitId {
    /// Creates a unit identifier.
    #[must_use]
    pub fn new(project: ProjectPath, unit: impl Into<String>) -> Self {
        Self {
            project,
            unit: unit.into(),
        }
    }

    /// Returns the identifier of a scope of this unit.
    #[must_use]
    pub fn scope(&self, scope: impl Into<String>) -> ScopeId {
        ScopeId {
            project: self.project.clone(),
            unit: self.unit.clone(),
            scope: scope.into(),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.unit)
    }
}

impl FromStr for UnitId {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || StrataError::Config {
            message: format!("invalid unit identifier: \"{s}\""),
        };
        let (project, unit) = s.rsplit_once('/').ok_or_else(invalid)?;
        if !is_identifier(unit) {
            return Err(invalid());
        }
        Ok(Self::new(ProjectPath::parse(project)?, unit))
    }
}

impl TryFrom<String> for UnitId {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.to_string()
    }
}

/// Identity of a dependency scope: `<project>/<unit>.<scope>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeId {
    /// Owning project.
    pub project: ProjectPath,
    /// Owning unit.
    pub unit: String,
    /// Scope name, unique within the unit.
    pub scope: String,
}

impl ScopeId {
    /// Creates a scope identifier.
    #[must_use]
    pub fn new(project: ProjectPath, unit: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            project,
            unit: unit.into(),
            scope: scope.into(),
        }
    }

    /// Returns the identifier of the owning unit.
    #[must_use]
    pub fn unit_id(&self) -> UnitId {
        UnitId::new(self.project.clone(), self.unit.clone())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.project, self.unit, self.scope)
    }
}

impl FromStr for ScopeId {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || StrataError::Config {
            message: format!("invalid scope identifier: \"{s}\""),
        };
        let (project, rest) = s.rsplit_once('/').ok_or_else(invalid)?;
        let (unit, scope) = rest.split_once('.').ok_or_else(invalid)?;
        if !is_identifier(unit) || !is_identifier(scope) {
            return Err(invalid());
        }
        Ok(Self::new(ProjectPath::parse(project)?, unit, scope))
    }
}

impl TryFrom<String> for ScopeId {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ScopeId> for String {
    fn from(id: ScopeId) -> Self {
        id.to_string()
    }
}

/// Returns `true` if `s` looks like an external `group:name[:version...]`
/// coordinate.
pub fn is_coordinate(s: &str) -> bool {
    !s.contains('/')
        && !s.chars().any(char::is_whitespace)
        && s.split(':').count() >= 2
        && s.split(':').all(|part| !part.is_empty())
}

/// An entry of a composed classpath.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArtifactRef {
    /// The compiled output of a compilation unit.
    Output(UnitId),
    /// An external artifact coordinate, opaque to the composer.
    External(String),
}

impl ArtifactRef {
    /// Creates an external artifact reference.
    ///
    /// # Errors
    ///
    /// Returns an error if `coordinate` is not a `group:name[:version]`
    /// coordinate.
    pub fn external(coordinate: impl Into<String>) -> Result<Self> {
        let coordinate = coordinate.into();
        if is_coordinate(&coordinate) {
            Ok(Self::External(coordinate))
        } else {
            Err(StrataError::Config {
                message: format!("invalid artifact coordinate: \"{coordinate}\""),
            })
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(unit) => write!(f, "{unit}"),
            Self::External(coordinate) => f.write_str(coordinate),
        }
    }
}

impl FromStr for ArtifactRef {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        if s.contains('/') {
            Ok(Self::Output(s.parse()?))
        } else {
            Self::external(s)
        }
    }
}

impl TryFrom<String> for ArtifactRef {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ArtifactRef> for String {
    fn from(artifact: ArtifactRef) -> Self {
        artifact.to_string()
    }
}

/// SHA-256 hash digest used to fingerprint a composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Creates a hash from a hex-encoded string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid 64-character hex string.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != crate::constants::SHA256_HEX_LENGTH
            || !hex.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(StrataError::Config {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(hex))
    }

    /// Returns the hex-encoded hash string.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}
