//! Reference syntax inside `SCOPE` blocks, parsed with `nom`.
//!
//! - scope: `unit.scope` or `:path/unit.scope`
//! - output: `unit` or `:path/unit`
//! - artifact: `group:name[:version]`
//!
//! A missing path means the declaring project.

use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::{all_consuming, opt},
    sequence::{preceded, terminated},
};
use strata_common::error::{Result, StrataError};
use strata_common::types::{ProjectPath, ScopeId, UnitId, is_coordinate, is_identifier};

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char).parse(input)
}

fn project_prefix(input: &str) -> IResult<&str, &str> {
    terminated(take_while1(|c: char| c == ':' || is_name_char(c)), char('/')).parse(input)
}

fn scope_ref(input: &str) -> IResult<&str, (Option<&str>, &str, &str)> {
    all_consuming((opt(project_prefix), name, preceded(char('.'), name))).parse(input)
}

fn output_ref(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    all_consuming((opt(project_prefix), name)).parse(input)
}

fn malformed(text: &str, expected: &str) -> StrataError {
    StrataError::Parse {
        message: format!("malformed reference \"{text}\", expected {expected}"),
    }
}

fn resolve_project(prefix: Option<&str>, current: &ProjectPath) -> Result<ProjectPath> {
    prefix.map_or_else(|| Ok(current.clone()), ProjectPath::parse)
}

fn checked_name<'a>(text: &str, name: &'a str) -> Result<&'a str> {
    if is_identifier(name) {
        Ok(name)
    } else {
        Err(StrataError::Parse {
            message: format!("invalid name \"{name}\" in reference \"{text}\""),
        })
    }
}

/// Parses a scope reference relative to `current`.
///
/// # Errors
///
/// Returns a `Parse` error for malformed text or an invalid path.
pub fn parse_scope_ref(text: &str, current: &ProjectPath) -> Result<ScopeId> {
    let (_, (prefix, unit, scope)) =
        scope_ref(text).map_err(|_| malformed(text, "[:path/]unit.scope"))?;
    Ok(ScopeId::new(
        resolve_project(prefix, current)?,
        checked_name(text, unit)?,
        checked_name(text, scope)?,
    ))
}

/// Parses a unit output reference relative to `current`.
///
/// # Errors
///
/// Returns a `Parse` error for malformed text or an invalid path.
pub fn parse_output_ref(text: &str, current: &ProjectPath) -> Result<UnitId> {
    let (_, (prefix, unit)) = output_ref(text).map_err(|_| malformed(text, "[:path/]unit"))?;
    Ok(UnitId::new(
        resolve_project(prefix, current)?,
        checked_name(text, unit)?,
    ))
}

/// Checks an external artifact coordinate.
///
/// # Errors
///
/// Returns a `Parse` error if `text` is not `group:name[:version]`.
pub fn parse_artifact(text: &str) -> Result<String> {
    if is_coordinate(text) {
        Ok(text.to_owned())
    } else {
        Err(malformed(text, "group:name[:version]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ProjectPath {
        ProjectPath::parse(s).expect("valid path")
    }

    #[test]
    fn local_scope_ref_uses_current_project() {
        let id = parse_scope_ref("launch.implementation", &path(":common")).expect("parse");
        assert_eq!(id, ScopeId::new(path(":common"), "launch", "implementation"));
    }

    #[test]
    fn qualified_scope_ref() {
        let id = parse_scope_ref(":common:api/main.compileOnly", &ProjectPath::root())
            .expect("parse");
        assert_eq!(id.project, path(":common:api"));
        assert_eq!(id.unit, "main");
        assert_eq!(id.scope, "compileOnly");
    }

    #[test]
    fn root_qualified_output_ref() {
        let id = parse_output_ref(":/mixins", &path(":vanilla")).expect("parse");
        assert_eq!(id, UnitId::new(ProjectPath::root(), "mixins"));
    }

    #[test]
    fn malformed_references_rejected() {
        let here = ProjectPath::root();
        assert!(parse_scope_ref("launch", &here).is_err());
        assert!(parse_scope_ref("a.b.c", &here).is_err());
        assert!(parse_output_ref("main.implementation", &here).is_err());
        assert!(parse_output_ref("common/main", &here).is_err());
        assert!(parse_output_ref(":/1main", &here).is_err());
    }

    #[test]
    fn artifact_coordinates() {
        assert_eq!(
            parse_artifact("org.ow2.asm:asm:9.2").expect("coordinate"),
            "org.ow2.asm:asm:9.2"
        );
        assert!(parse_artifact("asm").is_err());
        assert!(parse_artifact(":/main").is_err());
    }
}
