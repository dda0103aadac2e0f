//! `.strata` description parser built on `nom`.
//!
//! Transforms raw `.strata` text into a validated AST through
//! lexing, parsing, and static analysis phases.

pub mod ast;
pub mod lexer;
pub mod reference;
pub mod validator;

use strata_common::error::{Result, StrataError};
use strata_common::types::UnitKind;

use self::ast::{DescriptionFile, ProjectDecl, ScopeDecl, ScopeEntry, ScopeKey, UnitDecl};
use self::lexer::Token;

/// Cursor into a token stream for recursive-descent parsing.
struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    const fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Identifier(s)) => Ok(s.clone()),
            other => Err(parse_err(format!("expected identifier, got {other:?}"))),
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(tok) if tok == expected => Ok(()),
            other => Err(parse_err(format!("expected {expected:?}, got {other:?}"))),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::StringLiteral(s)) => Ok(s.clone()),
            other => Err(parse_err(format!("expected string literal, got {other:?}"))),
        }
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

const fn parse_err(message: String) -> StrataError {
    StrataError::Parse { message }
}

fn skip_optional_comma(cursor: &mut TokenCursor<'_>) {
    let _ = cursor.eat(&Token::Comma);
}

/// Parses a `.strata` description from its source text.
///
/// # Errors
///
/// Returns a `Parse` error for syntax errors, or a validation error if
/// the description is inconsistent.
pub fn parse_description(input: &str) -> Result<DescriptionFile> {
    tracing::info!("parsing .strata input");
    let tokens = lexer::tokenize(input)?;
    let mut cursor = TokenCursor::new(&tokens);
    let file = parse_file(&mut cursor)?;
    validator::validate(&file)?;
    Ok(file)
}

fn parse_file(cursor: &mut TokenCursor<'_>) -> Result<DescriptionFile> {
    let mut file = DescriptionFile::default();

    while let Some(tok) = cursor.peek() {
        match tok {
            Token::Project => file.projects.push(parse_project(cursor)?),
            other => {
                return Err(parse_err(format!(
                    "expected PROJECT at top level, got {other:?}"
                )));
            }
        }
    }

    Ok(file)
}

fn parse_project(cursor: &mut TokenCursor<'_>) -> Result<ProjectDecl> {
    cursor.expect_token(&Token::Project)?;
    let path = cursor.expect_string()?;
    cursor.expect_token(&Token::BraceOpen)?;

    let mut project = ProjectDecl {
        path,
        ..ProjectDecl::default()
    };

    loop {
        match cursor.peek() {
            Some(Token::BraceClose) => break,
            Some(Token::Unit) => project.units.push(parse_unit(cursor)?),
            Some(Token::Scope) => project.scopes.push(parse_scope(cursor)?),
            Some(Token::Identifier(_)) => parse_property(cursor, &mut project)?,
            Some(other) => {
                return Err(parse_err(format!(
                    "expected UNIT, SCOPE or a property in PROJECT \"{}\", got {other:?}",
                    project.path
                )));
            }
            None => {
                return Err(parse_err(format!(
                    "unexpected end of input inside PROJECT \"{}\"",
                    project.path
                )));
            }
        }
    }

    cursor.expect_token(&Token::BraceClose)?;
    Ok(project)
}

fn parse_property(cursor: &mut TokenCursor<'_>, project: &mut ProjectDecl) -> Result<()> {
    let key = cursor.expect_identifier()?;
    cursor.expect_token(&Token::Equals)?;

    match key.as_str() {
        "evaluation_depends_on_children" => {
            project.evaluation_depends_on_children = parse_bool(cursor)?;
        }
        "conventions" => project.conventions = Some(parse_bool(cursor)?),
        "layers_from" => project.layers_from = parse_string_list(cursor)?,
        _ => {
            return Err(parse_err(format!("unknown project property: {key}")));
        }
    }

    Ok(())
}

fn parse_bool(cursor: &mut TokenCursor<'_>) -> Result<bool> {
    match cursor.advance() {
        Some(Token::True) => Ok(true),
        Some(Token::False) => Ok(false),
        other => Err(parse_err(format!("expected true or false, got {other:?}"))),
    }
}

fn parse_unit(cursor: &mut TokenCursor<'_>) -> Result<UnitDecl> {
    cursor.expect_token(&Token::Unit)?;
    let name = cursor.expect_identifier()?;

    let kind = if cursor.eat(&Token::Kind) {
        let word = cursor.expect_identifier()?;
        word.parse::<UnitKind>()
            .map_err(|_| parse_err(format!("unknown unit kind \"{word}\" for unit {name}")))?
    } else {
        UnitKind::default()
    };

    let depends_on = if cursor.eat(&Token::Depends) {
        parse_identifier_list(cursor)?
    } else {
        Vec::new()
    };

    Ok(UnitDecl {
        name,
        kind,
        depends_on,
    })
}

fn parse_scope(cursor: &mut TokenCursor<'_>) -> Result<ScopeDecl> {
    cursor.expect_token(&Token::Scope)?;
    let unit = cursor.expect_identifier()?;
    cursor.expect_token(&Token::Dot)?;
    let scope = cursor.expect_identifier()?;
    cursor.expect_token(&Token::BraceOpen)?;

    let mut entries = Vec::new();
    while cursor.peek() != Some(&Token::BraceClose) {
        if cursor.at_end() {
            return Err(parse_err(format!(
                "unexpected end of input inside SCOPE {unit}.{scope}"
            )));
        }
        let name = cursor.expect_identifier()?;
        let key = ScopeKey::from_name(&name)
            .ok_or_else(|| parse_err(format!("unknown scope property: {name}")))?;
        cursor.expect_token(&Token::Equals)?;
        entries.extend(
            parse_string_list(cursor)?
                .into_iter()
                .map(|value| ScopeEntry { key, value }),
        );
        skip_optional_comma(cursor);
    }

    cursor.expect_token(&Token::BraceClose)?;
    Ok(ScopeDecl {
        unit,
        scope,
        entries,
    })
}

fn parse_string_list(cursor: &mut TokenCursor<'_>) -> Result<Vec<String>> {
    cursor.expect_token(&Token::BracketOpen)?;
    let mut items = Vec::new();

    while cursor.peek() != Some(&Token::BracketClose) {
        if cursor.at_end() {
            return Err(parse_err("unexpected end of input inside list".into()));
        }
        items.push(cursor.expect_string()?);
        skip_optional_comma(cursor);
    }

    cursor.expect_token(&Token::BracketClose)?;
    Ok(items)
}

fn parse_identifier_list(cursor: &mut TokenCursor<'_>) -> Result<Vec<String>> {
    cursor.expect_token(&Token::BracketOpen)?;
    let mut items = Vec::new();

    while cursor.peek() != Some(&Token::BracketClose) {
        if cursor.at_end() {
            return Err(parse_err("unexpected end of input inside DEPENDS list".into()));
        }
        items.push(cursor.expect_identifier()?);
        skip_optional_comma(cursor);
    }

    cursor.expect_token(&Token::BracketClose)?;
    Ok(items)
}
