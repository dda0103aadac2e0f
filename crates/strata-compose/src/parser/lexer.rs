//! Tokenization of `.strata` source text using `nom`.
//!
//! Produces a stream of [`Token`]s from raw input for the parser to consume.
//! Whitespace and `//` line comments are discarded between tokens.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace1, not_line_ending},
    combinator::value,
    multi::many0,
    sequence::preceded,
};
use strata_common::error::{Result, StrataError};

/// A token in the `.strata` language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `PROJECT` keyword.
    Project,
    /// `UNIT` keyword.
    Unit,
    /// `KIND` keyword.
    Kind,
    /// `DEPENDS` keyword.
    Depends,
    /// `SCOPE` keyword.
    Scope,
    /// Boolean literal `true`.
    True,
    /// Boolean literal `false`.
    False,
    /// An identifier (unit, scope, kind or property name).
    Identifier(String),
    /// A double-quoted string literal.
    StringLiteral(String),
    /// `{` opening brace.
    BraceOpen,
    /// `}` closing brace.
    BraceClose,
    /// `[` opening bracket.
    BracketOpen,
    /// `]` closing bracket.
    BracketClose,
    /// `.` between a unit and a scope name.
    Dot,
    /// `=` assignment.
    Equals,
    /// `,` comma separator.
    Comma,
}

/// Skippable items: whitespace or line comments.
fn skip_trivia(input: &str) -> IResult<&str, ()> {
    let comment = value((), preceded(tag("//"), not_line_ending));
    let ws = value((), multispace1);
    let (input, _) = many0(alt((ws, comment))).parse(input)?;
    Ok((input, ()))
}

/// Parses a double-quoted string literal with basic escape support.
fn string_literal(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('"').parse(input)?;
    let mut result = String::new();
    let mut chars = input.char_indices();
    loop {
        match chars.next() {
            Some((idx, '"')) => {
                let remaining = &input[idx + 1..];
                return Ok((remaining, Token::StringLiteral(result)));
            }
            Some((_, '\\')) => match chars.next() {
                Some((_, '\\')) => result.push('\\'),
                Some((_, '"')) => result.push('"'),
                Some((_, c)) => {
                    result.push('\\');
                    result.push(c);
                }
                None => {
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Char,
                    )));
                }
            },
            Some((_, '\n')) | None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Char,
                )));
            }
            Some((_, c)) => result.push(c),
        }
    }
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parses an identifier or keyword.
fn identifier_or_keyword(input: &str) -> IResult<&str, Token> {
    let (input, first) = take_while1(is_ident_start).parse(input)?;
    let (input, rest) = take_while(is_ident_continue).parse(input)?;
    let word = format!("{first}{rest}");
    let token = match word.as_str() {
        "PROJECT" => Token::Project,
        "UNIT" => Token::Unit,
        "KIND" => Token::Kind,
        "DEPENDS" => Token::Depends,
        "SCOPE" => Token::Scope,
        "true" => Token::True,
        "false" => Token::False,
        _ => Token::Identifier(word),
    };
    Ok((input, token))
}

/// Parses a symbol token.
fn symbol(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::BraceOpen, char('{')),
        value(Token::BraceClose, char('}')),
        value(Token::BracketOpen, char('[')),
        value(Token::BracketClose, char(']')),
        value(Token::Dot, char('.')),
        value(Token::Equals, char('=')),
        value(Token::Comma, char(',')),
    ))
    .parse(input)
}

/// Parses a single token (after trivia has been skipped).
fn single_token(input: &str) -> IResult<&str, Token> {
    alt((string_literal, symbol, identifier_or_keyword)).parse(input)
}

/// Tokenizes a `.strata` source string into a vector of tokens.
///
/// Whitespace and `//` line comments are discarded.
///
/// # Errors
///
/// Returns a `Parse` error if the input contains characters that cannot
/// be tokenized or an unterminated string.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, ()) = skip_trivia(remaining).map_err(|e| StrataError::Parse {
            message: format!("lexer error skipping whitespace: {e}"),
        })?;
        remaining = rest;

        if remaining.is_empty() {
            break;
        }

        let (rest, token) = single_token(remaining).map_err(|e| StrataError::Parse {
            message: format!(
                "line {}: unexpected input at \"{}\" ({e})",
                line_of(input, remaining),
                remaining.chars().take(20).collect::<String>()
            ),
        })?;
        tokens.push(token);
        remaining = rest;
    }

    tracing::debug!(tokens = tokens.len(), "tokenized description");
    Ok(tokens)
}

fn line_of(input: &str, remaining: &str) -> usize {
    let consumed = input.len() - remaining.len();
    input[..consumed].matches('\n').count() + 1
}
