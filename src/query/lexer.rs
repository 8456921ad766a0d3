//! Lexer for the query predicate language.

use winnow::ascii::space0;
use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

/// Token types for the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String), // column or function name
    Number(f64),   // numeric literal
    Str(String),   // single-quoted string literal

    // Comparison operators
    Eq, // =
    Ne, // <>
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=

    // Keywords (case-insensitive)
    And,
    Or,
    Not,
    Like,
    Is,
    Null,

    // Punctuation
    LParen,
    RParen,

    Eof,
}

type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

/// Lex an identifier or keyword. Keywords are matched case-insensitively.
fn lex_ident(input: &mut &str) -> PResult<Token> {
    let first = take_while(1.., |c: char| c.is_alphabetic() || c == '_').parse_next(input)?;
    let rest =
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_' || c == '.').parse_next(input)?;

    let s = format!("{}{}", first, rest);
    let token = match s.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "LIKE" => Token::Like,
        "IS" => Token::Is,
        "NULL" => Token::Null,
        _ => Token::Ident(s),
    };
    Ok(token)
}

/// Lex a number (integer or float, optional leading minus).
fn lex_number(input: &mut &str) -> PResult<Token> {
    let neg = winnow::combinator::opt('-').parse_next(input)?;
    let num_str = take_while(1.., |c: char| c.is_ascii_digit() || c == '.').parse_next(input)?;
    let full = if neg.is_some() {
        format!("-{}", num_str)
    } else {
        num_str.to_string()
    };
    let n: f64 = full
        .parse()
        .map_err(|_| winnow::error::ErrMode::Backtrack(winnow::error::ContextError::default()))?;
    Ok(Token::Number(n))
}

/// Lex a single-quoted string literal. No escape sequences.
fn lex_string(input: &mut &str) -> PResult<Token> {
    '\''.parse_next(input)?;
    let body = take_till(0.., '\'').parse_next(input)?;
    '\''.parse_next(input)?;
    Ok(Token::Str(body.to_string()))
}

fn lex_token(input: &mut &str) -> PResult<Token> {
    space0.parse_next(input)?;

    if input.is_empty() {
        return Ok(Token::Eof);
    }

    alt((
        // Multi-char operators first
        "<>".value(Token::Ne),
        "!=".value(Token::Ne),
        "<=".value(Token::Le),
        ">=".value(Token::Ge),
        // Single-char operators
        "=".value(Token::Eq),
        "<".value(Token::Lt),
        ">".value(Token::Gt),
        "(".value(Token::LParen),
        ")".value(Token::RParen),
        lex_string,
        lex_number,
        lex_ident,
    ))
    .parse_next(input)
}

/// Tokenize the entire input.
pub fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut remaining = input;
    let mut tokens = Vec::new();

    loop {
        match lex_token(&mut remaining) {
            Ok(Token::Eof) => break,
            Ok(tok) => tokens.push(tok),
            Err(e) => return Err(format!("Lexer error at '{}': {:?}", remaining, e)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}
