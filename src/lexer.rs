//! Lexical analysis: turns a source line into a flat stream of [`Token`]s.
//!
//! The algorithm is left-to-right maximal munch against an ordered table of
//! definitions (see [`lex_one`]); the first definition that matches at least
//! one character wins. This mirrors the `TokenLexDefinition` table approach
//! of the shell this crate's bytecode pipeline is modeled on, rather than a
//! hand-rolled per-character state machine: every token type is produced by
//! exactly one named matcher, and the ordering below *is* the grammar.

use crate::token::{Token, TokenType};

/// Lexes `source` in its entirety. Never fails: unclassifiable input produces
/// a single-character `Unknown` token and advances one character, so every
/// byte of `source` is always accounted for in the returned stream.
pub fn lex_all(source: &str) -> Vec<Token> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let (token, consumed) = lex_one(&chars[pos..]);
        debug_assert!(consumed >= 1);
        pos += consumed;
        tokens.push(token);
    }
    tokens
}

/// Matches the longest prefix of `chars` against the canonical definition
/// table and returns the resulting token plus how many characters it ate.
fn lex_one(chars: &[char]) -> (Token, usize) {
    if let Some(n) = match_whitespace(chars) {
        return (Token::new(TokenType::Whitespace, take(chars, n)), n);
    }
    if let Some(n) = match_literal(chars, "\n") {
        return (Token::new(TokenType::EndOfStatement, take(chars, n)), n);
    }
    if let Some(n) = match_literal(chars, ";") {
        return (Token::new(TokenType::EndOfStatement, take(chars, n)), n);
    }
    if let Some(n) = match_literal(chars, "\"") {
        return (Token::new(TokenType::Quotes, take(chars, n)), n);
    }
    if let Some(n) = match_literal(chars, "=") {
        return (Token::new(TokenType::Assignment, take(chars, n)), n);
    }
    if let Some(n) = match_literal(chars, "$") {
        return (Token::new(TokenType::Dollar, take(chars, n)), n);
    }
    if let Some(n) = match_literal(chars, "{") {
        return (Token::new(TokenType::LeftBrace, take(chars, n)), n);
    }
    if let Some(n) = match_literal(chars, "}") {
        return (Token::new(TokenType::RightBrace, take(chars, n)), n);
    }
    if let Some(n) = match_keyword(chars, "if") {
        return (Token::new(TokenType::If, take(chars, n)), n);
    }
    if let Some(n) = match_keyword(chars, "then") {
        return (Token::new(TokenType::Then, take(chars, n)), n);
    }
    if let Some(n) = match_keyword(chars, "else") {
        return (Token::new(TokenType::Else, take(chars, n)), n);
    }
    if let Some(n) = match_keyword(chars, "fi") {
        return (Token::new(TokenType::Fi, take(chars, n)), n);
    }
    if let Some(n) = match_symbol(chars) {
        return (Token::new(TokenType::Symbol, take(chars, n)), n);
    }
    (Token::new(TokenType::Unknown, chars[0].to_string()), 1)
}

fn take(chars: &[char], n: usize) -> String {
    chars[..n].iter().collect()
}

fn match_literal(chars: &[char], pattern: &str) -> Option<usize> {
    let pat: Vec<char> = pattern.chars().collect();
    if chars.len() >= pat.len() && chars[..pat.len()] == pat[..] {
        Some(pat.len())
    } else {
        None
    }
}

/// A run of whitespace that excludes `\n` (the newline has its own, higher
/// priority, `EndOfStatement` definition).
fn match_whitespace(chars: &[char]) -> Option<usize> {
    let mut n = 0;
    while n < chars.len() && chars[n].is_whitespace() && chars[n] != '\n' {
        n += 1;
    }
    (n > 0).then_some(n)
}

/// A run of `[A-Za-z0-9_?]`. `?` is admitted so that `$?` lexes as
/// `Dollar` + `Symbol("?")`.
fn match_symbol(chars: &[char]) -> Option<usize> {
    let mut n = 0;
    while n < chars.len() && (chars[n].is_alphanumeric() || chars[n] == '_' || chars[n] == '?') {
        n += 1;
    }
    (n > 0).then_some(n)
}

/// A keyword matches only when `pattern` exactly coincides with the next
/// `Symbol` run — so `iffy` lexes as `Symbol("iffy")`, not `If` + `Symbol("fy")`.
fn match_keyword(chars: &[char], pattern: &str) -> Option<usize> {
    let symbol_len = match_symbol(chars)?;
    let candidate: String = take(chars, symbol_len);
    (candidate == pattern).then_some(symbol_len)
}
