//! Read-only statement gate applied before executing generated SQL.
//!
//! The scanner is lexical only: it skips string literals, quoted identifiers
//! and comments, then inspects bare keywords. It does not parse SQL.

use askdata_shared::{AskDataError, Result};

/// Keywords a read-only statement may start with.
const LEADING_KEYWORDS: &[&str] = &["SELECT", "WITH", "VALUES", "EXPLAIN"];

/// Keywords that never appear in a read-only statement.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "ATTACH", "DETACH", "PRAGMA",
    "VACUUM", "REINDEX",
];

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Punct(char),
}

/// Reject anything that is not a single read-only statement.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let tokens = tokenize(sql)?;

    let first = tokens.iter().find_map(|t| match t {
        Token::Word(w) => Some(w.as_str()),
        Token::Punct(_) => None,
    });
    match first {
        Some(word) if LEADING_KEYWORDS.contains(&word) => {}
        Some(word) => {
            return Err(AskDataError::execution(format!(
                "only read-only queries are permitted (statement starts with {word})"
            )));
        }
        None => return Err(AskDataError::execution("query is empty")),
    }

    if let Some(pos) = tokens.iter().position(|t| *t == Token::Punct(';')) {
        if tokens[pos..].iter().any(|t| *t != Token::Punct(';')) {
            return Err(AskDataError::execution(
                "only a single statement is permitted per query",
            ));
        }
    }

    for (i, token) in tokens.iter().enumerate() {
        let Token::Word(word) = token else { continue };
        if FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
            return Err(AskDataError::execution(format!(
                "only read-only queries are permitted ({word} is not allowed)"
            )));
        }
        // `replace(...)` is a scalar function; `REPLACE INTO` is a write.
        if word == "REPLACE" && tokens.get(i + 1) != Some(&Token::Punct('(')) {
            return Err(AskDataError::execution(
                "only read-only queries are permitted (REPLACE is not allowed)",
            ));
        }
    }

    Ok(())
}

/// Split SQL into uppercase bare words and punctuation, dropping literals and comments.
fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '\'' | '"' | '`' => skip_quoted(&mut chars, c)?,
            '[' => skip_quoted(&mut chars, ']')?,
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if !closed {
                    return Err(AskDataError::execution("unterminated block comment"));
                }
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = c.to_uppercase().to_string();
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        word.extend(next.to_uppercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            c => tokens.push(Token::Punct(c)),
        }
    }

    Ok(tokens)
}

/// Consume a quoted run up to `close`; a doubled closing quote is an escape.
fn skip_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, close: char) -> Result<()> {
    while let Some(c) = chars.next() {
        if c == close {
            if close != ']' && chars.peek() == Some(&close) {
                chars.next();
                continue;
            }
            return Ok(());
        }
    }
    Err(AskDataError::execution("unterminated quoted literal"))
}
