//! MDL tokenizer.
//!
//! Produces words and the three structural separators. Two constructs are
//! taken whole: `#` macro lines (line-based, optional trailing `;`) and
//! `schedule NAME { ... }` blocks, whose body is kept verbatim up to the
//! matching brace.

use fdr_core::{FdrError, FdrResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Semi,
    Open,
    Close,
    /// `#include "x.glm"`, `#set a=b`, ... without the trailing `;`
    Macro(String),
    Schedule { name: String, body: String },
}

/// Remove `//` comments, leaving `scheme://` sequences alone.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut cut = line.len();
        let bytes = line.as_bytes();
        let mut i = 0;
        while i + 1 < bytes.len() {
            if bytes[i] == b'/' && bytes[i + 1] == b'/' && (i == 0 || bytes[i - 1] != b':') {
                cut = i;
                break;
            }
            i += 1;
        }
        out.push_str(&line[..cut]);
        out.push('\n');
    }
    out
}

/// Tokenize MDL text. Positions in later errors are indexes into the
/// returned vector.
pub fn tokenize(text: &str) -> FdrResult<Vec<Token>> {
    let text = strip_comments(text);
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    // Words seen since the last separator; used to spot `schedule NAME {`.
    let mut statement: Vec<String> = Vec::new();
    let mut line_start = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line_start = true;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' && line_start && statement.is_empty() {
            let end = chars[i..]
                .iter()
                .position(|&ch| ch == '\n')
                .map_or(chars.len(), |p| i + p);
            let line: String = chars[i..end].iter().collect();
            let line = line.trim().trim_end_matches(';').trim_end().to_string();
            tokens.push(Token::Macro(line));
            i = end;
            continue;
        }
        line_start = false;
        match c {
            ';' => {
                tokens.push(Token::Semi);
                statement.clear();
                i += 1;
            }
            '}' => {
                tokens.push(Token::Close);
                statement.clear();
                i += 1;
            }
            '{' => {
                if statement.len() == 2 && statement[0] == "schedule" {
                    let (body, next) = read_block(&chars, i + 1, tokens.len())?;
                    // Drop the two words already emitted for the header.
                    tokens.truncate(tokens.len() - 2);
                    tokens.push(Token::Schedule {
                        name: statement[1].clone(),
                        body,
                    });
                    i = next;
                } else {
                    tokens.push(Token::Open);
                    i += 1;
                }
                statement.clear();
            }
            _ => {
                let start = i;
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !matches!(chars[i], ';' | '{' | '}')
                {
                    if chars[i] == '$' && chars.get(i + 1) == Some(&'{') {
                        if let Some(close) = chars[i..].iter().position(|&ch| ch == '}') {
                            i += close + 1;
                            continue;
                        }
                    }
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                statement.push(word.clone());
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

/// `value` with every `${NAME}` simulator macro reference removed.
pub fn strip_macro_refs(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start..].find('}') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Read a brace-balanced block body starting just after `{`. Returns the
/// normalized body (trimmed non-empty lines) and the index after the
/// closing brace.
fn read_block(chars: &[char], start: usize, position: usize) -> FdrResult<(String, usize)> {
    let mut depth = 1usize;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let raw: String = chars[start..i].iter().collect();
                    let body = raw
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .collect::<Vec<_>>()
                        .join("\n");
                    return Ok((body, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(FdrError::parse_at(position, "unterminated schedule block"))
}
