//! Lexical scanning of SQL text.
//!
//! Placeholders and caller markers are only recognised in SQL code. String
//! literals (`'...'`), quoted identifiers (`"..."`), dollar-quoted bodies
//! (`$tag$...$tag$`) and comments are passed through untouched.

use crate::error::{StmtError, StmtResult};

/// A run of SQL text, either plain code or an opaque quoted/commented run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Code(&'a str),
    Quoted(&'a str),
}

/// A lexical token of rendered SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    Placeholder(usize),
}

/// One piece of a condition template: literal SQL or a reference to one of the
/// fragment's values (0-based). Several parts may reference the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SqlPart {
    Raw(String),
    Param(usize),
}

pub(crate) fn segments(sql: &str) -> Vec<Segment<'_>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let end = match bytes[i] {
            b'\'' => Some(quoted_end(bytes, i, b'\'')),
            b'"' => Some(quoted_end(bytes, i, b'"')),
            b'-' if bytes.get(i + 1) == Some(&b'-') => Some(
                sql[i..]
                    .find('\n')
                    .map_or(bytes.len(), |pos| i + pos + 1),
            ),
            b'/' if bytes.get(i + 1) == Some(&b'*') => Some(
                sql[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |pos| i + 2 + pos + 2),
            ),
            b'$' => dollar_quote_end(sql, i),
            _ => None,
        };

        match end {
            Some(end) => {
                if start < i {
                    out.push(Segment::Code(&sql[start..i]));
                }
                out.push(Segment::Quoted(&sql[i..end]));
                start = end;
                i = end;
            }
            None => i += 1,
        }
    }

    if start < bytes.len() {
        out.push(Segment::Code(&sql[start..]));
    }
    out
}

fn quoted_end(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut j = open + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            // doubled quote is an escape
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

fn dollar_quote_end(sql: &str, open: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    if open > 0 && (is_ident_byte(bytes[open - 1]) || bytes[open - 1] == b'$') {
        return None;
    }

    let mut j = open + 1;
    match bytes.get(j) {
        Some(b'$') => {}
        Some(&b) if b == b'_' || b.is_ascii_alphabetic() => {
            while j < bytes.len() && is_ident_byte(bytes[j]) {
                j += 1;
            }
            if bytes.get(j) != Some(&b'$') {
                return None;
            }
        }
        _ => return None,
    }

    let tag = &sql[open..=j];
    let body = j + 1;
    Some(
        sql[body..]
            .find(tag)
            .map_or(bytes.len(), |pos| body + pos + tag.len()),
    )
}

/// Split rendered SQL into text runs and `$N` placeholders.
pub(crate) fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    for segment in segments(sql) {
        match segment {
            Segment::Quoted(s) => tokens.push(Token::Text(s)),
            Segment::Code(code) => tokenize_code(code, &mut tokens),
        }
    }
    tokens
}

fn tokenize_code<'a>(code: &'a str, tokens: &mut Vec<Token<'a>>) {
    let bytes = code.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let is_placeholder = bytes[i] == b'$'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)
            && (i == 0 || !is_ident_byte(bytes[i - 1]));
        if !is_placeholder {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        match code[i + 1..j].parse::<usize>() {
            Ok(idx) => {
                if start < i {
                    tokens.push(Token::Text(&code[start..i]));
                }
                tokens.push(Token::Placeholder(idx));
                start = j;
            }
            // absurdly long digit run, leave it as text
            Err(_) => {}
        }
        i = j;
    }

    if start < bytes.len() {
        tokens.push(Token::Text(&code[start..]));
    }
}

/// Add `offset` to every `$N` placeholder.
///
/// For example, with offset=3: `$1 AND $2` becomes `$4 AND $5`
pub fn shift_placeholders(sql: &str, offset: usize) -> String {
    if offset == 0 {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + 8);
    for token in tokenize(sql) {
        match token {
            Token::Text(s) => out.push_str(s),
            Token::Placeholder(idx) => {
                out.push('$');
                out.push_str(&(idx + offset).to_string());
            }
        }
    }
    out
}

/// Split a template on its marker into raw text and parameter slots.
pub(crate) fn split_markers(template: &str, marker: &str) -> StmtResult<Vec<SqlPart>> {
    if marker.is_empty() {
        return Err(StmtError::validation("placeholder marker cannot be empty"));
    }

    let mut parts = Vec::new();
    let mut slot = 0;
    for segment in segments(template) {
        match segment {
            Segment::Quoted(s) => push_raw(&mut parts, s),
            Segment::Code(code) => {
                let mut pieces = code.split(marker);
                if let Some(first) = pieces.next() {
                    push_raw(&mut parts, first);
                }
                for piece in pieces {
                    parts.push(SqlPart::Param(slot));
                    slot += 1;
                    push_raw(&mut parts, piece);
                }
            }
        }
    }
    Ok(parts)
}

/// Convert already-numbered SQL back into parts.
///
/// Every `$N` must bind one of `values` (`1 <= N <= values`) and every value must
/// be referenced at least once. A value may be referenced more than once.
pub(crate) fn split_numbered(sql: &str, values: usize) -> StmtResult<Vec<SqlPart>> {
    let mut parts = Vec::new();
    let mut referenced = vec![false; values];
    let mut highest = 0;
    for token in tokenize(sql) {
        match token {
            Token::Text(s) => push_raw(&mut parts, s),
            Token::Placeholder(idx) => {
                highest = highest.max(idx);
                match idx.checked_sub(1).and_then(|i| referenced.get_mut(i)) {
                    Some(seen) => *seen = true,
                    None => {
                        return Err(StmtError::placeholder_mismatch(
                            sql,
                            highest.max(values),
                            values,
                        ));
                    }
                }
                parts.push(SqlPart::Param(idx - 1));
            }
        }
    }

    let distinct = referenced.iter().filter(|seen| **seen).count();
    if distinct != values {
        return Err(StmtError::placeholder_mismatch(sql, distinct, values));
    }
    Ok(parts)
}

/// Check that numbered SQL binds exactly `values` values (see [`split_numbered`]).
pub(crate) fn check_numbered(sql: &str, values: usize) -> StmtResult<()> {
    split_numbered(sql, values).map(|_| ())
}

pub(crate) fn push_raw(parts: &mut Vec<SqlPart>, s: &str) {
    if s.is_empty() {
        return;
    }
    match parts.last_mut() {
        Some(SqlPart::Raw(last)) => last.push_str(s),
        _ => parts.push(SqlPart::Raw(s.to_string())),
    }
}
