//! Schema placeholders in table references.
//!
//! A table reference such as `{0}.users` is resolved against a list of schema
//! names at build time. `{{` and `}}` produce literal braces.

use crate::error::{StmtError, StmtResult};

/// Replace every `{N}` in `sql` with `schemas[N]`.
///
/// # Example
///
/// ```ignore
/// let sql = substitute_schemas("SELECT * FROM {0}.users JOIN {1}.log", &["app", "audit"])?;
/// assert_eq!(sql, "SELECT * FROM app.users JOIN audit.log");
/// ```
pub fn substitute_schemas<S: AsRef<str>>(sql: &str, schemas: &[S]) -> StmtResult<String> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|(_, c)| *c) == Some('{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek().map(|(_, c)| *c) == Some('}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let rest = &sql[i + 1..];
                let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
                let index = rest[..digits].parse::<usize>().ok();
                match (index, rest[digits..].starts_with('}')) {
                    (Some(index), true) => {
                        let schema = schemas.get(index).ok_or_else(|| {
                            StmtError::SchemaPlaceholderOutOfRange {
                                index,
                                schemas: schemas.iter().map(|s| s.as_ref().to_string()).collect(),
                            }
                        })?;
                        out.push_str(schema.as_ref());
                        // skip digits and the closing brace
                        for _ in 0..=digits {
                            chars.next();
                        }
                    }
                    // not a schema placeholder
                    _ => out.push('{'),
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}
