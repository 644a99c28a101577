//! Context-aware escaping
//!
//! Every caller-supplied value goes through one of these before it reaches
//! command text: shell arguments are single-quoted, SQL identifiers are
//! allow-listed then quoted, SQL literals are escaped per engine.

use super::engine::SqlEngine;
use crate::engine::error::ActionError;

const MAX_IDENTIFIER_LEN: usize = 64;

/// Quote a value as one POSIX shell word
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Check an identifier against `[A-Za-z0-9_]{1,64}`
///
/// `what` names the value in the error ("database", "username", ...).
pub fn validate_identifier<'a>(what: &str, value: &'a str) -> Result<&'a str, ActionError> {
    if value.is_empty() {
        return Err(ActionError::invalid(format!("{} must not be empty", what)));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ActionError::invalid(format!(
            "{} '{}' is longer than {} characters",
            what, value, MAX_IDENTIFIER_LEN
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(ActionError::invalid(format!(
            "{} '{}' contains disallowed character {:?} (allowed: letters, digits, underscore)",
            what, value, bad
        )));
    }
    Ok(value)
}

/// Program names may contain path separators but nothing the shell expands
pub fn validate_program(program: &str) -> Result<&str, ActionError> {
    let valid = !program.is_empty()
        && program
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-'));
    if valid {
        Ok(program)
    } else {
        Err(ActionError::invalid(format!(
            "program name '{}' is not allowed",
            program
        )))
    }
}

/// Validate and quote an identifier for the engine's SQL dialect
pub fn quote_identifier(engine: SqlEngine, what: &str, value: &str) -> Result<String, ActionError> {
    let value = validate_identifier(what, value)?;
    Ok(match engine {
        SqlEngine::Mysql => format!("`{}`", value),
        SqlEngine::Postgres => format!("\"{}\"", value),
    })
}

/// Escape a value as a complete SQL string literal, quotes included
pub fn sql_literal(engine: SqlEngine, value: &str) -> Result<String, ActionError> {
    match engine {
        SqlEngine::Mysql => {
            let mut out = String::with_capacity(value.len() + 2);
            out.push('\'');
            for c in value.chars() {
                match c {
                    '\'' => out.push_str("''"),
                    '\\' => out.push_str("\\\\"),
                    '\0' => out.push_str("\\0"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\x1a' => out.push_str("\\Z"),
                    _ => out.push(c),
                }
            }
            out.push('\'');
            Ok(out)
        }
        SqlEngine::Postgres => {
            if value.contains('\0') {
                return Err(ActionError::invalid(
                    "PostgreSQL string literals cannot contain NUL bytes",
                ));
            }
            // E'' keeps backslash handling independent of standard_conforming_strings
            let mut out = String::with_capacity(value.len() + 3);
            out.push_str("E'");
            for c in value.chars() {
                match c {
                    '\'' => out.push_str("''"),
                    '\\' => out.push_str("\\\\"),
                    _ => out.push(c),
                }
            }
            out.push('\'');
            Ok(out)
        }
    }
}
