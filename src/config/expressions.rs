//! `${{ env.NAME }}` interpolation for sequence-file values
//!
//! Only the `env` context exists here; anything else is a syntax error so
//! a typo never reaches a remote host as literal text.

use regex::Regex;
use std::sync::LazyLock;

static EXPRESSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*([^}]+?)\s*\}\}").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Invalid expression syntax: {0}")]
    InvalidSyntax(String),
}

/// Interpolate against the process environment
pub fn interpolate(input: &str) -> Result<String, ExpressionError> {
    interpolate_with(input, |name| std::env::var(name).ok())
}

/// Interpolate with a custom variable lookup
pub fn interpolate_with<F>(input: &str, lookup: F) -> Result<String, ExpressionError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut last = 0;

    for cap in EXPRESSION_REGEX.captures_iter(input) {
        let (Some(whole), Some(expr)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let name = match expr.as_str().trim().split_once('.') {
            Some(("env", name)) if is_variable_name(name) => name,
            _ => {
                return Err(ExpressionError::InvalidSyntax(format!(
                    "expected env.NAME, got: {}",
                    expr.as_str().trim()
                )))
            }
        };
        let value =
            lookup(name).ok_or_else(|| ExpressionError::UnknownVariable(format!("env.{}", name)))?;

        result.push_str(&input[last..whole.start()]);
        result.push_str(&value);
        last = whole.end();
    }

    result.push_str(&input[last..]);
    Ok(result)
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
