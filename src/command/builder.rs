//! Command Builder
//!
//! Turns a typed intent into one shell-safe [`CommandSpec`]. Free-text
//! payloads (SQL bodies, passwords) never appear on the command line: they
//! are base64-encoded into [`CommandSpec::stdin`], streamed over the channel
//! and decoded on the remote side into a file or a pipe. The command line
//! stays short whatever the payload size.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::engine::SqlEngine;
use super::escape::{shell_quote, validate_identifier, validate_program};
use crate::engine::error::ActionError;
use crate::extract::Marker;
use crate::transport::CommandSpec;

pub struct CommandBuilder;

impl CommandBuilder {
    /// Run `sql` with the engine's client, optionally against `database`
    ///
    /// The SQL is written to a remote temp file which is removed afterwards;
    /// the command exits with the client's exit code.
    pub fn sql(
        engine: SqlEngine,
        database: Option<&str>,
        sql: &str,
    ) -> Result<CommandSpec, ActionError> {
        Self::sql_script(engine, database, sql, None)
    }

    /// Like [`CommandBuilder::sql`], printing `header` on a line of its own
    /// right before the client starts, so the client's output can be told
    /// apart from login banners
    pub fn sql_table(
        engine: SqlEngine,
        database: Option<&str>,
        sql: &str,
        header: &Marker,
    ) -> Result<CommandSpec, ActionError> {
        Self::sql_script(engine, database, sql, Some(header))
    }

    fn sql_script(
        engine: SqlEngine,
        database: Option<&str>,
        sql: &str,
        header: Option<&Marker>,
    ) -> Result<CommandSpec, ActionError> {
        let client = engine.client_command(database)?;
        let announce = header
            .map(|m| format!("echo {}; ", shell_quote(m.as_str())))
            .unwrap_or_default();
        let text = format!(
            "f=$(mktemp) || exit 1; base64 -d > \"$f\" && {{ {}{} < \"$f\"; }}; rc=$?; rm -f \"$f\"; exit $rc",
            announce, client
        );
        let summary = match database {
            Some(db) => format!("{} query on {}", engine, db),
            None => format!("{} query", engine),
        };
        Ok(CommandSpec::new(text, summary).with_stdin(encode_payload(sql)))
    }

    /// Run `program` with each argument passed as one quoted shell word
    ///
    /// Arguments appear in the summary, so secrets belong in
    /// [`CommandBuilder::stdin_payload`] instead.
    pub fn cli<S: AsRef<str>>(program: &str, args: &[S]) -> Result<CommandSpec, ActionError> {
        let program = validate_program(program)?;
        let mut text = program.to_string();
        let mut summary = program.to_string();
        for arg in args {
            text.push(' ');
            text.push_str(&shell_quote(arg.as_ref()));
            summary.push(' ');
            summary.push_str(arg.as_ref());
        }
        Ok(CommandSpec::new(text, summary))
    }

    /// Like [`CommandBuilder::cli`], with `payload` delivered on stdin
    pub fn stdin_payload<S: AsRef<str>>(
        program: &str,
        args: &[S],
        payload: &str,
    ) -> Result<CommandSpec, ActionError> {
        let inner = Self::cli(program, args)?;
        let text = format!("base64 -d | {}", inner.text);
        Ok(CommandSpec::new(text, format!("{} <stdin>", inner.summary))
            .with_stdin(encode_payload(payload)))
    }

    /// Check that a system account name is acceptable
    pub fn system_username(name: &str) -> Result<&str, ActionError> {
        let name = validate_identifier("username", name)?;
        if name.len() > 32 {
            return Err(ActionError::InvalidInput(format!(
                "username '{}' is longer than 32 characters",
                name
            )));
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ActionError::InvalidInput(format!(
                "username '{}' must not start with a digit",
                name
            )));
        }
        Ok(name)
    }
}

fn encode_payload(payload: &str) -> String {
    BASE64.encode(payload.as_bytes())
}

/// Recover the payload carried by [`CommandBuilder::sql`] or
/// [`CommandBuilder::stdin_payload`]; handy for dry runs and tests
pub fn decode_payload(spec: &CommandSpec) -> Option<String> {
    let bytes = BASE64.decode(spec.stdin.as_deref()?).ok()?;
    String::from_utf8(bytes).ok()
}
