//! Installation probes for [`crate::api::check_installed`]

use crate::command::{shell_quote, CommandBuilder};
use crate::engine::error::ActionError;
use crate::extract::Marker;

/// A named shell check; exit 0 means "present"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub name: String,
    pub marker: Marker,
    pub check: String,
}

impl Probe {
    /// Probe tagged `RESULT_START_<NAME>_<nonce>`
    ///
    /// The nonce keeps names that share a prefix (`mysql`, `mysql_server`)
    /// batchable together. `check` is shell text and is trusted; build it
    /// from validated parts.
    pub fn new(name: &str, check: impl Into<String>) -> Result<Self, ActionError> {
        Ok(Self {
            name: name.to_string(),
            marker: Marker::unique(name)?,
            check: check.into(),
        })
    }

    /// Use a fixed marker instead
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = marker;
        self
    }

    /// Whether `program` is on the remote `PATH`
    pub fn command_exists(name: &str, program: &str) -> Result<Self, ActionError> {
        let probe = CommandBuilder::cli("command", &["-v", program])?;
        Self::new(name, probe.text)
    }

    /// Whether a systemd unit is active
    pub fn service_active(name: &str, unit: &str) -> Result<Self, ActionError> {
        let valid = !unit.is_empty()
            && unit
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'));
        if !valid {
            return Err(ActionError::invalid(format!(
                "'{}' is not a valid systemd unit name",
                unit
            )));
        }
        Self::new(
            name,
            format!("systemctl is-active --quiet {}", shell_quote(unit)),
        )
    }
}

/// Client binaries of the supported database engines
pub fn default_engine_probes() -> Result<Vec<Probe>, ActionError> {
    Ok(vec![
        Probe::command_exists("mysql", "mysql")?,
        Probe::command_exists("postgres", "psql")?,
    ])
}
