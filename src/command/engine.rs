//! SQL engines and their command-line clients

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::escape::{shell_quote, validate_identifier};
use crate::engine::error::ActionError;

/// Supported SQL engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlEngine {
    Mysql,
    #[serde(alias = "postgresql")]
    Postgres,
}

impl SqlEngine {
    pub fn name(&self) -> &'static str {
        match self {
            SqlEngine::Mysql => "mysql",
            SqlEngine::Postgres => "postgres",
        }
    }

    /// Client binary probed by installation checks
    pub fn client_binary(&self) -> &'static str {
        match self {
            SqlEngine::Mysql => "mysql",
            SqlEngine::Postgres => "psql",
        }
    }

    /// systemd unit of the server
    pub fn service_unit(&self) -> &'static str {
        match self {
            SqlEngine::Mysql => "mysql",
            SqlEngine::Postgres => "postgresql",
        }
    }

    /// Client invocation that reads SQL from stdin and prints tab-separated
    /// rows with a header line
    pub fn client_command(&self, database: Option<&str>) -> Result<String, ActionError> {
        let mut cmd = match self {
            SqlEngine::Mysql => "mysql --batch --default-character-set=utf8mb4".to_string(),
            SqlEngine::Postgres => format!(
                "sudo -n -u postgres psql -X -A -F {} -v ON_ERROR_STOP=1 --pset footer=off",
                shell_quote("\t")
            ),
        };

        if let Some(db) = database {
            let db = validate_identifier("database", db)?;
            match self {
                SqlEngine::Mysql => cmd.push_str(&format!(" --database={}", shell_quote(db))),
                SqlEngine::Postgres => cmd.push_str(&format!(" -d {}", shell_quote(db))),
            }
        }

        Ok(cmd)
    }
}

impl fmt::Display for SqlEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SqlEngine {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(SqlEngine::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(SqlEngine::Postgres),
            other => Err(ActionError::invalid(format!(
                "unknown database engine '{}' (expected mysql or postgres)",
                other
            ))),
        }
    }
}
