//! Result extraction
//!
//! Two strategies for pulling one logical result out of noisy stdout:
//! - `marker` - greppable sentinel tags, works with any tool
//! - `json` - JSON pointer into a tool's structured output mode

use serde::{Deserialize, Serialize};

pub mod json;
pub mod marker;

pub use json::extract_json;
pub use marker::{after_line, extract, records, tag_query, tag_shell, MarkedRecord, Marker, MarkerBatch};

use crate::engine::error::ActionError;

/// How to find a result in a command's stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum ResultExtractor {
    /// Lines containing a literal tag
    Marker { tag: String },
    /// RFC 6901 pointer into a JSON document
    Json { pointer: String },
}

impl ResultExtractor {
    pub fn marker(marker: &Marker) -> Self {
        ResultExtractor::Marker {
            tag: marker.as_str().to_string(),
        }
    }

    pub fn json(pointer: impl Into<String>) -> Self {
        ResultExtractor::Json {
            pointer: pointer.into(),
        }
    }

    /// `Ok(None)` means the result is absent, distinct from empty
    pub fn extract(&self, stdout: &str) -> Result<Option<String>, ActionError> {
        match self {
            ResultExtractor::Marker { tag } => Ok(extract(stdout, tag)),
            ResultExtractor::Json { pointer } => extract_json(stdout, pointer),
        }
    }

    /// Like [`ResultExtractor::extract`], treating absence as a parse error
    pub fn require(&self, stdout: &str) -> Result<String, ActionError> {
        self.extract(stdout)?
            .ok_or_else(|| ActionError::parse(format!("{} not found in command output", self)))
    }
}

impl std::fmt::Display for ResultExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultExtractor::Marker { tag } => write!(f, "marker {}", tag),
            ResultExtractor::Json { pointer } => write!(f, "JSON pointer '{}'", pointer),
        }
    }
}
