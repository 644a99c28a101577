//! Operation result types

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::error::ErrorKind;

/// How a single step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Benign,
    Fatal,
}

/// Result of one step in a sequence
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub summary: String,
    pub outcome: StepOutcome,
    /// `None` when the transport failed before an exit status was known
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Result of a whole sequence
///
/// On failure, steps before `failed_step` have already been applied on the
/// remote host; nothing is rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    pub failed_step: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub warnings: Vec<String>,
    pub steps: Vec<StepReport>,
}

impl OperationResult {
    /// Number of steps that ran (including the failing one)
    pub fn executed(&self) -> usize {
        self.steps.len()
    }
}
