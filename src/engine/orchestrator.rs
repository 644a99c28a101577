//! Action Orchestrator - runs step sequences against one target
//!
//! Steps run strictly in order, each one a single remote command:
//! 1. Success keeps going
//! 2. A benign failure keeps going and records a warning
//! 3. A fatal failure or transport error stops the sequence
//!
//! There is no rollback. A failed sequence may have applied its earlier
//! steps, and the result says which step stopped it so the caller can run a
//! teardown sequence if it wants one. Dropping the future returned by
//! [`Orchestrator::run`] stops further steps from being issued.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::action::{ActionSequence, ActionStep, Classification};
use crate::engine::error::ActionError;
use crate::engine::result::{OperationResult, StepOutcome, StepReport};
use crate::transport::{ExecutionResult, RemoteTarget, Transport};

/// Longest slice of remote output quoted in a failure message
pub const MAX_DIAGNOSTIC_BYTES: usize = 2000;

/// Executes action sequences through a transport
///
/// Holds no per-run state, so one orchestrator can serve concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Run `sequence` to completion or to its first fatal step
    #[instrument(skip(self, target, sequence), fields(sequence = %sequence.name, target = %target.display_name()))]
    pub async fn run(&self, target: &RemoteTarget, sequence: &ActionSequence) -> OperationResult {
        info!(
            "Starting sequence: {} ({} steps)",
            sequence.name,
            sequence.len()
        );

        let total = sequence.len();
        let mut reports = Vec::with_capacity(total);
        let mut warnings = Vec::new();

        for (idx, step) in sequence.steps.iter().enumerate() {
            info!("Executing step {}/{}: {}", idx + 1, total, step.name);
            let started_at = Utc::now();
            let clock = Instant::now();

            let executed = self.transport.execute(target, &step.command).await;
            let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

            let result = match executed {
                Ok(result) => result,
                Err(e) => {
                    let err = ActionError::from(e);
                    error!("Step '{}' could not run: {}", step.name, err);
                    reports.push(StepReport {
                        name: step.name.clone(),
                        summary: step.command.summary.clone(),
                        outcome: StepOutcome::Fatal,
                        exit_code: None,
                        started_at,
                        elapsed_ms,
                    });
                    return OperationResult {
                        success: false,
                        message: format!(
                            "{}: step {}/{} '{}' failed: {}",
                            sequence.name,
                            idx + 1,
                            total,
                            step.name,
                            err
                        ),
                        failed_step: Some(step.name.clone()),
                        error_kind: Some(err.kind()),
                        warnings,
                        steps: reports,
                    };
                }
            };

            let classification = step.classify(&result);
            let outcome = match &classification {
                Classification::Success => StepOutcome::Success,
                Classification::Benign(_) => StepOutcome::Benign,
                Classification::Fatal => StepOutcome::Fatal,
            };
            reports.push(StepReport {
                name: step.name.clone(),
                summary: step.command.summary.clone(),
                outcome,
                exit_code: Some(result.exit_code),
                started_at,
                elapsed_ms,
            });

            match classification {
                Classification::Success => {
                    debug!("Step '{}' succeeded in {}ms", step.name, elapsed_ms);
                }
                Classification::Benign(reason) => {
                    warn!(
                        "Step '{}' exited {} but was tolerated: {}",
                        step.name, result.exit_code, reason
                    );
                    warnings.push(format!("{}: {}", step.name, reason));
                }
                Classification::Fatal => {
                    let err = ActionError::CommandFailed {
                        step: step.name.clone(),
                        exit_code: result.exit_code,
                        stderr: diagnostic(&result),
                    };
                    error!("Step '{}' failed: {}", step.name, err);
                    return OperationResult {
                        success: false,
                        message: format!(
                            "{}: step {}/{} '{}' failed (exit {}): {}",
                            sequence.name,
                            idx + 1,
                            total,
                            step.name,
                            result.exit_code,
                            diagnostic(&result)
                        ),
                        failed_step: Some(step.name.clone()),
                        error_kind: Some(err.kind()),
                        warnings,
                        steps: reports,
                    };
                }
            }
        }

        info!("Sequence {} completed", sequence.name);
        let message = if warnings.is_empty() {
            format!("{}: {} steps completed", sequence.name, total)
        } else {
            format!(
                "{}: {} steps completed with {} warning(s)",
                sequence.name,
                total,
                warnings.len()
            )
        };

        OperationResult {
            success: true,
            message,
            failed_step: None,
            error_kind: None,
            warnings,
            steps: reports,
        }
    }

    /// Run one step and return its raw result, or an error if it is fatal
    #[instrument(skip(self, target, step), fields(step = %step.name))]
    pub async fn run_step(
        &self,
        target: &RemoteTarget,
        step: &ActionStep,
    ) -> Result<ExecutionResult, ActionError> {
        let result = self.transport.execute(target, &step.command).await?;
        match step.classify(&result) {
            Classification::Success => Ok(result),
            Classification::Benign(reason) => {
                warn!("Step '{}' tolerated: {}", step.name, reason);
                Ok(result)
            }
            Classification::Fatal => Err(ActionError::CommandFailed {
                step: step.name.clone(),
                exit_code: result.exit_code,
                stderr: diagnostic(&result),
            }),
        }
    }
}

/// Trimmed stderr, or stdout when stderr is empty, capped for messages
pub(crate) fn diagnostic(result: &ExecutionResult) -> String {
    let text = if result.stderr.trim().is_empty() {
        result.stdout.trim()
    } else {
        result.stderr.trim()
    };
    if text.is_empty() {
        return "<no output>".to_string();
    }
    truncate(text, MAX_DIAGNOSTIC_BYTES)
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes truncated)", &text[..end], text.len() - end)
}
