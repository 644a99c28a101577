//! Action steps and outcome classification
//!
//! A step pairs one command with a classifier that decides whether its
//! result is a success, a benign failure (the sequence continues) or a fatal
//! failure (the sequence stops).

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::engine::error::ActionError;
use crate::transport::{CommandSpec, ExecutionResult};

/// Pattern most CLIs print when asked to create something twice
pub const ALREADY_EXISTS: &str = r"(?i)already exists";

static ALREADY_EXISTS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ALREADY_EXISTS).unwrap());

/// Verdict on one step's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// Non-zero exit that is acceptable; carries the reason for the warning
    Benign(String),
    Fatal,
}

/// Decides how a step's result affects its sequence
pub trait Classifier: Send + Sync {
    fn classify(&self, result: &ExecutionResult) -> Classification;
}

impl<F> Classifier for F
where
    F: Fn(&ExecutionResult) -> Classification + Send + Sync,
{
    fn classify(&self, result: &ExecutionResult) -> Classification {
        self(result)
    }
}

/// Exit 0 succeeds, anything else is fatal
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitStatusClassifier;

impl Classifier for ExitStatusClassifier {
    fn classify(&self, result: &ExecutionResult) -> Classification {
        if result.is_success() {
            Classification::Success
        } else {
            Classification::Fatal
        }
    }
}

/// Non-zero exits whose output matches an allow-listed pattern are benign
///
/// Error text is tool-, version- and locale-specific, so the pattern set is
/// configured per step rather than fixed.
#[derive(Debug, Clone, Default)]
pub struct BenignPatterns {
    patterns: Vec<Regex>,
}

impl BenignPatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ActionError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    ActionError::Config(format!("invalid benign pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Tolerates "already exists"
    pub fn already_exists() -> Self {
        Self {
            patterns: vec![ALREADY_EXISTS_REGEX.clone()],
        }
    }

    /// Add more patterns to this set
    pub fn and<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ActionError> {
        self.patterns.extend(Self::new(patterns)?.patterns);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn matching_line<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.lines()
            .find(|line| self.patterns.iter().any(|p| p.is_match(line)))
    }
}

impl Classifier for BenignPatterns {
    fn classify(&self, result: &ExecutionResult) -> Classification {
        if result.is_success() {
            return Classification::Success;
        }
        match self
            .matching_line(&result.stderr)
            .or_else(|| self.matching_line(&result.stdout))
        {
            Some(line) => Classification::Benign(line.trim().to_string()),
            None => Classification::Fatal,
        }
    }
}

/// One command plus the rule for judging its result
#[derive(Clone)]
pub struct ActionStep {
    pub name: String,
    pub command: CommandSpec,
    pub classifier: Arc<dyn Classifier>,
}

impl ActionStep {
    /// Step where only exit 0 counts as success
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
            classifier: Arc::new(ExitStatusClassifier),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Shorthand for a [`BenignPatterns`] classifier
    pub fn tolerate(self, patterns: BenignPatterns) -> Self {
        self.with_classifier(patterns)
    }

    /// Keep the current classifier, and give `patterns` a chance to
    /// downgrade its fatal verdicts
    pub fn also_tolerate(self, patterns: BenignPatterns) -> Self {
        if patterns.is_empty() {
            return self;
        }
        let inner = self.classifier.clone();
        self.with_classifier(move |result: &ExecutionResult| match inner.classify(result) {
            Classification::Fatal => patterns.classify(result),
            verdict => verdict,
        })
    }

    pub fn classify(&self, result: &ExecutionResult) -> Classification {
        self.classifier.classify(result)
    }
}

impl fmt::Debug for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStep")
            .field("name", &self.name)
            .field("command", &self.command.summary)
            .finish()
    }
}

/// Ordered, non-transactional list of steps run as one operation
#[derive(Debug, Clone, Default)]
pub struct ActionSequence {
    pub name: String,
    pub steps: Vec<ActionStep>,
}

impl ActionSequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn then(mut self, step: ActionStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: ActionStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_classifier() {
        let c = ExitStatusClassifier;
        assert_eq!(c.classify(&ExecutionResult::success("")), Classification::Success);
        assert_eq!(
            c.classify(&ExecutionResult::failure(1, "already exists")),
            Classification::Fatal
        );
    }

    #[test]
    fn test_already_exists_is_benign() {
        let c = BenignPatterns::already_exists();
        let result = ExecutionResult::failure(
            1,
            "ERROR 1396: Operation CREATE USER failed... already exists",
        );
        match c.classify(&result) {
            Classification::Benign(reason) => assert!(reason.contains("1396")),
            other => panic!("expected benign, got {:?}", other),
        }
    }

    #[test]
    fn test_unmatched_failure_is_fatal() {
        let c = BenignPatterns::already_exists();
        let result = ExecutionResult::failure(1, "ERROR 1045: Access denied");
        assert_eq!(c.classify(&result), Classification::Fatal);
    }

    #[test]
    fn test_benign_pattern_matches_stdout_too() {
        let c = BenignPatterns::new(&["Skipping adding existing rule"]).unwrap();
        let result = ExecutionResult {
            exit_code: 1,
            stdout: "Skipping adding existing rule\n".into(),
            stderr: String::new(),
        };
        assert!(matches!(c.classify(&result), Classification::Benign(_)));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = BenignPatterns::new(&["("]).unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));
    }

    #[test]
    fn test_closure_classifier() {
        let step = ActionStep::new("probe", CommandSpec::new("false", "probe"))
            .with_classifier(|r: &ExecutionResult| {
                if r.exit_code == 3 {
                    Classification::Benign("nothing to do".into())
                } else {
                    Classification::Fatal
                }
            });
        assert_eq!(
            step.classify(&ExecutionResult::failure(3, "")),
            Classification::Benign("nothing to do".into())
        );
    }

    #[test]
    fn test_also_tolerate_extends_existing_rules() {
        let step = ActionStep::new("create", CommandSpec::new("false", "create"))
            .tolerate(BenignPatterns::already_exists())
            .also_tolerate(BenignPatterns::new(&["ERROR 1007"]).unwrap());

        assert!(matches!(
            step.classify(&ExecutionResult::failure(1, "db already exists")),
            Classification::Benign(_)
        ));
        assert!(matches!(
            step.classify(&ExecutionResult::failure(1, "ERROR 1007 (HY000)")),
            Classification::Benign(_)
        ));
        assert_eq!(
            step.classify(&ExecutionResult::failure(1, "ERROR 1045")),
            Classification::Fatal
        );
    }

    #[test]
    fn test_sequence_builder() {
        let seq = ActionSequence::new("setup")
            .then(ActionStep::new("a", CommandSpec::new("true", "a")))
            .then(ActionStep::new("b", CommandSpec::new("true", "b")));
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.steps[1].name, "b");
    }
}
