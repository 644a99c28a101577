//! Action execution engine module
//!
//! This module contains:
//! - `action` - Steps, sequences and outcome classifiers
//! - `orchestrator` - Runs a sequence against one target
//! - `error` - Error types shared across the crate
//! - `result` - Step and operation result types

pub mod action;
pub mod error;
pub mod orchestrator;
pub mod result;

pub use action::{
    ActionSequence, ActionStep, BenignPatterns, Classification, Classifier, ExitStatusClassifier,
};
pub use error::{ActionError, ErrorKind};
pub use orchestrator::Orchestrator;
pub use result::{OperationResult, StepOutcome, StepReport};
