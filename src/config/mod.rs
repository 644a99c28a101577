//! Configuration and input files
//!
//! This module contains:
//! - `remote` - `RemoteConfig` loaded from remote.yaml
//! - `inventory` - Target lookup by id
//! - `sequence` - Sequence files built into action sequences
//! - `expressions` - `${{ env.NAME }}` interpolation

pub mod expressions;
pub mod inventory;
pub mod remote;
pub mod sequence;

pub use expressions::{interpolate, interpolate_with, ExpressionError};
pub use inventory::{expand_home, InventoryDirectory, TargetDirectory};
pub use remote::{LoadError, RemoteConfig, TargetEntry, DEFAULT_CONFIG_FILE};
pub use sequence::{ParsedAction, RecipeCategory, SequenceFile, SequenceStep};
