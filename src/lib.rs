//! # Remote Actions
//!
//! Run shell commands on remote servers over SSH and turn their noisy
//! output back into structured results.
//!
//! ## Features
//!
//! - **One command per call** - a transport runs a single remote process and
//!   returns its exit code, stdout and stderr
//! - **Injection-safe commands** - identifiers are allow-listed, arguments
//!   quoted, free-text payloads shipped base64-encoded out of band
//! - **Marker protocol** - several queries share one round trip and each
//!   result is recovered by its `RESULT_START_<PURPOSE>` tag
//! - **Tabular parsing** - tab-separated client output keyed by header
//! - **Idempotent sequences** - ordered steps where "already exists" is a
//!   warning, anything else stops the run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use remote_actions::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let key = std::fs::read_to_string("/home/me/.ssh/id_ed25519")?;
//!     let target = RemoteTarget::new("203.0.113.10", "root", key);
//!     let transport: Arc<dyn Transport> = Arc::new(SshTransport::new());
//!
//!     let sequence = database::provision_database(SqlEngine::Mysql, "shop", "shop_app", "s3cr3t")?;
//!     let result = run_provisioning_sequence(transport.clone(), &target, &sequence).await;
//!     println!("{}", result.message);
//!
//!     let users = run_query(transport.as_ref(), &target, SqlEngine::Mysql, None,
//!         "SELECT User, Host FROM mysql.user").await?;
//!     for row in &users.rows {
//!         println!("{:?}@{:?}", row.get("User"), row.get("Host"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod command;
pub mod config;
pub mod engine;
pub mod extract;
pub mod recipes;
pub mod tabular;
pub mod transport;

// Re-export main types
pub use api::{check_installed, database_exists, run_provisioning_sequence, run_query};
pub use command::{CommandBuilder, SqlEngine};
pub use config::{
    InventoryDirectory, LoadError, RemoteConfig, SequenceFile, TargetDirectory, TargetEntry,
};
pub use engine::{
    ActionError, ActionSequence, ActionStep, BenignPatterns, Classification, Classifier,
    ErrorKind, OperationResult, Orchestrator, StepOutcome, StepReport,
};
pub use extract::{Marker, MarkerBatch, ResultExtractor};
pub use recipes::{Probe, Protocol};
pub use tabular::{Row, TabularResult};
pub use transport::{
    CommandSpec, ExecutionResult, RemoteTarget, ScriptedTransport, SshConfig, SshTransport,
    Transport, TransportError,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::api::{check_installed, database_exists, run_provisioning_sequence, run_query};
    pub use crate::command::{CommandBuilder, SqlEngine};
    pub use crate::config::{InventoryDirectory, RemoteConfig, SequenceFile, TargetDirectory};
    pub use crate::engine::{
        ActionError, ActionSequence, ActionStep, BenignPatterns, ErrorKind, OperationResult,
        Orchestrator,
    };
    pub use crate::extract::{Marker, MarkerBatch, ResultExtractor};
    pub use crate::recipes::{database, default_engine_probes, firewall, users, Probe, Protocol};
    pub use crate::tabular::TabularResult;
    pub use crate::transport::{RemoteTarget, SshTransport, Transport};
}
