//! Caller-facing operations
//!
//! Each function opens its own remote execution through the transport it is
//! given and keeps no state between calls, so independent operations can
//! run concurrently on separate tasks.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::command::{sql_literal, CommandBuilder, SqlEngine};
use crate::engine::action::ActionSequence;
use crate::engine::error::ActionError;
use crate::engine::orchestrator::{diagnostic, Orchestrator};
use crate::engine::result::OperationResult;
use crate::extract::{after_line, Marker, MarkerBatch};
use crate::recipes::Probe;
use crate::tabular::{coerce_count, parse_tsv, TabularResult};
use crate::transport::{CommandSpec, ExecutionResult, RemoteTarget, Transport};

async fn execute_checked(
    transport: &dyn Transport,
    target: &RemoteTarget,
    spec: &CommandSpec,
) -> Result<ExecutionResult, ActionError> {
    let result = transport.execute(target, spec).await?;
    if !result.is_success() {
        return Err(ActionError::CommandFailed {
            step: spec.summary.clone(),
            exit_code: result.exit_code,
            stderr: diagnostic(&result),
        });
    }
    Ok(result)
}

/// Run `sql` and parse the client's tab-separated output
///
/// Only the output after a per-call header line is parsed, so banners
/// printed by the remote login shell never become column names.
#[instrument(skip(transport, target, sql), fields(target = %target.display_name()))]
pub async fn run_query(
    transport: &dyn Transport,
    target: &RemoteTarget,
    engine: SqlEngine,
    database: Option<&str>,
    sql: &str,
) -> Result<TabularResult, ActionError> {
    let header = Marker::unique("TABLE")?;
    let spec = CommandBuilder::sql_table(engine, database, sql, &header)?;
    let result = execute_checked(transport, target, &spec).await?;
    let body = after_line(&result.stdout, header.as_str()).ok_or_else(|| {
        ActionError::parse(format!("{} printed no {} line", spec.summary, header))
    })?;
    let table = parse_tsv(body)?;
    debug!(
        "{} returned {} rows, {} columns",
        spec.summary,
        table.rows.len(),
        table.columns.len()
    );
    Ok(table)
}

/// Run a multi-step operation; see [`Orchestrator::run`]
pub async fn run_provisioning_sequence(
    transport: Arc<dyn Transport>,
    target: &RemoteTarget,
    sequence: &ActionSequence,
) -> OperationResult {
    Orchestrator::new(transport).run(target, sequence).await
}

/// Run every probe in one remote call and report which ones passed
///
/// A probe whose marker is missing from the output, or whose payload is not
/// `0`/`1`, is an error rather than `false`.
#[instrument(skip(transport, target, probes), fields(target = %target.display_name(), probes = probes.len()))]
pub async fn check_installed(
    transport: &dyn Transport,
    target: &RemoteTarget,
    probes: &[Probe],
) -> Result<BTreeMap<String, bool>, ActionError> {
    if probes.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut batch = MarkerBatch::shell();
    for probe in probes {
        batch.add(probe.marker.clone(), &probe.check)?;
    }
    let names: Vec<&str> = probes.iter().map(|p| p.name.as_str()).collect();
    let spec = CommandSpec::new(batch.script(), format!("probe {}", names.join(", ")));

    let result = transport.execute(target, &spec).await?;
    let mut payloads = batch.extract_all(&result.stdout);

    let mut installed = BTreeMap::new();
    for probe in probes {
        let payload = payloads.remove(&probe.marker).flatten();
        let present = match payload.as_deref() {
            Some("1") => true,
            Some("0") => false,
            Some(other) => {
                return Err(ActionError::parse(format!(
                    "probe '{}' printed unexpected payload '{}'",
                    probe.name, other
                )))
            }
            None if !result.is_success() => {
                return Err(ActionError::CommandFailed {
                    step: spec.summary.clone(),
                    exit_code: result.exit_code,
                    stderr: diagnostic(&result),
                })
            }
            None => {
                return Err(ActionError::parse(format!(
                    "probe '{}' produced no {} line",
                    probe.name, probe.marker
                )))
            }
        };
        debug!("Probe {}: {}", probe.name, present);
        installed.insert(probe.name.clone(), present);
    }
    Ok(installed)
}

/// Whether `database` exists on the engine's server
#[instrument(skip(transport, target), fields(target = %target.display_name()))]
pub async fn database_exists(
    transport: &dyn Transport,
    target: &RemoteTarget,
    engine: SqlEngine,
    database: &str,
) -> Result<bool, ActionError> {
    let name = sql_literal(engine, database)?;
    let query = match engine {
        SqlEngine::Mysql => format!(
            "SELECT COUNT(*) FROM information_schema.schemata WHERE schema_name = {}",
            name
        ),
        SqlEngine::Postgres => format!(
            "SELECT COUNT(*) FROM pg_catalog.pg_database WHERE datname = {}",
            name
        ),
    };

    let marker = Marker::new("DB_EXISTS")?;
    let mut batch = MarkerBatch::sql();
    batch.add(marker.clone(), &query)?;
    let spec = CommandBuilder::sql(engine, None, &batch.script())?
        .with_summary(format!("{}: database exists {}", engine, database));

    let result = execute_checked(transport, target, &spec).await?;
    let payload = batch
        .extract_all(&result.stdout)
        .remove(&marker)
        .flatten()
        .ok_or_else(|| ActionError::parse(format!("no {} line in query output", marker)))?;
    Ok(coerce_count(Some(&payload)) > 0)
}
