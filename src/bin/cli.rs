use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use remote_actions::config::DEFAULT_CONFIG_FILE;
use remote_actions::prelude::*;
use remote_actions::tabular::Row;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "remote-actions")]
#[command(about = "Run queries and provisioning steps on remote servers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SQL query and print the rows
    Query {
        /// Inventory id of the server
        #[arg(short, long)]
        target: String,

        /// mysql or postgres
        #[arg(short, long)]
        engine: SqlEngine,

        #[arg(short, long)]
        database: Option<String>,

        /// SQL text
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        sql: Option<String>,

        /// Read SQL from a file
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check which database engines are installed
    Probe {
        /// Inventory ids; probed concurrently
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,

        /// Engines to probe (default: all)
        #[arg(short, long = "engine")]
        engines: Vec<SqlEngine>,
    },

    /// Run a sequence file
    Provision {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Overrides the file's target
        #[arg(short, long)]
        target: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured targets
    Targets,

    /// Validate a sequence file without connecting
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "remote_actions=debug"
    } else {
        "remote_actions=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "remote-actions failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = RemoteConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Query {
            target,
            engine,
            database,
            sql,
            file,
            json,
        } => {
            let sql = match (sql, file) {
                (Some(sql), _) => sql,
                (None, Some(file)) => std::fs::read_to_string(&file)?,
                (None, None) => anyhow::bail!("either --sql or --file is required"),
            };
            query(&config, &target, engine, database.as_deref(), &sql, json).await
        }
        Commands::Probe { targets, engines } => probe(&config, &targets, &engines).await,
        Commands::Provision { file, target, json } => {
            provision(&config, file, target, json).await
        }
        Commands::Targets => list_targets(&config),
        Commands::Validate { file } => validate(&config, file),
    }
}

fn transport(config: &RemoteConfig) -> Arc<dyn Transport> {
    Arc::new(SshTransport::with_config(config.ssh_config()))
}

async fn query(
    config: &RemoteConfig,
    target_id: &str,
    engine: SqlEngine,
    database: Option<&str>,
    sql: &str,
    json: bool,
) -> anyhow::Result<bool> {
    let target = InventoryDirectory::from_config(config)
        .resolve(target_id)
        .await?;
    let transport = transport(config);

    let table = match run_query(transport.as_ref(), &target, engine, database, sql).await {
        Ok(table) => table,
        Err(e @ ActionError::CommandFailed { .. }) => {
            eprintln!("✗ {}", e);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        let rows: Vec<&Row> = table.rows.iter().collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if table.is_empty() {
        println!("(no results)");
    } else {
        println!("{}", table.columns.join("\t"));
        for row in &table.rows {
            let values: Vec<&str> = row.values().map(|v| v.unwrap_or("NULL")).collect();
            println!("{}", values.join("\t"));
        }
        println!("\n{} row(s)", table.rows.len());
    }
    Ok(true)
}

async fn probe(
    config: &RemoteConfig,
    target_ids: &[String],
    engines: &[SqlEngine],
) -> anyhow::Result<bool> {
    let probes = if engines.is_empty() {
        default_engine_probes()?
    } else {
        engines
            .iter()
            .map(|e| Probe::command_exists(e.name(), e.client_binary()))
            .collect::<Result<Vec<_>, _>>()?
    };

    let directory = InventoryDirectory::from_config(config);
    let transport = transport(config);

    let checks = target_ids.iter().map(|id| {
        let directory = &directory;
        let transport = transport.clone();
        let probes = &probes;
        async move {
            let target = directory.resolve(id).await?;
            check_installed(transport.as_ref(), &target, probes).await
        }
    });
    let results = join_all(checks).await;

    println!("=== Installed Engines ===\n");
    let mut all_ok = true;
    for (id, result) in target_ids.iter().zip(results) {
        match result {
            Ok(installed) => {
                println!("✓ {}", id);
                for (name, present) in installed {
                    println!("    {}: {}", name, if present { "installed" } else { "missing" });
                }
            }
            Err(e) => {
                all_ok = false;
                println!("✗ {}", id);
                println!("    Error ({}): {}", e.kind(), e);
            }
        }
    }
    Ok(all_ok)
}

#[tracing::instrument(skip(config, json), fields(file = %file.display()))]
async fn provision(
    config: &RemoteConfig,
    file: PathBuf,
    target: Option<String>,
    json: bool,
) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("Sequence file not found: {}", file.display());
    }

    let sequence_file = SequenceFile::load(&file)?;
    let sequence = sequence_file.build_with(&config.benign_patterns()?, |name| {
        std::env::var(name).ok()
    })?;

    let Some(target_id) = target.or_else(|| sequence_file.target.clone()) else {
        anyhow::bail!("No target given: set `target:` in the file or pass --target");
    };
    let target = InventoryDirectory::from_config(config)
        .resolve(&target_id)
        .await?;

    if !json {
        println!("Running sequence: {} on {}\n", sequence.name, target_id);
    }
    let result = run_provisioning_sequence(transport(config), &target, &sequence).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_operation_result(&result);
    }
    Ok(result.success)
}

fn list_targets(config: &RemoteConfig) -> anyhow::Result<bool> {
    if config.targets.is_empty() {
        println!("No targets configured");
        return Ok(true);
    }

    println!("Targets:\n");
    for (id, entry) in &config.targets {
        println!(
            "  {} ({}@{}:{}, key {})",
            id,
            entry.username,
            entry.host,
            entry.port,
            entry.key_file.display()
        );
    }
    Ok(true)
}

fn validate(config: &RemoteConfig, file: PathBuf) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("Path not found: {}", file.display());
    }

    let sequence_file = SequenceFile::load(&file)?;
    let sequence = sequence_file.build_with(&config.benign_patterns()?, |name| {
        std::env::var(name).ok()
    })?;
    println!("✓ {} is valid ({} steps)", file.display(), sequence.len());
    Ok(true)
}

fn print_operation_result(result: &OperationResult) {
    println!("\n=== Sequence Result ===\n");
    println!("Success: {}", if result.success { "YES" } else { "NO" });
    println!("{}\n", result.message);

    for (i, step) in result.steps.iter().enumerate() {
        let status = match step.outcome {
            remote_actions::StepOutcome::Success => "✓",
            remote_actions::StepOutcome::Benign => "~",
            remote_actions::StepOutcome::Fatal => "✗",
        };
        println!(
            "  {} Step {}: {} ({}ms)",
            status,
            i + 1,
            step.name,
            step.elapsed_ms
        );
    }

    if !result.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &result.warnings {
            println!("  {}", warning);
        }
    }
}
