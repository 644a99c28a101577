//! Database provisioning steps for MySQL and PostgreSQL
//!
//! Identifiers are allow-listed and quoted for the engine; passwords travel
//! as escaped SQL literals inside the out-of-band SQL payload, so they never
//! show up in a command line or a step summary.

use crate::command::{quote_identifier, sql_literal, validate_identifier, CommandBuilder, SqlEngine};
use crate::engine::action::{ActionSequence, ActionStep, BenignPatterns};
use crate::engine::error::ActionError;

/// MySQL: CREATE USER / DROP USER on an account that does (not) exist
const MYSQL_ACCOUNT_CONFLICT: &str = r"ERROR 1396";
/// MySQL: database exists
const MYSQL_DB_EXISTS: &str = r"ERROR 1007";
/// MySQL: database doesn't exist
const MYSQL_DB_MISSING: &str = r"ERROR 1008";
const DOES_NOT_EXIST: &str = r"(?i)does ?n[o']t exist";

fn account(engine: SqlEngine, username: &str) -> Result<String, ActionError> {
    let username = validate_identifier("username", username)?;
    match engine {
        SqlEngine::Mysql => Ok(format!("{}@'localhost'", sql_literal(engine, username)?)),
        SqlEngine::Postgres => quote_identifier(engine, "username", username),
    }
}

fn sql_step(
    name: String,
    engine: SqlEngine,
    sql: &str,
    summary: String,
) -> Result<ActionStep, ActionError> {
    let command = CommandBuilder::sql(engine, None, sql)?.with_summary(summary);
    Ok(ActionStep::new(name, command))
}

pub fn create_database(engine: SqlEngine, database: &str) -> Result<ActionStep, ActionError> {
    let db = quote_identifier(engine, "database", database)?;
    let sql = match engine {
        SqlEngine::Mysql => format!(
            "CREATE DATABASE {} CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci;",
            db
        ),
        SqlEngine::Postgres => format!("CREATE DATABASE {} ENCODING 'UTF8';", db),
    };
    let step = sql_step(
        format!("create database {}", database),
        engine,
        &sql,
        format!("{}: CREATE DATABASE {}", engine, database),
    )?;
    Ok(step.tolerate(BenignPatterns::already_exists().and(&[MYSQL_DB_EXISTS])?))
}

pub fn create_user(
    engine: SqlEngine,
    username: &str,
    password: &str,
) -> Result<ActionStep, ActionError> {
    let who = account(engine, username)?;
    let secret = sql_literal(engine, password)?;
    let sql = match engine {
        SqlEngine::Mysql => format!("CREATE USER {} IDENTIFIED BY {};", who, secret),
        SqlEngine::Postgres => format!("CREATE ROLE {} WITH LOGIN PASSWORD {};", who, secret),
    };
    let step = sql_step(
        format!("create user {}", username),
        engine,
        &sql,
        format!("{}: CREATE USER {}", engine, username),
    )?;
    Ok(step.tolerate(BenignPatterns::already_exists().and(&[MYSQL_ACCOUNT_CONFLICT])?))
}

/// Grant every privilege on `database` to `username`
pub fn grant_all(
    engine: SqlEngine,
    username: &str,
    database: &str,
) -> Result<ActionStep, ActionError> {
    let who = account(engine, username)?;
    let db = quote_identifier(engine, "database", database)?;
    let sql = match engine {
        SqlEngine::Mysql => format!(
            "GRANT ALL PRIVILEGES ON {}.* TO {}; FLUSH PRIVILEGES;",
            db, who
        ),
        SqlEngine::Postgres => format!("GRANT ALL PRIVILEGES ON DATABASE {} TO {};", db, who),
    };
    sql_step(
        format!("grant {} on {}", username, database),
        engine,
        &sql,
        format!("{}: GRANT ALL ON {} TO {}", engine, database, username),
    )
}

pub fn drop_database(engine: SqlEngine, database: &str) -> Result<ActionStep, ActionError> {
    let db = quote_identifier(engine, "database", database)?;
    let step = sql_step(
        format!("drop database {}", database),
        engine,
        &format!("DROP DATABASE {};", db),
        format!("{}: DROP DATABASE {}", engine, database),
    )?;
    Ok(step.tolerate(BenignPatterns::new(&[DOES_NOT_EXIST, MYSQL_DB_MISSING])?))
}

pub fn drop_user(engine: SqlEngine, username: &str) -> Result<ActionStep, ActionError> {
    let who = account(engine, username)?;
    let sql = match engine {
        SqlEngine::Mysql => format!("DROP USER {};", who),
        SqlEngine::Postgres => format!("DROP ROLE {};", who),
    };
    let step = sql_step(
        format!("drop user {}", username),
        engine,
        &sql,
        format!("{}: DROP USER {}", engine, username),
    )?;
    Ok(step.tolerate(BenignPatterns::new(&[DOES_NOT_EXIST, MYSQL_ACCOUNT_CONFLICT])?))
}

/// Database, owner account and grant as one sequence
pub fn provision_database(
    engine: SqlEngine,
    database: &str,
    username: &str,
    password: &str,
) -> Result<ActionSequence, ActionError> {
    Ok(
        ActionSequence::new(format!("provision {} database {}", engine, database))
            .then(create_database(engine, database)?)
            .then(create_user(engine, username, password)?)
            .then(grant_all(engine, username, database)?),
    )
}
