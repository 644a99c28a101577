//! Sequence files
//!
//! A sequence file names a target and lists recipe steps, in the order they
//! must run:
//!
//! ```yaml
//! name: shop database
//! target: db-1
//! steps:
//!   - uses: database/create
//!     with:
//!       engine: mysql
//!       database: shop
//!   - uses: database/create-user
//!     with:
//!       engine: mysql
//!       username: shop_app
//!       password: ${{ env.SHOP_DB_PASSWORD }}
//!   - name: grant app access
//!     uses: database/grant
//!     with:
//!       engine: mysql
//!       username: shop_app
//!       database: shop
//! ```
//!
//! Every step is built and validated before anything is sent to a host.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::expressions::{interpolate_with, ExpressionError};
use super::remote::{load_yaml, LoadError};
use crate::command::SqlEngine;
use crate::engine::action::{ActionSequence, ActionStep, BenignPatterns};
use crate::engine::error::ActionError;
use crate::recipes::{database, firewall, users, Protocol};

/// Recipe groups available to `uses`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeCategory {
    Database, // database/create, database/create-user, database/grant, ...
    Firewall, // firewall/allow, firewall/deny, firewall/allow-from, ...
    Users,    // users/create, users/set-password, users/delete
}

/// Parsed `uses` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    pub category: RecipeCategory,
    pub action: String,
}

impl ParsedAction {
    /// Parse an action string like "database/create"
    pub fn parse(uses: &str) -> Result<Self, ActionError> {
        let Some((category, action)) = uses.split_once('/') else {
            return Err(ActionError::invalid(format!(
                "Invalid action format '{}', expected 'category/action'",
                uses
            )));
        };
        let category = match category {
            "database" => RecipeCategory::Database,
            "firewall" => RecipeCategory::Firewall,
            "users" => RecipeCategory::Users,
            other => {
                return Err(ActionError::invalid(format!(
                    "Unknown action category: {}",
                    other
                )))
            }
        };
        Ok(Self {
            category,
            action: action.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceStep {
    /// Overrides the recipe's step name
    #[serde(default)]
    pub name: Option<String>,

    pub uses: String,

    #[serde(default)]
    pub with: HashMap<String, serde_yaml::Value>,

    /// Extra benign-failure patterns for this step
    #[serde(default)]
    pub tolerate: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceFile {
    pub name: String,

    /// Inventory id; the CLI can override it
    #[serde(default)]
    pub target: Option<String>,

    pub steps: Vec<SequenceStep>,
}

impl SequenceFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        load_yaml(path.as_ref())
    }

    /// Build with `${{ env.* }}` resolved from the process environment
    pub fn build(&self) -> Result<ActionSequence, ActionError> {
        self.build_with(&BenignPatterns::default(), |name| std::env::var(name).ok())
    }

    /// Build every step, adding `extra` benign patterns to each one
    pub fn build_with<F>(
        &self,
        extra: &BenignPatterns,
        lookup: F,
    ) -> Result<ActionSequence, ActionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.steps.is_empty() {
            return Err(ActionError::invalid(format!(
                "sequence '{}' has no steps",
                self.name
            )));
        }

        let mut sequence = ActionSequence::new(&self.name);
        for (idx, spec) in self.steps.iter().enumerate() {
            let context = format!("step {} ({})", idx + 1, spec.uses);
            let step = build_step(spec, &lookup).map_err(|e| e.with_context(&context))?;
            sequence.push(step.also_tolerate(extra.clone()));
        }
        Ok(sequence)
    }
}

fn build_step<F>(spec: &SequenceStep, lookup: &F) -> Result<ActionStep, ActionError>
where
    F: Fn(&str) -> Option<String>,
{
    let action = ParsedAction::parse(&spec.uses)?;
    let params = Params {
        values: &spec.with,
        lookup,
    };

    let mut step = match (action.category, action.action.as_str()) {
        (RecipeCategory::Database, "create") => {
            database::create_database(params.engine()?, &params.string("database")?)?
        }
        (RecipeCategory::Database, "create-user") => database::create_user(
            params.engine()?,
            &params.string("username")?,
            &params.string("password")?,
        )?,
        (RecipeCategory::Database, "grant") => database::grant_all(
            params.engine()?,
            &params.string("username")?,
            &params.string("database")?,
        )?,
        (RecipeCategory::Database, "drop") => {
            database::drop_database(params.engine()?, &params.string("database")?)?
        }
        (RecipeCategory::Database, "drop-user") => {
            database::drop_user(params.engine()?, &params.string("username")?)?
        }
        (RecipeCategory::Firewall, "allow") => {
            firewall::allow_port(params.port("port")?, params.protocol()?)?
        }
        (RecipeCategory::Firewall, "deny") => {
            firewall::deny_port(params.port("port")?, params.protocol()?)?
        }
        (RecipeCategory::Firewall, "allow-from") => firewall::allow_from(
            &params.string("source")?,
            params.optional("port")?.map(|_| params.port("port")).transpose()?,
        )?,
        (RecipeCategory::Firewall, "delete-allow") => {
            firewall::delete_allow_port(params.port("port")?, params.protocol()?)?
        }
        (RecipeCategory::Users, "create") => users::create_system_user(&params.string("username")?)?,
        (RecipeCategory::Users, "set-password") => users::set_password(
            &params.string("username")?,
            &params.string("password")?,
        )?,
        (RecipeCategory::Users, "delete") => users::delete_system_user(
            &params.string("username")?,
            params.flag("remove_home")?,
        )?,
        (_, other) => {
            return Err(ActionError::invalid(format!(
                "Unknown action '{}' in {}",
                other, spec.uses
            )))
        }
    };

    if let Some(name) = &spec.name {
        step.name = name.clone();
    }
    if !spec.tolerate.is_empty() {
        step = step.also_tolerate(BenignPatterns::new(&spec.tolerate)?);
    }
    Ok(step)
}

/// Typed access to a step's `with` map
struct Params<'a, F> {
    values: &'a HashMap<String, serde_yaml::Value>,
    lookup: &'a F,
}

impl<F> Params<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Scalar as text with expressions resolved; `None` if the key is absent
    fn optional(&self, key: &str) -> Result<Option<String>, ActionError> {
        let raw = match self.values.get(key) {
            None | Some(serde_yaml::Value::Null) => return Ok(None),
            Some(serde_yaml::Value::String(s)) => s.clone(),
            Some(serde_yaml::Value::Number(n)) => n.to_string(),
            Some(serde_yaml::Value::Bool(b)) => b.to_string(),
            Some(_) => {
                return Err(ActionError::invalid(format!(
                    "'{}' must be a string, number or boolean",
                    key
                )))
            }
        };
        interpolate_with(&raw, self.lookup)
            .map(Some)
            .map_err(|e| expression_error(key, e))
    }

    fn string(&self, key: &str) -> Result<String, ActionError> {
        self.optional(key)?
            .ok_or_else(|| ActionError::invalid(format!("missing required parameter '{}'", key)))
    }

    fn engine(&self) -> Result<SqlEngine, ActionError> {
        self.string("engine")?.parse()
    }

    fn port(&self, key: &str) -> Result<u16, ActionError> {
        let raw = self.string(key)?;
        raw.trim().parse().map_err(|_| {
            ActionError::invalid(format!("'{}' must be a port number, got '{}'", key, raw))
        })
    }

    fn protocol(&self) -> Result<Protocol, ActionError> {
        match self.optional("protocol")? {
            Some(p) => p.parse(),
            None => Ok(Protocol::Any),
        }
    }

    fn flag(&self, key: &str) -> Result<bool, ActionError> {
        match self.optional(key)?.as_deref() {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(ActionError::invalid(format!(
                "'{}' must be true or false, got '{}'",
                key, other
            ))),
        }
    }
}

fn expression_error(key: &str, err: ExpressionError) -> ActionError {
    match err {
        ExpressionError::UnknownVariable(_) => {
            ActionError::Config(format!("parameter '{}': {}", key, err))
        }
        ExpressionError::InvalidSyntax(_) => {
            ActionError::invalid(format!("parameter '{}': {}", key, err))
        }
    }
}
