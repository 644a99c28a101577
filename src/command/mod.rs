//! Command construction
//!
//! - `escape` - shell and SQL escaping, identifier allow-list
//! - `engine` - SQL engines and their clients
//! - `builder` - typed intents to [`crate::transport::CommandSpec`]

pub mod builder;
pub mod engine;
pub mod escape;

pub use builder::{decode_payload, CommandBuilder};
pub use engine::SqlEngine;
pub use escape::{quote_identifier, shell_quote, sql_literal, validate_identifier};
