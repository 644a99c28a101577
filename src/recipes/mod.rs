//! Provisioning recipes
//!
//! Factories that return ready-made [`ActionStep`](crate::engine::ActionStep)s
//! with the right benign-failure rules for common server tasks:
//! - `database` - databases, accounts and grants (MySQL, PostgreSQL)
//! - `firewall` - `ufw` rules
//! - `users` - system accounts
//! - `probes` - installation checks

pub mod database;
pub mod firewall;
pub mod probes;
pub mod users;

pub use firewall::Protocol;
pub use probes::{default_engine_probes, Probe};
