//! `ufw` rule steps

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command::CommandBuilder;
use crate::engine::action::{ActionStep, BenignPatterns};
use crate::engine::error::ActionError;

const EXISTING_RULE: &str = r"(?i)skipping (adding )?existing rule";
const MISSING_RULE: &str = r"(?i)could not delete non-existent rule";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    #[default]
    Any,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Any => "any",
        })
    }
}

impl FromStr for Protocol {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "any" | "" => Ok(Protocol::Any),
            other => Err(ActionError::invalid(format!(
                "unknown protocol '{}' (expected tcp, udp or any)",
                other
            ))),
        }
    }
}

fn port_spec(port: u16, protocol: Protocol) -> Result<String, ActionError> {
    if port == 0 {
        return Err(ActionError::invalid("port must be between 1 and 65535"));
    }
    Ok(match protocol {
        Protocol::Any => port.to_string(),
        proto => format!("{}/{}", port, proto),
    })
}

/// Accepts an address (`10.0.0.5`) or a network in CIDR form (`10.0.0.0/8`)
pub fn validate_source(source: &str) -> Result<String, ActionError> {
    let invalid = || ActionError::invalid(format!("'{}' is not an IP address or CIDR network", source));
    let (addr, prefix) = match source.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (source, None),
    };
    let ip: IpAddr = addr.parse().map_err(|_| invalid())?;
    match prefix {
        None => Ok(ip.to_string()),
        Some(prefix) => {
            let bits: u8 = prefix.parse().map_err(|_| invalid())?;
            let max = if ip.is_ipv4() { 32 } else { 128 };
            if bits > max {
                return Err(invalid());
            }
            Ok(format!("{}/{}", ip, bits))
        }
    }
}

fn ufw_step(name: String, args: &[String]) -> Result<ActionStep, ActionError> {
    Ok(ActionStep::new(name, CommandBuilder::cli("ufw", args)?))
}

pub fn allow_port(port: u16, protocol: Protocol) -> Result<ActionStep, ActionError> {
    let spec = port_spec(port, protocol)?;
    let step = ufw_step(format!("allow {}", spec), &["allow".to_string(), spec])?;
    Ok(step.tolerate(BenignPatterns::new(&[EXISTING_RULE])?))
}

pub fn deny_port(port: u16, protocol: Protocol) -> Result<ActionStep, ActionError> {
    let spec = port_spec(port, protocol)?;
    let step = ufw_step(format!("deny {}", spec), &["deny".to_string(), spec])?;
    Ok(step.tolerate(BenignPatterns::new(&[EXISTING_RULE])?))
}

/// Allow traffic from `source`, optionally only to one port
pub fn allow_from(source: &str, port: Option<u16>) -> Result<ActionStep, ActionError> {
    let source = validate_source(source)?;
    let mut args = vec!["allow".to_string(), "from".to_string(), source.clone()];
    let mut name = format!("allow from {}", source);
    if let Some(port) = port {
        let spec = port_spec(port, Protocol::Any)?;
        args.extend(["to".to_string(), "any".to_string(), "port".to_string(), spec.clone()]);
        name.push_str(&format!(" to port {}", spec));
    }
    let step = ufw_step(name, &args)?;
    Ok(step.tolerate(BenignPatterns::new(&[EXISTING_RULE])?))
}

pub fn delete_allow_port(port: u16, protocol: Protocol) -> Result<ActionStep, ActionError> {
    let spec = port_spec(port, protocol)?;
    let step = ufw_step(
        format!("delete allow {}", spec),
        &["delete".to_string(), "allow".to_string(), spec],
    )?;
    Ok(step.tolerate(BenignPatterns::new(&[MISSING_RULE])?))
}
