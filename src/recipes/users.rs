//! System account steps

use crate::command::CommandBuilder;
use crate::engine::action::{ActionStep, BenignPatterns};
use crate::engine::error::ActionError;

/// `useradd -m` with a bash login shell
pub fn create_system_user(username: &str) -> Result<ActionStep, ActionError> {
    let username = CommandBuilder::system_username(username)?;
    let command = CommandBuilder::cli("useradd", &["-m", "-s", "/bin/bash", username])?;
    Ok(ActionStep::new(format!("create system user {}", username), command)
        .tolerate(BenignPatterns::already_exists()))
}

/// Set a password through `chpasswd`; the password goes over stdin
pub fn set_password(username: &str, password: &str) -> Result<ActionStep, ActionError> {
    let username = CommandBuilder::system_username(username)?;
    if password.is_empty() || password.contains(['\n', '\r', '\0']) {
        return Err(ActionError::invalid(
            "password must be non-empty and must not contain line breaks or NUL",
        ));
    }
    let payload = format!("{}:{}\n", username, password);
    let command = CommandBuilder::stdin_payload::<&str>("chpasswd", &[], &payload)?
        .with_summary(format!("chpasswd <{}>", username));
    Ok(ActionStep::new(format!("set password for {}", username), command))
}

/// `userdel`, optionally removing the home directory
pub fn delete_system_user(username: &str, remove_home: bool) -> Result<ActionStep, ActionError> {
    let username = CommandBuilder::system_username(username)?;
    let command = if remove_home {
        CommandBuilder::cli("userdel", &["-r", username])?
    } else {
        CommandBuilder::cli("userdel", &[username])?
    };
    Ok(ActionStep::new(format!("delete system user {}", username), command)
        .tolerate(BenignPatterns::new(&[r"(?i)does not exist"])?))
}
