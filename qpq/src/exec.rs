use anyhow::{Context, Result};
use std::process::Command;

/// Run `command` through the platform shell with the terminal attached and
/// return its exit code.
pub fn run_shell_command(command: &str) -> Result<i32> {
    let (shell, flag) = if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };

    tracing::debug!("running via {shell}: {command}");
    let status = Command::new(shell)
        .arg(flag)
        .arg(command)
        .status()
        .with_context(|| format!("failed to start {shell}"))?;

    // Killed by a signal: report a generic failure.
    Ok(status.code().unwrap_or(1))
}
