use clap::ValueEnum;
use std::fmt;

/// The interactive shell whose history we read.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Zsh,
    Bash,
    Fish,
    #[value(name = "powershell", alias = "pwsh")]
    PowerShell,
    Unknown,
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellKind::Zsh => write!(f, "zsh"),
            ShellKind::Bash => write!(f, "bash"),
            ShellKind::Fish => write!(f, "fish"),
            ShellKind::PowerShell => write!(f, "powershell"),
            ShellKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify the shell from its path (`$SHELL`, or `%COMSPEC%` on Windows).
///
/// The substring checks are case-sensitive and run in a fixed priority order. When nothing matches,
/// Windows falls back to PowerShell and every other platform to zsh.
pub fn detect_shell(shell_path: Option<&str>, windows: bool) -> ShellKind {
    if let Some(path) = shell_path {
        if path.contains("zsh") {
            return ShellKind::Zsh;
        }
        if path.contains("bash") {
            return ShellKind::Bash;
        }
        if path.contains("fish") {
            return ShellKind::Fish;
        }
        if path.contains("powershell") || path.contains("pwsh") {
            return ShellKind::PowerShell;
        }
    }

    if windows {
        ShellKind::PowerShell
    } else {
        ShellKind::Zsh
    }
}

pub fn bash_wrapper_snippet(buffer: usize) -> String {
    format!(
        r#"# qpq bash wrapper
# Add to ~/.bashrc
# Hands the in-memory history of this shell to qpq (oldest-first, base64).

qpq() {{
  local __qpq_hist
  __qpq_hist="$(fc -ln -{buffer} 2>/dev/null | sed 's/^[[:space:]]*//' | tr '\n' '|' | base64 | tr -d '\n')"
  QPQ_SHELL_HISTORY="${{__qpq_hist}}" command qpq "$@"
}}
"#
    )
}

pub fn zsh_wrapper_snippet(buffer: usize) -> String {
    format!(
        r#"# qpq zsh wrapper
# Add to ~/.zshrc
# Hands the in-memory history of this shell to qpq (oldest-first, base64).

qpq() {{
  local __qpq_hist
  __qpq_hist="$(fc -ln -{buffer} 2>/dev/null | tr '\n' '|' | base64 | tr -d '\n')"
  QPQ_SHELL_HISTORY="${{__qpq_hist}}" command qpq "$@"
}}
"#
    )
}
