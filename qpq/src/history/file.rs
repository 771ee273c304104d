use super::dedupe::dedupe;
use super::{HistoryBackend, HistoryEnv, HistoryError};
use crate::shell::ShellKind;
use regex::Regex;
use std::path::PathBuf;

/// Where the shell keeps its history on disk, if it has a format we read.
pub fn history_file_path(shell: ShellKind, env: &HistoryEnv) -> Option<PathBuf> {
    match shell {
        ShellKind::Zsh => Some(env.home.as_ref()?.join(".zsh_history")),
        ShellKind::Bash => Some(env.home.as_ref()?.join(".bash_history")),
        ShellKind::Fish => {
            let data_dir = match &env.xdg_data_home {
                Some(dir) if dir.is_absolute() => dir.clone(),
                _ => env.home.as_ref()?.join(".local").join("share"),
            };
            Some(data_dir.join("fish").join("fish_history"))
        }
        ShellKind::PowerShell | ShellKind::Unknown => None,
    }
}

/// Read the last `count` distinct commands from the shell's history file,
/// newest-first. A missing or unreadable file yields an empty list.
pub fn read_history_file<B: HistoryBackend + ?Sized>(
    backend: &B,
    env: &HistoryEnv,
    shell: ShellKind,
    count: usize,
) -> Vec<String> {
    match try_read_history_file(backend, env, shell, count) {
        Ok(commands) => commands,
        Err(e) => {
            tracing::debug!("history file unavailable for {shell}: {e}");
            Vec::new()
        }
    }
}

fn try_read_history_file<B: HistoryBackend + ?Sized>(
    backend: &B,
    env: &HistoryEnv,
    shell: ShellKind,
    count: usize,
) -> Result<Vec<String>, HistoryError> {
    let path = history_file_path(shell, env).ok_or(HistoryError::NoHistoryFile(shell))?;

    let bytes = backend.read_file(&path).map_err(|source| HistoryError::Read {
        path: path.clone(),
        source,
    })?;
    // zsh metafies non-ASCII bytes, so don't insist on valid UTF-8.
    let content = String::from_utf8_lossy(&bytes);

    let oldest_first = parse_history(&content, shell)?;
    tracing::debug!(
        "parsed {} entries from {}",
        oldest_first.len(),
        path.display()
    );

    let mut commands = dedupe(&oldest_first, true);
    commands.truncate(count);
    Ok(commands)
}

/// Parse raw history file contents into commands, in file order (oldest-first).
pub fn parse_history(content: &str, shell: ShellKind) -> Result<Vec<String>, HistoryError> {
    match shell {
        ShellKind::Zsh => parse_zsh(content),
        ShellKind::Fish => Ok(parse_fish(content)),
        _ => Ok(parse_bash(content)),
    }
}

/// Extended zsh history: `: <epoch>:<duration>;<command>`.
///
/// Only the first `;` after the two numeric fields splits; anything after it,
/// semicolons included, is the command.
fn parse_zsh(content: &str) -> Result<Vec<String>, HistoryError> {
    let re = Regex::new(r"^: \d+:\d+;(.+)$")?;
    Ok(content
        .lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect())
}

/// Plain bash history, one command per line. With `HISTTIMEFORMAT` set, bash
/// interleaves `#<epoch>` marker lines, which are dropped.
fn parse_bash(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.is_empty())
        .filter(|line| !is_timestamp_marker(line))
        .map(str::to_string)
        .collect()
}

fn is_timestamp_marker(line: &str) -> bool {
    line.strip_prefix('#')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Fish's YAML-ish history: `- cmd: <command>` followed by `when:`/`paths:`.
fn parse_fish(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.strip_prefix("- cmd:"))
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty())
        .map(str::to_string)
        .collect()
}
