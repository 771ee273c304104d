use super::dedupe::dedupe;
use super::{HistoryBackend, HistoryError};
use crate::shell::ShellKind;
use regex::Regex;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A program plus arguments, spawned without a shell in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// The command that prints recent history for `shell`.
pub fn history_invocation(shell: ShellKind, count: usize) -> Invocation {
    let tail = format!("history | tail -n {count}");
    let tail = tail.as_str();
    let get_history = format!("Get-History -Count {count} | ForEach-Object {{ $_.CommandLine }}");
    match shell {
        ShellKind::Zsh => Invocation::new("zsh", &["-c", tail]),
        ShellKind::Bash => Invocation::new("bash", &["-c", tail]),
        ShellKind::Fish => Invocation::new("fish", &["-c", "history"]),
        ShellKind::PowerShell => Invocation::new(
            "pwsh",
            &["-NoProfile", "-Command", get_history.as_str()],
        ),
        ShellKind::Unknown => Invocation::new("sh", &["-c", tail]),
    }
}

/// Ask the shell itself for its history. Any failure yields an empty list.
pub fn history_from_subprocess<B: HistoryBackend + ?Sized>(
    backend: &B,
    shell: ShellKind,
    count: usize,
    timeout: Duration,
) -> Vec<String> {
    let invocation = history_invocation(shell, count);
    let result = backend
        .run(&invocation, timeout)
        .and_then(|output| parse_history_output(&output, shell));

    match result {
        Ok(mut commands) => {
            commands.truncate(count);
            commands
        }
        Err(e) => {
            tracing::debug!("history subprocess unavailable for {shell}: {e}");
            Vec::new()
        }
    }
}

/// Turn `history` builtin output into distinct commands, newest-first.
pub fn parse_history_output(output: &str, shell: ShellKind) -> Result<Vec<String>, HistoryError> {
    let lines: Vec<&str> = output.trim().lines().collect();

    match shell {
        ShellKind::Zsh | ShellKind::Bash | ShellKind::Unknown => {
            // "  123  git status", or "  123* git status" for foreign entries
            let index = Regex::new(r"^[ \t]*\d+\*?[ \t]+")?;
            let stripped: Vec<String> = lines
                .iter()
                .map(|line| index.replace(line, "").into_owned())
                .collect();
            Ok(dedupe(&stripped, true))
        }
        ShellKind::PowerShell => Ok(dedupe(&lines, true)),
        // fish prints its history newest-first already
        ShellKind::Fish => Ok(dedupe(&lines, false)),
    }
}

/// Spawn `invocation` and collect its stdout, killing it after `timeout`.
pub fn run_with_timeout(invocation: &Invocation, timeout: Duration) -> Result<String, HistoryError> {
    let program = invocation.program.clone();
    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| HistoryError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Drain stdout on the side so a long history can't fill the pipe.
    let (tx, rx) = mpsc::channel();
    if let Some(mut stdout) = child.stdout.take() {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let result = stdout.read_to_end(&mut buf).map(|_| buf);
            // The receiver is gone once we've given up waiting.
            let _sent = tx.send(result);
        });
    } else {
        drop(tx);
    }

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                if let Err(e) = child.kill() {
                    tracing::debug!("killing {program}: {e}");
                }
                if let Err(e) = child.wait() {
                    tracing::debug!("reaping {program}: {e}");
                }
                return Err(HistoryError::TimedOut { program, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(HistoryError::Wait { program, source }),
        }
    };

    if !status.success() {
        return Err(HistoryError::Failed { program, status });
    }

    // A grandchild (a background job, `tail`) can hold stdout open past the
    // child's exit, so the read shares the same deadline.
    let bytes = match rx.recv_timeout(timeout.saturating_sub(started.elapsed())) {
        Ok(result) => result.map_err(|source| HistoryError::Output {
            program: program.clone(),
            source,
        })?,
        Err(RecvTimeoutError::Timeout) => {
            return Err(HistoryError::TimedOut { program, timeout });
        }
        Err(RecvTimeoutError::Disconnected) => Vec::new(),
    };

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
