//! Recent shell history for the "add from history" flow.
//!
//! Three sources are tried in order and the first one that yields anything
//! wins: the `QPQ_SHELL_HISTORY` hand-off from the shell wrapper, the shell's
//! history file, and finally the shell's own `history` builtin. Every failure
//! along the way only means "this source is unavailable"; the worst outcome is
//! an empty list.

mod dedupe;
mod env;
mod file;
mod subprocess;

pub use env::HISTORY_ENV_VAR;
pub use file::history_file_path;
pub use subprocess::Invocation;

use env::history_from_env_var;
use file::read_history_file;
use subprocess::{history_from_subprocess, run_with_timeout};

use crate::shell::{ShellKind, detect_shell};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Over-fetch factor applied before deduplication.
pub const DEFAULT_BUFFER_MULTIPLIER: f64 = 1.6;

/// How many entries the shell wrapper captures by default.
pub const DEFAULT_HISTORY_BUFFER_SIZE: usize = 40;

pub const DEFAULT_SUBPROCESS_TIMEOUT: Duration = Duration::from_millis(500);

/// Why a single history source produced nothing.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("no readable history file for {0}")]
    NoHistoryFile(ShellKind),

    #[error("reading {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("history pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("spawning {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("waiting for {program}: {source}")]
    Wait { program: String, source: io::Error },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("reading output of {program}: {source}")]
    Output { program: String, source: io::Error },
}

/// Snapshot of the process environment the pipeline depends on.
#[derive(Debug, Clone, Default)]
pub struct HistoryEnv {
    /// `$SHELL`, or `%COMSPEC%` when `$SHELL` is unset.
    pub shell_path: Option<String>,
    pub home: Option<PathBuf>,
    pub xdg_data_home: Option<PathBuf>,
    /// Raw value of `QPQ_SHELL_HISTORY`.
    pub env_history: Option<String>,
    pub windows: bool,
}

impl HistoryEnv {
    pub fn from_process() -> Self {
        let shell_path = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("COMSPEC").ok());

        Self {
            shell_path,
            home: dirs::home_dir(),
            xdg_data_home: std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
            env_history: std::env::var(HISTORY_ENV_VAR).ok(),
            windows: cfg!(windows),
        }
    }

    pub fn shell(&self) -> ShellKind {
        detect_shell(self.shell_path.as_deref(), self.windows)
    }
}

/// The I/O the pipeline performs: reading files and running the shell.
pub trait HistoryBackend {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<String, HistoryError>;
}

/// Real filesystem and real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

impl HistoryBackend for SystemBackend {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<String, HistoryError> {
        run_with_timeout(invocation, timeout)
    }
}

/// `max(count, round(count * multiplier))`.
pub fn buffer_size(count: usize, multiplier: f64) -> usize {
    let scaled = (count as f64 * multiplier).round();
    if scaled.is_finite() && scaled > count as f64 {
        scaled as usize
    } else {
        count
    }
}

#[derive(Debug, Clone)]
pub struct HistoryPipeline<B = SystemBackend> {
    env: HistoryEnv,
    backend: B,
    shell: Option<ShellKind>,
    timeout: Duration,
}

impl HistoryPipeline<SystemBackend> {
    pub fn from_process() -> Self {
        Self::new(HistoryEnv::from_process(), SystemBackend)
    }
}

impl<B: HistoryBackend> HistoryPipeline<B> {
    pub fn new(env: HistoryEnv, backend: B) -> Self {
        Self {
            env,
            backend,
            shell: None,
            timeout: DEFAULT_SUBPROCESS_TIMEOUT,
        }
    }

    /// Use `shell` instead of detecting it from the environment.
    pub fn with_shell(mut self, shell: ShellKind) -> Self {
        self.shell = Some(shell);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn shell(&self) -> ShellKind {
        self.shell.unwrap_or_else(|| self.env.shell())
    }

    /// Up to `count` distinct recent commands, newest-first.
    pub fn last_commands(&self, count: usize) -> Vec<String> {
        self.last_commands_buffered(count, DEFAULT_BUFFER_MULTIPLIER)
    }

    pub fn last_commands_buffered(&self, count: usize, multiplier: f64) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }

        // The wrapper's hand-off is authoritative whenever it has anything.
        if let Some(mut commands) = history_from_env_var(self.env.env_history.as_deref()) {
            tracing::debug!("using {} commands from {HISTORY_ENV_VAR}", commands.len());
            commands.truncate(count);
            return commands;
        }

        let shell = self.shell();
        let buffer = buffer_size(count, multiplier);

        let mut commands = read_history_file(&self.backend, &self.env, shell, buffer);
        if !commands.is_empty() {
            tracing::debug!("using {} commands from the {shell} history file", commands.len());
            commands.truncate(count);
            return commands;
        }

        let commands = history_from_subprocess(&self.backend, shell, count, self.timeout);
        tracing::debug!("{shell} history subprocess returned {} commands", commands.len());
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::subprocess::history_invocation;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeBackend {
        files: HashMap<PathBuf, Vec<u8>>,
        output: Option<String>,
        reads: RefCell<Vec<PathBuf>>,
        spawns: RefCell<Vec<Invocation>>,
    }

    impl HistoryBackend for FakeBackend {
        fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.reads.borrow_mut().push(path.to_path_buf());
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<String, HistoryError> {
            self.spawns.borrow_mut().push(invocation.clone());
            self.output.clone().ok_or(HistoryError::TimedOut {
                program: invocation.program.clone(),
                timeout,
            })
        }
    }

    fn zsh_env() -> HistoryEnv {
        HistoryEnv {
            shell_path: Some("/bin/zsh".to_string()),
            home: Some(PathBuf::from("/home/u")),
            ..HistoryEnv::default()
        }
    }

    #[test]
    fn buffer_size_over_fetches() {
        assert_eq!(buffer_size(30, 1.6), 48);
        assert_eq!(buffer_size(5, 1.6), 8);
        assert_eq!(buffer_size(5, 0.5), 5);
        assert_eq!(buffer_size(5, f64::NAN), 5);
        assert_eq!(buffer_size(0, 1.6), 0);
    }

    #[test]
    fn env_var_is_authoritative() {
        let mut env = zsh_env();
        env.env_history = Some(BASE64.encode("a|b|c|d|e|f|g|b"));
        let backend = FakeBackend::default();

        let pipeline = HistoryPipeline::new(env, backend);
        assert_eq!(
            pipeline.last_commands(5),
            vec!["b", "g", "f", "e", "d"]
        );
        assert!(pipeline.backend.reads.borrow().is_empty());
        assert!(pipeline.backend.spawns.borrow().is_empty());
    }

    #[test]
    fn short_env_var_still_wins() {
        let mut env = zsh_env();
        env.env_history = Some(BASE64.encode("only"));
        let mut backend = FakeBackend::default();
        backend.files.insert(
            PathBuf::from("/home/u/.zsh_history"),
            b": 1:0;from file\n".to_vec(),
        );

        let pipeline = HistoryPipeline::new(env, backend);
        assert_eq!(pipeline.last_commands(5), vec!["only"]);
        assert!(pipeline.backend.reads.borrow().is_empty());
    }

    #[test]
    fn falls_back_to_history_file() {
        let mut env = zsh_env();
        env.env_history = Some("%%% not base64".to_string());
        let mut backend = FakeBackend::default();
        backend.files.insert(
            PathBuf::from("/home/u/.zsh_history"),
            b": 1:0;ls\n: 2:0;git status\n: 3:0;ls\n".to_vec(),
        );

        let pipeline = HistoryPipeline::new(env, backend);
        assert_eq!(pipeline.last_commands(5), vec!["ls", "git status"]);
        assert_eq!(
            *pipeline.backend.reads.borrow(),
            vec![PathBuf::from("/home/u/.zsh_history")]
        );
        assert!(pipeline.backend.spawns.borrow().is_empty());
    }

    #[test]
    fn falls_back_to_subprocess() {
        let backend = FakeBackend {
            output: Some("  1  make\n  2  cargo test\n".to_string()),
            ..FakeBackend::default()
        };

        let pipeline = HistoryPipeline::new(zsh_env(), backend);
        assert_eq!(pipeline.last_commands(5), vec!["cargo test", "make"]);

        let spawns = pipeline.backend.spawns.borrow();
        assert_eq!(spawns.len(), 1);
        // The subprocess is asked for `count`, not the buffered size.
        assert_eq!(spawns[0], history_invocation(ShellKind::Zsh, 5));
    }

    #[test]
    fn everything_unavailable_is_empty() {
        let pipeline = HistoryPipeline::new(zsh_env(), FakeBackend::default());
        assert!(pipeline.last_commands(5).is_empty());
        assert_eq!(pipeline.backend.spawns.borrow().len(), 1);
    }

    #[test]
    fn unknown_shell_skips_the_file_entirely() {
        let pipeline =
            HistoryPipeline::new(zsh_env(), FakeBackend::default()).with_shell(ShellKind::Unknown);
        assert!(pipeline.last_commands(3).is_empty());
        assert!(pipeline.backend.reads.borrow().is_empty());
    }

    #[test]
    fn zero_count_touches_nothing() {
        let mut env = zsh_env();
        env.env_history = Some(BASE64.encode("a|b"));
        let pipeline = HistoryPipeline::new(env, FakeBackend::default());
        assert!(pipeline.last_commands(0).is_empty());
        assert!(pipeline.backend.spawns.borrow().is_empty());
    }

    #[test]
    fn shell_comes_from_environment_unless_overridden() {
        let env = HistoryEnv {
            shell_path: Some("/usr/bin/fish".to_string()),
            ..HistoryEnv::default()
        };
        let pipeline = HistoryPipeline::new(env, FakeBackend::default());
        assert_eq!(pipeline.shell(), ShellKind::Fish);
        assert_eq!(pipeline.with_shell(ShellKind::Bash).shell(), ShellKind::Bash);
    }
}
