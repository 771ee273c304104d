use crate::domain::Snippet;
use crate::history::{DEFAULT_HISTORY_BUFFER_SIZE, DEFAULT_SUBPROCESS_TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("command name cannot be empty")]
    EmptyName,

    #[error("command text cannot be empty")]
    EmptyCommand,

    #[error("a command named '{0}' already exists")]
    DuplicateName(String),

    #[error("no command named '{0}'")]
    NotFound(String),
}

/// Contents of `commands.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// How many history entries to offer when adding from history.
    #[serde(default = "default_history_buffer_size")]
    pub history_buffer_size: usize,

    /// Upper bound on the `history` subprocess, in milliseconds.
    #[serde(default = "default_history_timeout_ms")]
    pub history_timeout_ms: u64,

    #[serde(default)]
    pub commands: Vec<Snippet>,
}

fn default_history_buffer_size() -> usize {
    DEFAULT_HISTORY_BUFFER_SIZE
}

fn default_history_timeout_ms() -> u64 {
    DEFAULT_SUBPROCESS_TIMEOUT.as_millis() as u64
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            history_buffer_size: default_history_buffer_size(),
            history_timeout_ms: default_history_timeout_ms(),
            commands: Vec::new(),
        }
    }
}

impl Catalog {
    /// The catalog a fresh install starts with.
    pub fn sample() -> Self {
        let commands = vec![
            Snippet::new("Git Status", "git status")
                .with_description("Show git status")
                .with_tags(["git"]),
            Snippet::new("Git Pull", "git pull origin {branch}")
                .with_description("Pull from remote branch")
                .with_tags(["git"]),
            Snippet::new("Git Push", "git push origin {branch}")
                .with_description("Push to remote branch")
                .with_tags(["git"]),
            Snippet::new("Docker Build", "docker build -t {tag} .")
                .with_description("Build Docker image with tag")
                .with_tags(["docker"]),
            Snippet::new("Docker Run", "docker run -it {image}")
                .with_description("Run Docker container interactively")
                .with_tags(["docker"]),
            Snippet::new("List Files", "ls -la")
                .with_description("List all files with details")
                .with_tags(["system"]),
            Snippet::new("Disk Usage", "df -h")
                .with_description("Show disk usage")
                .with_tags(["system"]),
        ];

        let mut catalog = Self::default();
        for (i, mut snippet) in commands.into_iter().enumerate() {
            snippet.id = i as u32 + 1;
            catalog.commands.push(snippet);
        }
        catalog
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }

    /// Look a command up by name or alias, ignoring case.
    pub fn find(&self, key: &str) -> Option<&Snippet> {
        let key = key.trim();
        self.commands
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(key))
            .or_else(|| {
                self.commands
                    .iter()
                    .find(|s| s.aliases.iter().any(|a| a.eq_ignore_ascii_case(key)))
            })
    }

    /// Validate and append `snippet`, assigning the next free id.
    pub fn add(&mut self, mut snippet: Snippet) -> Result<&Snippet, CatalogError> {
        snippet.name = snippet.name.trim().to_string();
        snippet.command = snippet.command.trim().to_string();

        if snippet.name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if snippet.command.is_empty() {
            return Err(CatalogError::EmptyCommand);
        }
        if self
            .commands
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(&snippet.name))
        {
            return Err(CatalogError::DuplicateName(snippet.name));
        }

        snippet.id = self.commands.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        self.commands.push(snippet);
        Ok(&self.commands[self.commands.len() - 1])
    }

    pub fn remove(&mut self, name: &str) -> Result<Snippet, CatalogError> {
        let pos = self
            .commands
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        Ok(self.commands.remove(pos))
    }
}

/// Load the catalog, seeding it with sample commands on first run.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        let catalog = Catalog::sample();
        save_catalog(path, &catalog)?;
        tracing::info!("created {}", path.display());
        return Ok(catalog);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content).with_context(|| {
        format!(
            "Failed to parse config file at {}; fix the syntax or delete it to regenerate defaults",
            path.display()
        )
    })
}

pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let content = toml::to_string_pretty(catalog).context("Failed to serialize commands to TOML")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
