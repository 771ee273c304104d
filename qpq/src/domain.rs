use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One named command in the launcher's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    #[serde(default)]
    pub id: u32,
    pub name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Snippet {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            command: command.into(),
            description: None,
            tags: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Files the launcher keeps under its state directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub dir: PathBuf,
}

impl AppPaths {
    pub fn default_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_default();
        if cfg!(windows) {
            home.join("AppData").join("Local").join("qpq")
        } else if cfg!(target_os = "macos") {
            home.join("Library").join("Application Support").join("qpq")
        } else {
            home.join(".local").join("state").join("qpq")
        }
    }

    pub fn catalog(&self) -> PathBuf {
        self.dir.join("commands.toml")
    }

    pub fn state_db(&self) -> PathBuf {
        self.dir.join("state.sqlite")
    }
}
