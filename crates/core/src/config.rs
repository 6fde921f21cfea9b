//! Runtime configuration with environment overrides.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_QUIESCENCE_MS: &str = "STRATUM_QUIESCENCE_MS";
pub const ENV_PUBLISH_BACKOFF_MS: &str = "STRATUM_PUBLISH_BACKOFF_MS";
pub const ENV_PUBLISH_BACKOFF_MAX_MS: &str = "STRATUM_PUBLISH_BACKOFF_MAX_MS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StratumConfig {
    pub sync: SyncConfig,
    pub classifier: ClassifierConfig,
}

impl StratumConfig {
    /// Defaults overlaid with `STRATUM_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply overrides from `lookup`; unparsable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read_ms = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(ms) = read_ms(ENV_QUIESCENCE_MS) {
            self.sync.quiescence_ms = ms;
        }
        if let Some(ms) = read_ms(ENV_PUBLISH_BACKOFF_MS) {
            self.sync.publish_backoff_ms = ms;
        }
        if let Some(ms) = read_ms(ENV_PUBLISH_BACKOFF_MAX_MS) {
            self.sync.publish_backoff_max_ms = ms;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay after the last observed change before a batch is reconciled.
    pub quiescence_ms: u64,
    /// First retry delay after losing a publish race; doubles per attempt.
    pub publish_backoff_ms: u64,
    pub publish_backoff_max_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiescence_ms: 1000,
            publish_backoff_ms: 10,
            publish_backoff_max_ms: 500,
        }
    }
}

impl SyncConfig {
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms.max(1))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.publish_backoff_ms.max(1)),
            Duration::from_millis(self.publish_backoff_max_ms.max(self.publish_backoff_ms)),
        )
    }
}

/// Exponential backoff with a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial, max }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }
}

/// File tables used to classify filesystem events.
///
/// Extensions are matched case-insensitively without the leading dot. File
/// names take precedence over extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub solution_extensions: Vec<String>,
    pub project_extensions: Vec<String>,
    pub source_extensions: Vec<String>,
    pub config_extensions: Vec<String>,
    pub config_file_names: Vec<String>,
    /// Directory names whose contents are never indexed.
    pub ignored_dirs: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            solution_extensions: strings(&["sln", "slnx", "slnf"]),
            project_extensions: strings(&["csproj", "vbproj", "fsproj", "proj"]),
            source_extensions: strings(&["cs", "vb", "fs", "fsx", "cshtml", "razor"]),
            config_extensions: strings(&["props", "targets", "ruleset"]),
            config_file_names: strings(&[
                ".editorconfig",
                ".globalconfig",
                "Directory.Build.props",
                "Directory.Build.targets",
                "Directory.Packages.props",
                "global.json",
                "nuget.config",
            ]),
            ignored_dirs: strings(&["bin", "obj", ".git", ".vs", "node_modules"]),
        }
    }
}
