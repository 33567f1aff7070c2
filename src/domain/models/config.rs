//! Configuration model for maestro.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Maximum number of concurrent agent subprocesses (1-100).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Workspace configuration.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Agent subprocess configuration.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_max_concurrent() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            workspace: WorkspaceConfig::default(),
            agent: AgentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Workspace layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceConfig {
    /// Workspace root holding the shared tree, sandboxes and registry.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,

    /// Execution-state file for crash recovery; none disables persistence.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("./workspace")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            state_file: None,
        }
    }
}

/// External agent subprocess configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Path to the agent executable (resolved through PATH by default).
    #[serde(default = "default_binary_path")]
    pub binary_path: String,

    /// Wall-clock timeout per task invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Wall-clock timeout per merge sub-agent invocation, in seconds.
    #[serde(default = "default_merge_timeout_secs")]
    pub merge_timeout_secs: u64,
}

fn default_binary_path() -> String {
    "claude".to_string()
}

const fn default_timeout_secs() -> u64 {
    3600
}

const fn default_merge_timeout_secs() -> u64 {
    300
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            timeout_secs: default_timeout_secs(),
            merge_timeout_secs: default_merge_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; none logs to stdout only.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
