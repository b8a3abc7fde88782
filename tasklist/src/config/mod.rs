//! Configuration for the `tasklist` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasklist/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use tasklist_proto::task::MAX_TASK_TITLE_LENGTH;

use crate::app::AppConfig;
use crate::tasks::StoreConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageFileConfig,
    tasks: TasksFileConfig,
    session: SessionFileConfig,
    auth: AuthFileConfig,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    data_file: Option<PathBuf>,
    retry_interval_ms: Option<u64>,
    write_queue_capacity: Option<usize>,
}

/// `[tasks]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TasksFileConfig {
    max_title_len: Option<usize>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    notification_buffer: Option<usize>,
    event_buffer: Option<usize>,
}

/// `[auth]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AuthFileConfig {
    demo_email: Option<String>,
    demo_password: Option<String>,
    demo_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Credential seeded into the in-process identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoAccount {
    /// Sign-in email.
    pub email: String,
    /// Sign-in password.
    pub password: String,
    /// Display name; `None` falls back to the default user name.
    pub name: Option<String>,
}

impl Default for DemoAccount {
    fn default() -> Self {
        Self {
            email: "demo@example.com".to_string(),
            password: "demo".to_string(),
            name: None,
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Storage --
    /// Snapshot file for tasks. `None` keeps tasks in memory only.
    pub data_file: Option<PathBuf>,
    /// Period of the failed-write retry task.
    pub retry_interval: Duration,
    /// Capacity of the backend write queue.
    pub write_queue_capacity: usize,

    // -- Tasks --
    /// Maximum task title length in characters.
    pub max_title_len: usize,

    // -- Session --
    /// Per-subscriber buffer for identity provider notifications.
    pub notification_buffer: usize,
    /// Buffer size for the store event channel.
    pub event_buffer: usize,

    // -- Auth --
    /// Account available for sign-in in the demo binary.
    pub demo_account: DemoAccount,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            retry_interval: Duration::from_millis(5000),
            write_queue_capacity: 256,
            max_title_len: MAX_TASK_TITLE_LENGTH,
            notification_buffer: 16,
            event_buffer: 64,
            demo_account: DemoAccount::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/tasklist/config.toml`) is
    /// tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            data_file: cli
                .data_file
                .clone()
                .or_else(|| file.storage.data_file.clone()),
            retry_interval: file
                .storage
                .retry_interval_ms
                .map_or(defaults.retry_interval, Duration::from_millis),
            write_queue_capacity: file
                .storage
                .write_queue_capacity
                .unwrap_or(defaults.write_queue_capacity),
            max_title_len: file
                .tasks
                .max_title_len
                .unwrap_or(defaults.max_title_len),
            notification_buffer: file
                .session
                .notification_buffer
                .unwrap_or(defaults.notification_buffer),
            event_buffer: file
                .session
                .event_buffer
                .unwrap_or(defaults.event_buffer),
            demo_account: DemoAccount {
                email: file
                    .auth
                    .demo_email
                    .clone()
                    .unwrap_or(defaults.demo_account.email),
                password: file
                    .auth
                    .demo_password
                    .clone()
                    .unwrap_or(defaults.demo_account.password),
                name: file.auth.demo_name.clone(),
            },
        }
    }

    /// Settings for [`App::start`](crate::app::App::start).
    #[must_use]
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            store: StoreConfig {
                max_title_len: self.max_title_len,
                write_queue_capacity: self.write_queue_capacity,
                event_buffer: self.event_buffer,
            },
            retry_interval: self.retry_interval,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Single-user task list")]
pub struct CliArgs {
    /// Snapshot file for tasks (in memory if unset).
    #[arg(long, env = "TASKLIST_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Path to config file (default: `~/.config/tasklist/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKLIST_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/tasklist.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("tasklist").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
