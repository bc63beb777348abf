//! Configuration system for the `PairChat` relay server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/pairchat-relay/config.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};

/// Errors that can occur when loading relay configuration.
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

    /// A resolved setting is unusable.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Name of the offending setting.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// On-disk relay settings. Every field is optional so a file may override
/// only part of the defaults.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RelayConfigFile {
    server: ServerFileConfig,
}

/// `[server]` table.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    queue_key: Option<String>,
    channel: Option<String>,
    max_message_size: Option<usize>,
    store_url: Option<String>,
}

/// CLI arguments for the relay server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "PairChat matchmaking and relay server")]
pub struct RelayCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "PAIRCHAT_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/pairchat-relay/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Shared-store key of the waiting queue.
    #[arg(long, env = "PAIRCHAT_QUEUE_KEY")]
    pub queue_key: Option<String>,

    /// Shared-store pub/sub channel used to relay messages between servers.
    #[arg(long, env = "PAIRCHAT_CHANNEL")]
    pub channel: Option<String>,

    /// Maximum chat message size in bytes.
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// Redis URL of the shared store (e.g. `redis://127.0.0.1:6379`).
    /// Without one the server keeps its queue and channel in memory.
    #[arg(long, env = "PAIRCHAT_STORE_URL")]
    pub store_url: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "PAIRCHAT_LOG")]
    pub log_level: String,
}

/// Fully resolved relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:5000`).
    pub bind_addr: String,
    /// Shared-store key of the waiting queue.
    pub queue_key: String,
    /// Shared-store pub/sub channel name.
    pub channel: String,
    /// Maximum accepted chat message size in bytes.
    pub max_message_size: usize,
    /// Redis URL of the shared store; `None` selects the in-memory store.
    pub store_url: Option<String>,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            queue_key: "waiting_users".to_string(),
            channel: "chat_channel".to_string(),
            max_message_size: 4 * 1024,
            store_url: None,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Builds the effective configuration from `cli` and the config file.
    ///
    /// Environment variables reach this through `cli`, since clap reads them
    /// for any flag left off the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if a resolved setting is invalid.
    pub fn load(cli: &RelayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let config = Self::resolve(cli, &file);
        config.validate()?;
        Ok(config)
    }

    /// Checks that the store names are non-empty, the message limit is
    /// positive, and any store URL names a Redis server.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "queue_key",
                reason: "must not be empty",
            });
        }
        if self.channel.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "channel",
                reason: "must not be empty",
            });
        }
        if let Some(url) = &self.store_url
            && !REDIS_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
        {
            return Err(ConfigError::Invalid {
                field: "store_url",
                reason: "must be a redis://, rediss:// or unix:// URL",
            });
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_message_size",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// Merges CLI values over file values over defaults.
    fn resolve(cli: &RelayCliArgs, file: &RelayConfigFile) -> Self {
        let defaults = Self::default();
        let server = &file.server;

        Self {
            bind_addr: layered(
                cli.bind.as_ref(),
                server.bind_addr.as_ref(),
                defaults.bind_addr,
            ),
            queue_key: layered(
                cli.queue_key.as_ref(),
                server.queue_key.as_ref(),
                defaults.queue_key,
            ),
            channel: layered(
                cli.channel.as_ref(),
                server.channel.as_ref(),
                defaults.channel,
            ),
            max_message_size: layered(
                cli.max_message_size.as_ref(),
                server.max_message_size.as_ref(),
                defaults.max_message_size,
            ),
            store_url: cli.store_url.clone().or_else(|| server.store_url.clone()),
            log_level: cli.log_level.clone(),
        }
    }
}

/// URL schemes accepted for `store_url`.
const REDIS_SCHEMES: [&str; 4] = ["redis://", "rediss://", "redis+unix://", "unix://"];

/// First of `cli` and `file` that is set, else `default`.
fn layered<T: Clone>(cli: Option<&T>, file: Option<&T>, default: T) -> T {
    cli.or(file).cloned().unwrap_or(default)
}

/// `~/.config/pairchat-relay/config.toml`, if the platform has a config dir.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pairchat-relay").join("config.toml"))
}

/// Reads the relay's TOML file.
///
/// An explicit path must exist. The default path is optional: when it is
/// missing the file contributes nothing.
fn load_config_file(explicit_path: Option<&Path>) -> Result<RelayConfigFile, ConfigError> {
    let (path, required) = match explicit_path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok(RelayConfigFile::default()),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            Ok(RelayConfigFile::default())
        }
        Err(source) => Err(ConfigError::ReadFile { path, source }),
    }
}
