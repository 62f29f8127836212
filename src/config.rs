//! Configuration system for the PFC client
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PFC_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::ClientConfig;
use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote endpoint and dial policy
    pub client: ClientSettings,

    /// Handshake policy
    pub handshake: HandshakeSettings,

    /// Session loop settings
    pub session: SessionSettings,

    /// Outbound message source
    pub source: SourceSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Remote endpoint and dial policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Server address, `host:port` or `:port` for the local host
    pub remote_addr: String,

    /// Pause between failed dial attempts in milliseconds
    pub dial_interval_ms: u64,

    /// Retries after the first failed dial before giving up
    pub max_dial_attempts: u32,
}

/// Handshake policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeSettings {
    /// Abort the run when the handshake fails (default: log and continue)
    pub strict: bool,

    /// Bound on the whole exchange in milliseconds (0 = wait forever)
    pub timeout_ms: u64,
}

/// Session loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Writer tick in milliseconds
    pub write_interval_ms: u64,

    /// Inbound queue capacity (0 = unbounded)
    pub inbound_queue: usize,
}

/// Which outbound source feeds the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Heartbeat,
    File,
}

/// Outbound message source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,

    /// Payload for the heartbeat source
    pub payload: String,

    /// File tailed by the file source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Lock file held by the file's writer; ticks are skipped while it exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            remote_addr: ":3000".to_string(),
            dial_interval_ms: 15_000,
            max_dial_attempts: 25,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            write_interval_ms: 2000,
            inbound_queue: 0, // Unbounded
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Heartbeat,
            payload: "Hello".to_string(),
            file: None,
            lock: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| {
                Error::config_parse(format!("{}: {}", path.display(), e.message()), e)
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("pfc-client.toml"),
            dirs::config_dir()
                .map(|p| p.join("pfc").join("client.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".pfc").join("client.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/pfc/client.toml"),
        ];

        for path in &search_paths {
            if path.is_file() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PFC_REMOTE_ADDR") {
            self.client.remote_addr = val;
        }
        if let Ok(val) = std::env::var("PFC_DIAL_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                self.client.dial_interval_ms = n;
            }
        }
        if let Ok(val) = std::env::var("PFC_MAX_DIAL_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                self.client.max_dial_attempts = n;
            }
        }

        if let Ok(val) = std::env::var("PFC_HANDSHAKE_STRICT") {
            self.handshake.strict = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("PFC_WRITE_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                self.session.write_interval_ms = n;
            }
        }

        if let Ok(val) = std::env::var("PFC_SOURCE_FILE") {
            self.source.kind = SourceKind::File;
            self.source.file = Some(val);
        }
        if let Ok(val) = std::env::var("PFC_SOURCE_LOCK") {
            self.source.lock = Some(val);
        }

        if let Ok(val) = std::env::var("PFC_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PFC_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PFC_LOG_JSON") {
            self.logging.json_format = parse_bool(&val);
        }
    }

    /// Expand ~ and environment variables in paths
    fn expand_paths(&mut self) {
        for path in [&mut self.source.file, &mut self.source.lock, &mut self.logging.file]
            .into_iter()
            .flatten()
        {
            *path = expand_path(path);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let addr = self.client.remote_addr.trim();
        if addr.is_empty() {
            return Err(Error::config_field_invalid(
                "client.remote_addr",
                "Remote address cannot be empty",
            ));
        }
        match addr.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(Error::config_field_invalid(
                    "client.remote_addr",
                    format!("Remote address '{}' must be host:port or :port", addr),
                ));
            }
        }

        if self.session.write_interval_ms == 0 {
            return Err(Error::config_field_invalid(
                "session.write_interval_ms",
                "Write interval must be greater than zero",
            ));
        }

        if self.source.kind == SourceKind::File && self.source.file.is_none() {
            return Err(Error::config_field_invalid(
                "source.file",
                "The file source requires 'file' to be set",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Runtime client configuration derived from these settings
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            handshake_timeout: match self.handshake.timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            strict_handshake: self.handshake.strict,
            write_interval: Duration::from_millis(self.session.write_interval_ms),
            inbound_queue: self.session.inbound_queue,
            ..ClientConfig::new(
                self.client.remote_addr.clone(),
                Duration::from_millis(self.client.dial_interval_ms),
                self.client.max_dial_attempts,
            )
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".pfc")
                .join("client.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, DEFAULT_CONFIG).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Default configuration file with comments
const DEFAULT_CONFIG: &str = r#"# PFC Client Configuration

[client]
# Server address (host:port, or :port for the local host)
remote_addr = ":3000"

# Pause between failed dial attempts in milliseconds
dial_interval_ms = 15000

# Retries after the first failed dial before giving up
max_dial_attempts = 25

[handshake]
# Abort when the handshake fails instead of logging and continuing
strict = false

# Bound on the handshake exchange in milliseconds (0 = wait forever)
timeout_ms = 0

[session]
# Writer tick in milliseconds
write_interval_ms = 2000

# Inbound queue capacity (0 = unbounded)
inbound_queue = 0

[source]
# "heartbeat" sends `payload` every tick, "file" ships appended log lines
kind = "heartbeat"
payload = "Hello"
# file = "/var/log/pfc/readings.log"
# lock = "/var/log/pfc/readings.lock"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.pfc/logs/client.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.client.remote_addr, ":3000");
        assert_eq!(config.client.dial_interval_ms, 15_000);
        assert_eq!(config.client.max_dial_attempts, 25);
        assert_eq!(config.session.write_interval_ms, 2000);
        assert_eq!(config.source.payload, "Hello");
        assert!(!config.handshake.strict);
    }

    #[test]
    fn test_default_template_parses() {
        let parsed: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.client.remote_addr, AppConfig::default().client.remote_addr);
    }

    #[test]
    fn test_env_override() {
        env::set_var("PFC_REMOTE_ADDR", "10.0.0.5:4000");
        env::set_var("PFC_MAX_DIAL_ATTEMPTS", "3");
        env::set_var("PFC_HANDSHAKE_STRICT", "1");

        let mut config = AppConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.client.remote_addr, "10.0.0.5:4000");
        assert_eq!(config.client.max_dial_attempts, 3);
        assert!(config.handshake.strict);

        env::remove_var("PFC_REMOTE_ADDR");
        env::remove_var("PFC_MAX_DIAL_ATTEMPTS");
        env::remove_var("PFC_HANDSHAKE_STRICT");
    }

    #[test]
    fn test_validation_rejects_missing_port() {
        let mut config = AppConfig::default();
        config.client.remote_addr = "example.com".to_string();
        assert!(config.validate().is_err());

        config.client.remote_addr = "example.com:http".to_string();
        assert!(config.validate().is_err());

        config.client.remote_addr = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.session.write_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_file_source_needs_path() {
        let mut config = AppConfig::default();
        config.source.kind = SourceKind::File;
        assert!(config.validate().is_err());

        config.source.file = Some("/tmp/readings.log".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let config: AppConfig = toml::from_str(
            r#"
[client]
remote_addr = "192.168.1.20:3000"
dial_interval_ms = 500

[handshake]
strict = true
timeout_ms = 1500

[source]
kind = "file"
file = "/var/log/readings.log"
lock = "/var/log/readings.lock"
"#,
        )
        .unwrap();

        assert_eq!(config.client.remote_addr, "192.168.1.20:3000");
        assert_eq!(config.client.max_dial_attempts, 25);
        assert_eq!(config.source.kind, SourceKind::File);

        let client = config.client_config();
        assert_eq!(client.dial_interval, Duration::from_millis(500));
        assert_eq!(client.handshake_timeout, Some(Duration::from_millis(1500)));
        assert!(client.strict_handshake);
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = AppConfig::load(Some("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        let path_str = path.to_str().unwrap();

        assert_eq!(init_config(Some(path_str), false).unwrap(), path);
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }
}
