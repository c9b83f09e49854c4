//! Server configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use antws_core::{ScanOptions, ScanPolicy};
use serde::{Deserialize, Serialize};

use crate::cli::Args;

/// Default listen port without TLS.
pub const DEFAULT_PORT: u16 = 8000;
/// Default listen port with TLS.
pub const DEFAULT_SECURE_PORT: u16 = 4430;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Stick and sensor discovery settings.
    pub discovery: DiscoveryConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Load the file named by `--config` (or the default file) and apply the
    /// command-line overrides on top.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::load_default()?,
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides. Flags only ever switch things on.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.server.port = Some(port);
        }
        if let Some(bind) = &args.bind {
            self.server.host = bind.clone();
        }
        if args.ssl {
            self.server.secure = true;
        }
        if args.verbose {
            self.discovery.verbose = true;
        }
        if args.simulate {
            self.discovery.simulate = true;
        }
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Host is not empty and the port is not 0
    /// - Broadcast buffer and ping interval are non-zero
    /// - Sensor categories are known ANT+ profiles and not repeated
    ///
    /// # Example
    ///
    /// ```
    /// use antws_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.discovery.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Listen port. Defaults depend on `secure`.
    pub port: Option<u16>,
    /// Serve over TLS with a self-signed certificate.
    pub secure: bool,
    /// Messages buffered per slow subscriber before they are dropped.
    pub broadcast_buffer: usize,
    /// Seconds between server pings on idle WebSocket connections.
    pub ping_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
            secure: false,
            broadcast_buffer: 256,
            ping_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    /// The port to listen on.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.secure {
            DEFAULT_SECURE_PORT
        } else {
            DEFAULT_PORT
        })
    }

    /// `https` when secure, `http` otherwise.
    pub fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    /// Ping interval as a duration.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push(ValidationError::new("server.host", "host cannot be empty"));
        }
        if self.port == Some(0) {
            errors.push(ValidationError::new("server.port", "port cannot be 0"));
        }
        if self.broadcast_buffer == 0 {
            errors.push(ValidationError::new(
                "server.broadcast_buffer",
                "broadcast buffer must be at least 1",
            ));
        }
        if self.ping_interval_secs == 0 {
            errors.push(ValidationError::new(
                "server.ping_interval_secs",
                "ping interval must be at least 1 second",
            ));
        }

        errors
    }
}

/// Discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Seconds to wait for each category to attach; 0 waits forever.
    pub scan_timeout_secs: u64,
    /// Scan one category at a time or all at once.
    pub policy: ScanPolicy,
    /// Categories to scan for, in order. Empty means every ANT+ profile.
    pub categories: Vec<String>,
    /// Use simulated sticks and sensors instead of hardware.
    pub simulate: bool,
    /// Log every field of every frame.
    pub verbose: bool,
}

impl DiscoveryConfig {
    /// Scan options for the pipeline.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::new()
            .timeout_secs(self.scan_timeout_secs)
            .policy(self.policy)
    }

    /// Validate discovery configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (i, category) in self.categories.iter().enumerate() {
            let field = format!("discovery.categories[{}]", i);
            if antws_types::profile::find(category).is_none() {
                errors.push(ValidationError::new(
                    &field,
                    format!("unknown sensor category '{}'", category),
                ));
            }
            if !seen.insert(category.as_str()) {
                errors.push(ValidationError::new(
                    &field,
                    format!("duplicate sensor category '{}'", category),
                ));
            }
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.port` or `discovery.categories[0]`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("antws")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.effective_port(), 8000);
        assert_eq!(config.server.scheme(), "http");
        assert_eq!(config.discovery.policy, ScanPolicy::Sequential);
        assert!(config.discovery.categories.is_empty());
    }

    #[test]
    fn test_secure_changes_default_port() {
        let server = ServerConfig {
            secure: true,
            ..Default::default()
        };
        assert_eq!(server.effective_port(), 4430);
        assert_eq!(server.scheme(), "https");

        let server = ServerConfig {
            secure: true,
            port: Some(9443),
            ..Default::default()
        };
        assert_eq!(server.effective_port(), 9443);
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(
            &config_path,
            r#"
                [server]
                port = 9000

                [discovery]
                scan_timeout_secs = 20
                policy = "concurrent"
                categories = ["hr", "bike_power"]
            "#,
        )
        .unwrap();

        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.server.port, Some(9000));
        assert_eq!(loaded.discovery.scan_timeout_secs, 20);
        assert_eq!(loaded.discovery.policy, ScanPolicy::Concurrent);
        assert_eq!(loaded.discovery.categories, vec!["hr", "bike_power"]);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            secure = true
            ping_interval_secs = 15

            [discovery]
            scan_timeout_secs = 30
            policy = "concurrent"
            categories = ["speed_cadence"]
            simulate = true
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.effective_port(), 8080);
        assert!(config.server.secure);
        assert_eq!(config.server.ping_interval(), Duration::from_secs(15));
        assert_eq!(config.server.broadcast_buffer, 256);
        assert_eq!(
            config.discovery.scan_options().timeout,
            Some(Duration::from_secs(30))
        );
        assert!(config.discovery.simulate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("antws/server.toml"));
    }

    #[test]
    fn test_args_override_file_values() {
        let mut config = Config::default();
        config.server.port = Some(9000);

        let args = Args::try_parse_from(["antws", "-p", "7000", "--ssl", "-v", "--simulate"]).unwrap();
        config.apply_args(&args);

        assert_eq!(config.server.effective_port(), 7000);
        assert!(config.server.secure);
        assert!(config.discovery.verbose);
        assert!(config.discovery.simulate);
    }

    #[test]
    fn test_from_args_reads_config_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(&config_path, "[server]\nport = 8123\n").unwrap();

        let path = config_path.to_str().unwrap();
        let args = Args::try_parse_from(["antws", "--config", path, "--bind", "127.0.0.1"]).unwrap();
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.server.effective_port(), 8123);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_from_args_rejects_invalid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(&config_path, "[discovery]\ncategories = [\"radar\"]\n").unwrap();

        let path = config_path.to_str().unwrap();
        let args = Args::try_parse_from(["antws", "-c", path]).unwrap();
        assert!(matches!(
            Config::from_args(&args),
            Err(ConfigError::Validation(_))
        ));
    }

    // ==========================================================================
    // Validation tests
    // ==========================================================================

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_server_validation() {
        let server = ServerConfig {
            host: String::new(),
            port: Some(0),
            broadcast_buffer: 0,
            ping_interval_secs: 0,
            ..Default::default()
        };
        let errors = server.validate();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].message.contains("cannot be empty"));
        assert!(errors[1].message.contains("cannot be 0"));
    }

    #[test]
    fn test_category_validation() {
        let discovery = DiscoveryConfig {
            categories: vec!["hr".to_string(), "radar".to_string(), "hr".to_string()],
            ..Default::default()
        };
        let errors = discovery.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "discovery.categories[1]");
        assert!(errors[0].message.contains("unknown"));
        assert_eq!(errors[1].field, "discovery.categories[2]");
        assert!(errors[1].message.contains("duplicate"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::new("server.port", "port cannot be 0");
        assert_eq!(format!("{}", error), "server.port: port cannot be 0");
    }

    #[test]
    fn test_config_validation_error_display() {
        let error = ConfigError::Validation(vec![
            ValidationError::new("server.port", "port cannot be 0"),
            ValidationError::new("discovery.categories[0]", "unknown sensor category 'x'"),
        ]);
        let display = format!("{}", error);
        assert!(display.contains("server.port"));
        assert!(display.contains("discovery.categories[0]"));
    }
}
