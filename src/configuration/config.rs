use super::types::*;
use crate::error_handling::types::ConfigError;
use log::{debug, info};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Application configuration structure that defines all runtime parameters.
///
/// This structure holds the complete configuration for the service: the HTTP
/// listener, the record broadcast transport, the capture subprocess, the
/// lookup tables and the ping sweep. It is read from a TOML file with the
/// `toml` and `serde` derive machinery; every section and every field has a
/// default so a partial file (or no file at all) is valid.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use macflow::configuration::Config;
///
/// let config = Config::from_file(Path::new("macflow.toml")).unwrap();
/// println!("Serving on port {}", config.web.port);
/// ```
///
/// # Fields Overview
///
/// - `web`: bind address and port of the HTTP service
/// - `pubsub`: publisher bind address, subscriber endpoint, fan-out capacity and
///   subscriber reconnect interval
/// - `capture`: the subprocess started by `POST /publish`, its default lifetime
///   and the grace period granted on stop before it is killed
/// - `lookup`: location of the MAC-prefix to system-name table
/// - `ping`: the external ping command and sweep limits
#[derive(Debug, PartialEq, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web: WebSettings,
    pub pubsub: PubSubSettings,
    pub capture: CaptureSettings,
    pub lookup: LookupSettings,
    pub ping: PingSettings,
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    /// - `ConfigError::IoError` when the file cannot be read
    /// - `ConfigError::TomlError` when it is not valid TOML for this structure
    /// - any error from [`Config::validate`]
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        info!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        debug!("Parsed configuration: {:?}", config);
        Ok(config)
    }

    /// Checks the values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.web.port == 0 {
            return Err(ConfigError::NotInRange(
                "web.port must be between 1 and 65535".to_string(),
            ));
        }
        format!("{}:{}", self.web.bind_address, self.web.port)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::BadAddress(format!("web.bind_address: {}", e)))?;
        self.pubsub
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::BadAddress(format!("pubsub.bind: {}", e)))?;
        self.pubsub
            .endpoint
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::BadAddress(format!("pubsub.endpoint: {}", e)))?;
        if self.pubsub.channel_capacity == 0 {
            return Err(ConfigError::NotInRange(
                "pubsub.channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.ping.concurrency == 0 {
            return Err(ConfigError::NotInRange(
                "ping.concurrency must be greater than 0".to_string(),
            ));
        }
        if self.ping.count == 0 {
            return Err(ConfigError::NotInRange(
                "ping.count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn web_address(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.web.bind_address, self.web.port)
            .parse()
            .map_err(|e| ConfigError::BadAddress(format!("web.bind_address: {}", e)))
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.pubsub.reconnect_interval_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.capture.stop_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capture.default_timeout_secs, 300);
        assert_eq!(config.pubsub.endpoint, "127.0.0.1:5556");
        assert_eq!(config.web_address().unwrap().port(), 8000);
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[web]
port = 9090

[capture]
default_timeout_secs = 60
stop_grace_secs = 2

[ping]
max_hosts = 16
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(config.web.port, 9090);
        assert_eq!(config.web.bind_address, "0.0.0.0");
        assert_eq!(config.capture.default_timeout_secs, 60);
        assert_eq!(config.stop_grace(), Duration::from_secs(2));
        assert_eq!(config.ping.max_hosts, 16);
        assert_eq!(config.ping.program, "ping");
        assert_eq!(config.pubsub, PubSubSettings::default());
    }

    #[test]
    fn test_capture_program_and_args() {
        let config = Config::from_toml(
            r#"
[capture]
program = "/usr/local/bin/capture"
args = ["--iface", "{interface}"]
"#,
        )
        .unwrap();
        assert_eq!(
            config.capture.program.as_deref(),
            Some(Path::new("/usr/local/bin/capture"))
        );
        assert_eq!(config.capture.args, vec!["--iface", "{interface}"]);
    }

    #[test]
    fn test_rejects_zero_port() {
        let result = Config::from_toml("[web]\nport = 0\n");
        assert!(matches!(result, Err(ConfigError::NotInRange(_))));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let result = Config::from_toml("[pubsub]\nendpoint = \"localhost\"\n");
        assert!(matches!(result, Err(ConfigError::BadAddress(_))));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        let result = Config::from_toml("[web\nport = 1");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_sample_file_matches_defaults() {
        let sample = Path::new(env!("CARGO_MANIFEST_DIR")).join("macflow.toml");
        assert_eq!(Config::from_file(&sample).unwrap(), Config::default());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/macflow.toml"));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
