use serde::Deserialize;
use std::path::PathBuf;

/// HTTP listener settings.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub bind_address: String,
    pub port: u16,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: 8000,
        }
    }
}

/// Record broadcast transport settings.
///
/// `bind` is where a capture publisher listens, `endpoint` is where stream
/// subscribers connect. They usually name the same socket seen from two sides.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct PubSubSettings {
    pub bind: String,
    pub endpoint: String,
    pub channel_capacity: usize,
    pub reconnect_interval_ms: u64,
}

impl Default for PubSubSettings {
    fn default() -> Self {
        Self {
            bind: String::from("0.0.0.0:5556"),
            endpoint: String::from("127.0.0.1:5556"),
            channel_capacity: 1024,
            reconnect_interval_ms: 500,
        }
    }
}

/// Capture subprocess settings.
///
/// When `program` is unset the service re-executes its own binary with the
/// `publish` subcommand. `args` may reference `{interface}` and `{bind}`.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub default_timeout_secs: u64,
    pub stop_grace_secs: u64,
    pub tcpdump_program: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            program: None,
            args: vec![
                String::from("publish"),
                String::from("--interface"),
                String::from("{interface}"),
                String::from("--bind"),
                String::from("{bind}"),
                String::from("--config"),
                String::from("{config}"),
            ],
            default_timeout_secs: 300,
            stop_grace_secs: 5,
            tcpdump_program: String::from("tcpdump"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    pub systems_file: PathBuf,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            systems_file: PathBuf::from("systems.json"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct PingSettings {
    pub program: String,
    pub count: u32,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub max_hosts: usize,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            program: String::from("ping"),
            count: 1,
            timeout_secs: 1,
            concurrency: 64,
            max_hosts: 1024,
        }
    }
}

/// Where the `publish` subcommand reads frames from.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// Line-oriented `tcpdump -e -n` output.
    Tcpdump,
    /// Raw frames from a datalink channel, decoded in process.
    Pnet,
}
