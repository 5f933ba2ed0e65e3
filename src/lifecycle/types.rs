use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::configuration::CaptureSettings;
use crate::error_handling::types::LifecycleError;

/// Lifecycle state of the capture process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Running,
    Stopping,
}

/// The single running capture process and what is known about it.
pub struct CaptureProcessHandle {
    pub process_id: u32,
    pub interface: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub generation: u64,
    pub child: Child,
    pub timeout_task: Option<JoinHandle<()>>,
}

impl CaptureProcessHandle {
    pub fn status(&self, state: CaptureState) -> CaptureStatus {
        CaptureStatus {
            state,
            process_id: Some(self.process_id),
            interface: Some(self.interface.clone()),
            started_at: Some(self.started_at),
            expires_at: self.expires_at,
        }
    }
}

/// Point-in-time view of the capture process, as reported by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub process_id: Option<u32>,
    pub interface: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CaptureStatus {
    pub fn idle() -> Self {
        Self {
            state: CaptureState::Idle,
            process_id: None,
            interface: None,
            started_at: None,
            expires_at: None,
        }
    }
}

/// How the capture process is launched.
///
/// `{interface}` in any argument is replaced at spawn time. `{bind}` and
/// `{config}` are replaced when the command is built from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CaptureCommand {
    pub const INTERFACE_PLACEHOLDER: &'static str = "{interface}";
    pub const BIND_PLACEHOLDER: &'static str = "{bind}";
    pub const CONFIG_PLACEHOLDER: &'static str = "{config}";

    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds the command from configuration. Without an explicit program the
    /// running executable is used.
    ///
    /// `{bind}` is filled in with `bind` and `{config}` with `config_file`, so
    /// the capture process reads the same file as the service. Without a file
    /// an argument that is exactly `{config}` is dropped together with the
    /// option flag in front of it, and the capture process uses its defaults.
    pub fn from_settings(
        settings: &CaptureSettings,
        bind: &str,
        config_file: Option<&Path>,
    ) -> Result<Self, LifecycleError> {
        let program = match &settings.program {
            Some(program) => program.clone(),
            None => std::env::current_exe().map_err(LifecycleError::SpawnFailed)?,
        };

        let mut args: Vec<String> = Vec::with_capacity(settings.args.len());
        for arg in &settings.args {
            match config_file {
                None if arg == Self::CONFIG_PLACEHOLDER => {
                    if args.last().is_some_and(|flag| flag.starts_with('-')) {
                        args.pop();
                    }
                }
                None => args.push(arg.replace(Self::BIND_PLACEHOLDER, bind)),
                Some(path) => args.push(
                    arg.replace(Self::BIND_PLACEHOLDER, bind)
                        .replace(Self::CONFIG_PLACEHOLDER, &path.to_string_lossy()),
                ),
            }
        }
        Ok(Self::new(program, args))
    }

    pub fn args_for(&self, interface: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(Self::INTERFACE_PLACEHOLDER, interface))
            .collect()
    }

    /// Spawns the process with piped output. The child is killed if its handle
    /// is dropped without being stopped.
    pub fn spawn(&self, interface: &str) -> Result<Child, LifecycleError> {
        Command::new(&self.program)
            .args(self.args_for(interface))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(LifecycleError::SpawnFailed)
    }
}
