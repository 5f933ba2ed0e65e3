//! Graceful termination of child processes.
//!
//! A termination request (SIGTERM) is sent first, then the child is given a
//! bounded grace period to exit. Past the bound the child is killed outright.
//! A child that is already gone counts as a successful stop.

use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;

use crate::error_handling::types::LifecycleError;

/// How a terminated child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The child had exited before the request was sent.
    AlreadyExited,
    /// The child exited within the grace period.
    Graceful(ExitStatus),
    /// The grace period ran out and the child was killed.
    Killed,
}

/// Requests termination of `child` and waits at most `grace` for it to exit.
pub async fn terminate_gracefully(
    child: &mut Child,
    grace: Duration,
) -> Result<Termination, LifecycleError> {
    if let Ok(Some(status)) = child.try_wait() {
        info!("Process had already exited ({})", status);
        return Ok(Termination::AlreadyExited);
    }

    let pid = match child.id() {
        Some(pid) => pid,
        None => {
            info!("Process has already been reaped");
            return Ok(Termination::AlreadyExited);
        }
    };

    debug!("Sending SIGTERM to process {}", pid);
    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => {
            info!("Process {} has already been terminated", pid);
            return Ok(Termination::AlreadyExited);
        }
        Err(e) => {
            warn!("Failed to send SIGTERM to process {}: {}, killing it", pid, e);
            return kill(child, pid).await;
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            info!("Process {} exited ({})", pid, status);
            Ok(Termination::Graceful(status))
        }
        Ok(Err(e)) => Err(LifecycleError::WaitFailed(e)),
        Err(_) => {
            warn!(
                "Process {} did not exit within {:?} of SIGTERM, killing it",
                pid, grace
            );
            kill(child, pid).await
        }
    }
}

async fn kill(child: &mut Child, pid: u32) -> Result<Termination, LifecycleError> {
    match child.kill().await {
        Ok(()) => {
            info!("Process {} killed", pid);
            Ok(Termination::Killed)
        }
        Err(e) => Err(LifecycleError::SignalFailed(format!(
            "SIGKILL to process {} failed: {}",
            pid, e
        ))),
    }
}
