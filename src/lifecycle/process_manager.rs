use chrono::Utc;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{watch, Mutex};

use crate::error_handling::types::LifecycleError;
use crate::line_reader::{CappedLines, MAX_LINE_LEN};
use crate::lifecycle::termination::{terminate_gracefully, Termination};
use crate::lifecycle::types::{CaptureCommand, CaptureProcessHandle, CaptureState, CaptureStatus};

const MAX_INTERFACE_LEN: usize = 64;

/// Supervises the one capture process a service instance may run.
///
/// Cheap to clone; every clone drives the same process slot. Operations are
/// serialized on an async mutex held for their whole duration, including the
/// wait for a stopping process to exit, so a new process is only spawned once
/// the previous one is confirmed gone.
///
/// Every started process is given a self-stop timer. The timer carries the
/// generation of the process it was armed for and does nothing if that
/// process has since been replaced or stopped.
///
/// The current [`CaptureStatus`] is also published on a watch channel, which
/// lets observers see the `Stopping` state without contending for the lock.
#[derive(Clone)]
pub struct ProcessLifecycleManager {
    inner: Arc<Mutex<Inner>>,
    status: Arc<watch::Sender<CaptureStatus>>,
    command: Arc<CaptureCommand>,
    stop_grace: Duration,
}

struct Inner {
    handle: Option<CaptureProcessHandle>,
    next_generation: u64,
}

impl ProcessLifecycleManager {
    pub fn new(command: CaptureCommand, stop_grace: Duration) -> Self {
        info!(
            "Capture processes will run as {} {:?}",
            command.program.display(),
            command.args
        );
        let (status, _) = watch::channel(CaptureStatus::idle());
        Self {
            inner: Arc::new(Mutex::new(Inner {
                handle: None,
                next_generation: 0,
            })),
            status: Arc::new(status),
            command: Arc::new(command),
            stop_grace,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.status.borrow().state
    }

    pub fn status(&self) -> CaptureStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.status.subscribe()
    }

    pub fn command(&self) -> &CaptureCommand {
        &self.command
    }

    /// Starts capturing on `interface`, replacing any running capture.
    ///
    /// A running process is stopped to completion first; if that fails the
    /// new process is not spawned.
    pub async fn start(
        &self,
        interface: &str,
        timeout: Duration,
    ) -> Result<CaptureStatus, LifecycleError> {
        validate_interface(interface)?;

        let mut inner = self.inner.lock().await;
        if let Some(previous) = inner.handle.take() {
            info!(
                "Replacing capture process {} on {}",
                previous.process_id, previous.interface
            );
            self.stop_handle(previous).await?;
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;

        let mut child = self.command.spawn(interface)?;
        let process_id = child.id().ok_or(LifecycleError::MissingProcessId)?;
        forward_output(&mut child, process_id);

        let started_at = Utc::now();
        let expires_at = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|timeout| started_at.checked_add_signed(timeout));

        let manager = self.clone();
        let timeout_task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            manager.expire(generation).await;
        });

        let handle = CaptureProcessHandle {
            process_id,
            interface: interface.to_string(),
            started_at,
            expires_at,
            generation,
            child,
            timeout_task: Some(timeout_task),
        };
        let status = handle.status(CaptureState::Running);
        inner.handle = Some(handle);
        self.status.send_replace(status.clone());

        info!(
            "Capture process {} started on {} (timeout {:?})",
            process_id, interface, timeout
        );
        Ok(status)
    }

    /// Stops the running capture, if any. Returns `None` when nothing was running.
    pub async fn stop(&self) -> Result<Option<Termination>, LifecycleError> {
        let mut inner = self.inner.lock().await;
        match inner.handle.take() {
            Some(handle) => self.stop_handle(handle).await.map(Some),
            None => {
                debug!("Stop requested with no capture process running");
                Ok(None)
            }
        }
    }

    async fn expire(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        let current = inner.handle.as_ref().map(|handle| handle.generation);
        if current != Some(generation) {
            debug!("Timeout for capture generation {} is stale", generation);
            return;
        }
        if let Some(mut handle) = inner.handle.take() {
            // this task is the timer; dropping its handle detaches instead of aborting
            handle.timeout_task.take();
            info!(
                "Capture process {} on {} reached its timeout",
                handle.process_id, handle.interface
            );
            if let Err(e) = self.stop_handle(handle).await {
                warn!("Failed to stop expired capture process: {}", e);
            }
        }
    }

    async fn stop_handle(
        &self,
        mut handle: CaptureProcessHandle,
    ) -> Result<Termination, LifecycleError> {
        if let Some(timer) = handle.timeout_task.take() {
            timer.abort();
        }
        self.status.send_replace(handle.status(CaptureState::Stopping));
        info!(
            "Stopping capture process {} on {}",
            handle.process_id, handle.interface
        );

        let result = terminate_gracefully(&mut handle.child, self.stop_grace).await;
        self.status.send_replace(CaptureStatus::idle());

        match &result {
            Ok(Termination::AlreadyExited) => info!(
                "Capture process {} had already exited",
                handle.process_id
            ),
            Ok(_) => info!("Capture process {} stopped", handle.process_id),
            Err(e) => warn!(
                "Capture process {} did not stop cleanly: {}",
                handle.process_id, e
            ),
        }
        result
    }
}

/// Accepts names like `eth0`, `wlp3s0`, `br-lan`, `eth0.100`, `veth@if3`.
pub fn validate_interface(interface: &str) -> Result<(), LifecycleError> {
    static INTERFACE: OnceLock<Regex> = OnceLock::new();
    let pattern = INTERFACE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._:@-]+$").expect("interface pattern compiles"));

    if interface.len() > MAX_INTERFACE_LEN
        || interface.starts_with('-')
        || !pattern.is_match(interface)
    {
        return Err(LifecycleError::InvalidInterface(interface.to_string()));
    }
    Ok(())
}

fn forward_output(child: &mut Child, process_id: u32) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(log_lines(stdout, process_id, "stdout"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(log_lines(stderr, process_id, "stderr"));
    }
}

async fn log_lines<R>(reader: R, process_id: u32, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = CappedLines::new(BufReader::new(reader), MAX_LINE_LEN);
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("[capture:{}][{}] {}", process_id, stream, line);
    }
}
