//! Frame sources feeding the parser.
//!
//! - [`TcpdumpSource`]: runs `tcpdump -l -e -n -i <interface>` and parses its
//!   stdout line by line.
//! - [`PnetSource`]: reads raw frames from a `pnet` datalink channel on a
//!   dedicated thread and decodes them in process.
//!
//! Both push [`FrameAddresses`] into an mpsc channel and stop when the
//! receiving side goes away.

use log::{debug, error, info, trace, warn};
use pnet::datalink::{self, Channel};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use super::parser::CaptureParser;
use super::types::FrameAddresses;
use crate::error_handling::types::{CaptureError, LifecycleError};
use crate::line_reader::{CappedLines, MAX_LINE_LEN};
use crate::lifecycle::termination::{terminate_gracefully, Termination};

/// Reads text lines from `reader`, forwarding every parsed frame.
///
/// Returns the number of frames forwarded once the reader hits EOF or the
/// receiver is dropped.
pub async fn pump_lines<R>(reader: R, frames: Sender<FrameAddresses>) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut lines = CappedLines::new(BufReader::new(reader), MAX_LINE_LEN);
    let mut forwarded = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match CaptureParser::parse_line(&line) {
                Ok(frame) => {
                    if frames.send(frame).await.is_err() {
                        debug!("Frame receiver dropped, stopping line reader");
                        break;
                    }
                    forwarded += 1;
                }
                Err(skip) => trace!("Skipped capture line ({}): {}", skip, line),
            },
            Ok(None) => {
                debug!("Capture output reached EOF");
                break;
            }
            Err(e) => {
                warn!("Failed to read capture output: {}", e);
                break;
            }
        }
    }
    forwarded
}

/// `tcpdump` running as a child process.
pub struct TcpdumpSource {
    child: Child,
    reader_task: JoinHandle<usize>,
}

impl TcpdumpSource {
    pub fn spawn(
        program: &str,
        interface: &str,
        frames: Sender<FrameAddresses>,
    ) -> Result<Self, CaptureError> {
        info!("Starting {} on interface {}", program, interface);
        let mut child = Command::new(program)
            .args(["-l", "-e", "-n", "-i", interface])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn {}: {}", program, e);
                CaptureError::SpawnFailed(e)
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::SourceUnavailable(format!("{} stdout not captured", program))
        })?;

        if let Some(stderr) = child.stderr.take() {
            let mut reader = CappedLines::new(BufReader::new(stderr), MAX_LINE_LEN);
            tokio::spawn(async move {
                while let Ok(Some(line)) = reader.next_line().await {
                    debug!("[tcpdump][stderr] {}", line);
                }
            });
        }

        let reader_task = tokio::spawn(pump_lines(stdout, frames));

        Ok(Self { child, reader_task })
    }

    /// Terminates tcpdump and waits for its output reader to drain.
    pub async fn stop(mut self, grace: Duration) -> Result<Termination, LifecycleError> {
        let termination = terminate_gracefully(&mut self.child, grace).await?;
        match self.reader_task.await {
            Ok(forwarded) => info!("tcpdump stopped after {} frames", forwarded),
            Err(e) => warn!("tcpdump reader task failed: {}", e),
        }
        Ok(termination)
    }
}

/// In-process capture through a `pnet` datalink channel.
pub struct PnetSource {
    running: Arc<AtomicBool>,
    thread: std::thread::JoinHandle<()>,
}

impl PnetSource {
    const READ_TIMEOUT: Duration = Duration::from_millis(250);

    pub fn start(interface_name: &str, frames: Sender<FrameAddresses>) -> Result<Self, CaptureError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == interface_name)
            .ok_or_else(|| {
                CaptureError::SourceUnavailable(format!("no interface named {}", interface_name))
            })?;

        let config = datalink::Config {
            read_timeout: Some(Self::READ_TIMEOUT),
            ..Default::default()
        };
        let mut rx = match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(_, rx)) => rx,
            Ok(_) => {
                return Err(CaptureError::SourceUnavailable(format!(
                    "unsupported channel type on {}",
                    interface_name
                )))
            }
            Err(e) => return Err(CaptureError::IoError(e)),
        };
        info!("Opened datalink channel on {}", interface_name);

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let thread = std::thread::spawn(move || {
            while flag.load(Ordering::Relaxed) {
                match rx.next() {
                    Ok(bytes) => match CaptureParser::parse_frame(bytes) {
                        Ok(frame) => {
                            if frames.blocking_send(frame).is_err() {
                                debug!("Frame receiver dropped, stopping datalink reader");
                                break;
                            }
                        }
                        Err(skip) => trace!("Skipped frame: {}", skip),
                    },
                    Err(e)
                        if e.kind() == std::io::ErrorKind::TimedOut
                            || e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        error!("Datalink read failed: {}", e);
                        break;
                    }
                }
            }
            debug!("Datalink reader thread exiting");
        });

        Ok(Self { running, thread })
    }

    /// Signals the reader thread and waits for it; it notices within one read timeout.
    pub async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        let thread = self.thread;
        if tokio::task::spawn_blocking(move || thread.join()).await.is_err() {
            warn!("Datalink reader thread panicked");
        }
    }
}

/// The frame source selected for a capture run.
pub enum CaptureSource {
    Tcpdump(TcpdumpSource),
    Pnet(PnetSource),
}

impl CaptureSource {
    pub async fn stop(self, grace: Duration) {
        match self {
            CaptureSource::Tcpdump(source) => {
                if let Err(e) = source.stop(grace).await {
                    warn!("Failed to stop tcpdump: {}", e);
                }
            }
            CaptureSource::Pnet(source) => source.stop().await,
        }
    }
}
