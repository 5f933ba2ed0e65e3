//! The `publish` side: frame source → parser → sequenced publisher.

use log::{error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

use super::source::{CaptureSource, PnetSource, TcpdumpSource};
use crate::configuration::CaptureBackend;
use crate::error_handling::types::CaptureError;
use crate::pubsub::SequencedPublisher;

const FRAME_BUFFER: usize = 1024;

/// Everything one publisher run needs.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub interface: String,
    pub bind: String,
    pub backend: CaptureBackend,
    pub tcpdump_program: String,
    pub channel_capacity: usize,
    pub stop_grace: Duration,
}

/// Captures on the configured interface and publishes every frame until
/// `shutdown` resolves. Returns the number of frames published.
///
/// Failing to bind the publisher or to open the source is fatal. So is the
/// source ending on its own, since nothing would be published after that.
pub async fn run_publisher<F>(options: PublishOptions, shutdown: F) -> Result<u64, CaptureError>
where
    F: Future<Output = ()>,
{
    let publisher = SequencedPublisher::bind(&options.bind, options.channel_capacity)
        .await
        .map_err(|e| {
            error!("Unable to bind publisher on {}: {}", options.bind, e);
            e
        })?;

    let (frames_tx, mut frames_rx) = mpsc::channel(FRAME_BUFFER);
    let source = match options.backend {
        CaptureBackend::Tcpdump => CaptureSource::Tcpdump(TcpdumpSource::spawn(
            &options.tcpdump_program,
            &options.interface,
            frames_tx,
        )?),
        CaptureBackend::Pnet => {
            CaptureSource::Pnet(PnetSource::start(&options.interface, frames_tx)?)
        }
    };
    info!(
        "Capturing on {} with {:?} backend",
        options.interface, options.backend
    );

    tokio::pin!(shutdown);
    let mut published: u64 = 0;
    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping capture");
                break Ok(published);
            }
            frame = frames_rx.recv() => match frame {
                Some(frame) => {
                    publisher.publish_frame(&frame);
                    published += 1;
                }
                None => {
                    warn!("Capture source on {} ended", options.interface);
                    break Err(CaptureError::SourceUnavailable(format!(
                        "capture on {} ended unexpectedly",
                        options.interface
                    )));
                }
            }
        }
    };

    source.stop(options.stop_grace).await;
    info!(
        "Publisher finished: {} frames, {} records",
        published,
        publisher.next_sequence()
    );
    outcome
}
