//! Per-client consumption of the record stream.
//!
//! Each downstream client owns one [`GapDetectingSubscriber`]. It connects to
//! the publisher endpoint, decodes records, reports every non-contiguous
//! sequence number and hands the bare address pair on. When the publisher
//! goes away (capture stopped or restarted) the subscriber reconnects instead
//! of ending the client's stream; a restarted publisher counts from zero
//! again, which shows up as one gap.

use futures::stream::{self, Stream};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use uuid::Uuid;

use super::wire::AddressPairEvent;
use crate::capture::types::AddressPair;
use crate::error_handling::types::StreamError;
use crate::line_reader::CappedLines;

/// Longest accepted record line; the longest valid record is well below it.
const MAX_RECORD_LEN: usize = 128;

/// A jump in sequence numbers between two consecutive records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub expected: u64,
    pub received: u64,
}

impl Gap {
    /// Records skipped over. Zero when the sequence went backwards.
    pub fn missed(&self) -> u64 {
        self.received.saturating_sub(self.expected)
    }
}

/// Tracks the last sequence number seen and flags discontinuities.
#[derive(Debug, Default, Clone)]
pub struct GapDetector {
    last_sequence: Option<u64>,
    gaps: u64,
}

impl GapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `sequence`; returns the gap when it does not follow the last one.
    /// Tracking always moves to `sequence`, gap or not.
    pub fn observe(&mut self, sequence: u64) -> Option<Gap> {
        let gap = match self.last_sequence {
            Some(last) if last.checked_add(1) != Some(sequence) => Some(Gap {
                expected: last.wrapping_add(1),
                received: sequence,
            }),
            _ => None,
        };
        if gap.is_some() {
            self.gaps += 1;
        }
        self.last_sequence = Some(sequence);
        gap
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn gaps(&self) -> u64 {
        self.gaps
    }
}

/// Frames one pair for a text event stream: `data: <mac>,<ip>` and a blank line.
pub fn format_event(pair: &AddressPair) -> String {
    format!("data: {}\n\n", pair)
}

/// One client's view of the broadcast.
pub struct GapDetectingSubscriber {
    id: Uuid,
    endpoint: String,
    reconnect_interval: Duration,
    lines: Option<CappedLines<BufReader<TcpStream>>>,
    detector: GapDetector,
    received: u64,
}

impl GapDetectingSubscriber {
    pub fn new(endpoint: impl Into<String>, reconnect_interval: Duration) -> Self {
        let id = Uuid::new_v4();
        let endpoint = endpoint.into();
        debug!("[{}] Subscriber created for {}", id, endpoint);
        Self {
            id,
            endpoint,
            reconnect_interval,
            lines: None,
            detector: GapDetector::new(),
            received: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.detector.last_sequence()
    }

    pub fn gaps_detected(&self) -> u64 {
        self.detector.gaps()
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    /// Waits for the next well-formed record. Never ends on its own: transport
    /// loss leads to reconnection, malformed records are skipped.
    pub async fn next_event(&mut self) -> AddressPairEvent {
        loop {
            let lines = match self.lines.as_mut() {
                Some(lines) => lines,
                None => {
                    let lines = self.connect().await;
                    self.lines.insert(lines)
                }
            };

            match lines.next_line().await {
                Ok(Some(line)) => match AddressPairEvent::decode(&line) {
                    Ok(event) => {
                        if let Some(gap) = self.detector.observe(event.sequence) {
                            warn!(
                                "[{}] Sequence gap: expected {}, received {} ({} records missed)",
                                self.id,
                                gap.expected,
                                gap.received,
                                gap.missed()
                            );
                        }
                        self.received += 1;
                        return event;
                    }
                    Err(e) => warn!("[{}] Skipping record: {}", self.id, e),
                },
                Ok(None) => {
                    info!("[{}] Publisher closed the connection", self.id);
                    self.lines = None;
                }
                Err(e) => {
                    warn!("[{}] Lost publisher connection: {}", self.id, e);
                    self.lines = None;
                }
            }
        }
    }

    pub async fn next_pair(&mut self) -> AddressPair {
        self.next_event().await.pair
    }

    /// Writes every pair to `sink` as a text event until the sink fails.
    ///
    /// The only way out is `StreamError::Disconnected`, the normal end of a
    /// client's stream.
    pub async fn relay<W>(&mut self, mut sink: W) -> Result<(), StreamError>
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            let pair = self.next_pair().await;
            let frame = format_event(&pair);
            if sink.write_all(frame.as_bytes()).await.is_err() || sink.flush().await.is_err() {
                info!("[{}] Stream client went away", self.id);
                return Err(StreamError::Disconnected);
            }
        }
    }

    /// Endless stream of pairs; dropping it disconnects the subscriber.
    pub fn into_stream(self) -> impl Stream<Item = AddressPair> + Send + 'static {
        stream::unfold(self, |mut subscriber| async move {
            let pair = subscriber.next_pair().await;
            Some((pair, subscriber))
        })
    }

    async fn connect(&self) -> CappedLines<BufReader<TcpStream>> {
        let mut attempts: u64 = 0;
        loop {
            match TcpStream::connect(&self.endpoint).await {
                Ok(stream) => {
                    info!("[{}] Connected to publisher at {}", self.id, self.endpoint);
                    return CappedLines::new(BufReader::new(stream), MAX_RECORD_LEN);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts == 1 {
                        info!(
                            "[{}] Waiting for a publisher at {}: {}",
                            self.id, self.endpoint, e
                        );
                    } else {
                        debug!(
                            "[{}] Connection attempt {} to {} failed: {}",
                            self.id, attempts, self.endpoint, e
                        );
                    }
                    tokio::time::sleep(self.reconnect_interval).await;
                }
            }
        }
    }
}

impl Drop for GapDetectingSubscriber {
    fn drop(&mut self) {
        info!(
            "[{}] Subscriber closed after {} records ({} gaps)",
            self.id,
            self.received,
            self.detector.gaps()
        );
    }
}
