//! Sequenced, fire-and-forget publication of address pairs.
//!
//! [`PubSocket`] is the transport: a TCP listener whose accepted connections
//! are each attached to a `tokio::sync::broadcast` fan-out. A connection only
//! sees records sent after it was accepted. A connection that falls more than
//! the channel capacity behind loses the overflow.
//!
//! [`SequencedPublisher`] stamps every pair with the next value of a counter
//! that starts at 0 and grows by one per pair, then broadcasts the record.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::wire::AddressPairEvent;
use crate::capture::types::{AddressPair, FrameAddresses};
use crate::error_handling::types::TransportError;

/// Publishing side of the record transport.
pub struct PubSocket {
    sender: broadcast::Sender<Arc<str>>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl PubSocket {
    /// Binds the listener and starts accepting subscribers.
    pub async fn bind(addr: &str, capacity: usize) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        let local_addr = listener.local_addr().map_err(TransportError::BindFailed)?;
        let (sender, _) = broadcast::channel(capacity);

        let fanout = sender.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        info!("Subscriber connected from {}", peer);
                        let records = fanout.subscribe();
                        tokio::spawn(serve_subscriber(stream, peer, records));
                    }
                    Err(e) => {
                        warn!("Failed to accept subscriber: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });

        info!("Publishing records on {}", local_addr);
        Ok(Self {
            sender,
            local_addr,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of subscriber connections currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcasts one line. Returns how many subscribers it was queued for;
    /// zero subscribers is not an error.
    pub fn send(&self, line: Arc<str>) -> usize {
        self.sender.send(line).unwrap_or(0)
    }
}

impl Drop for PubSocket {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_subscriber(
    mut stream: TcpStream,
    peer: SocketAddr,
    mut records: broadcast::Receiver<Arc<str>>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", peer, e);
    }
    loop {
        match records.recv().await {
            Ok(line) => {
                if let Err(e) = stream.write_all(line.as_bytes()).await {
                    info!("Subscriber {} disconnected: {}", peer, e);
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Subscriber {} lagged, {} records dropped", peer, skipped);
            }
            Err(RecvError::Closed) => {
                debug!("Publisher closed, releasing subscriber {}", peer);
                break;
            }
        }
    }
}

/// Assigns global ordering to address pairs and broadcasts them.
///
/// Sequence assignment and the broadcast of the record happen under one lock,
/// so records leave in sequence order even when several tasks publish.
pub struct SequencedPublisher {
    socket: PubSocket,
    next_sequence: Mutex<u64>,
}

impl SequencedPublisher {
    pub fn new(socket: PubSocket) -> Self {
        Self {
            socket,
            next_sequence: Mutex::new(0),
        }
    }

    pub async fn bind(addr: &str, capacity: usize) -> Result<Self, TransportError> {
        Ok(Self::new(PubSocket::bind(addr, capacity).await?))
    }

    pub fn socket(&self) -> &PubSocket {
        &self.socket
    }

    /// The sequence number the next published pair will receive.
    pub fn next_sequence(&self) -> u64 {
        *self.lock_counter()
    }

    pub fn publish(&self, pair: AddressPair) -> AddressPairEvent {
        let mut next = self.lock_counter();
        self.publish_locked(&mut next, pair)
    }

    /// Publishes both directions of a frame with consecutive sequence numbers,
    /// source first.
    pub fn publish_frame(&self, frame: &FrameAddresses) -> [AddressPairEvent; 2] {
        let mut next = self.lock_counter();
        let [source, destination] = frame.pairs();
        [
            self.publish_locked(&mut next, source),
            self.publish_locked(&mut next, destination),
        ]
    }

    fn publish_locked(&self, next: &mut u64, pair: AddressPair) -> AddressPairEvent {
        let event = AddressPairEvent::new(pair, *next);
        *next += 1;

        let record = event.encode();
        let delivered = self.socket.send(Arc::from(format!("{}\n", record)));
        debug!("Published {} ({} subscribers)", record, delivered);
        event
    }

    fn lock_counter(&self) -> std::sync::MutexGuard<'_, u64> {
        // the counter stays consistent even if a holder panicked
        self.next_sequence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
