//! Sequenced pub/sub of address pairs over line-delimited TCP.

pub mod publisher;
pub mod subscriber;
pub mod wire;

pub use publisher::{PubSocket, SequencedPublisher};
pub use subscriber::{format_event, Gap, GapDetectingSubscriber, GapDetector};
pub use wire::AddressPairEvent;
