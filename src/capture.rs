//! Traffic capture: turning frames seen on an interface into address pairs.
//!
//! Re-exports:
//! - [`CaptureParser`]: text-line and raw-frame extraction.
//! - [`AddressPair`], [`FrameAddresses`], [`ParseSkip`]: parser output.
//! - [`run_publisher`], [`PublishOptions`]: the `publish` subcommand's pipeline.

pub mod parser;
pub mod pipeline;
pub mod source;
pub mod types;

pub use parser::CaptureParser;
pub use pipeline::{run_publisher, PublishOptions};
pub use source::{CaptureSource, PnetSource, TcpdumpSource};
pub use types::{AddressPair, FrameAddresses, ParseSkip};
