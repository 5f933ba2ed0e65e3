//! Active network probing.

pub mod ping;

pub use ping::{parse_network, usable_hosts, PingSweeper, SweepSummary};
