//! Common data types used across the capture subsystem.

use pnet::util::MacAddr;
use std::fmt;
use std::net::Ipv4Addr;

/// One side of an observed frame: a link-layer address and, when the frame
/// carried an IPv4 header, the matching network-layer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPair {
    pub mac: MacAddr,
    pub ip: Option<Ipv4Addr>,
}

impl AddressPair {
    pub fn new(mac: MacAddr, ip: Option<Ipv4Addr>) -> Self {
        Self { mac, ip }
    }
}

/// Renders `<mac>,<ip>`, with an empty ip field for link-layer-only frames.
impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            Some(ip) => write!(f, "{},{}", self.mac, ip),
            None => write!(f, "{},", self.mac),
        }
    }
}

/// Both directions of one observed frame, source first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAddresses {
    pub source: AddressPair,
    pub destination: AddressPair,
}

impl FrameAddresses {
    /// The pairs in publication order.
    pub fn pairs(&self) -> [AddressPair; 2] {
        [self.source, self.destination]
    }
}

/// Why an input produced no addresses. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSkip {
    /// Fewer than two MAC tokens on a text line.
    MissingLinkLayer { found: usize },
    /// A decoded packet without an IPv4 header.
    MissingNetworkLayer,
    /// Bytes too short to hold an Ethernet header.
    Undecodable,
}

impl fmt::Display for ParseSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSkip::MissingLinkLayer { found } => {
                write!(f, "expected two MAC addresses, found {}", found)
            }
            ParseSkip::MissingNetworkLayer => write!(f, "no IPv4 header"),
            ParseSkip::Undecodable => write!(f, "not an Ethernet frame"),
        }
    }
}
