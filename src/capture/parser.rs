//! Extraction of address pairs from captured traffic.
//!
//! Two input shapes are supported:
//! - text lines as printed by `tcpdump -e -n` (link-layer header first, then
//!   the network-layer flow `src[.port] > dst[.port]`)
//! - raw Ethernet frames, decoded with `pnet`
//!
//! Both produce a [`FrameAddresses`] or a [`ParseSkip`] telling why the input
//! carried nothing of interest.

use log::trace;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use pnet::util::MacAddr;
use regex::{Captures, Regex};
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use super::types::{AddressPair, FrameAddresses, ParseSkip};

const MAC_PATTERN: &str = r"(?i)\b(?P<o1>[0-9a-f]{2})[:-](?P<o2>[0-9a-f]{2})[:-](?P<o3>[0-9a-f]{2})[:-](?P<o4>[0-9a-f]{2})[:-](?P<o5>[0-9a-f]{2})[:-](?P<o6>[0-9a-f]{2})\b";

const FLOW_PATTERN: &str = r"\b(?P<src_ip>\d{1,3}(?:\.\d{1,3}){3})(?:\.(?P<src_port>\d{1,5}))?\s*>\s*(?P<dst_ip>\d{1,3}(?:\.\d{1,3}){3})(?:\.(?P<dst_port>\d{1,5}))?\b";

fn mac_regex() -> &'static Regex {
    static MAC_RE: OnceLock<Regex> = OnceLock::new();
    MAC_RE.get_or_init(|| Regex::new(MAC_PATTERN).expect("MAC pattern is valid"))
}

fn flow_regex() -> &'static Regex {
    static FLOW_RE: OnceLock<Regex> = OnceLock::new();
    FLOW_RE.get_or_init(|| Regex::new(FLOW_PATTERN).expect("flow pattern is valid"))
}

/// Stateless parser turning one unit of capture output into addresses.
pub struct CaptureParser;

impl CaptureParser {
    /// Parses one line of `tcpdump -e -n` output.
    ///
    /// The first two MAC tokens are the link-layer source and destination;
    /// further MAC tokens (ARP payloads carry one) are ignored. The IPv4 flow
    /// is searched only after the second MAC. A direction without a usable
    /// IPv4 token keeps its MAC with an empty address.
    pub fn parse_line(line: &str) -> Result<FrameAddresses, ParseSkip> {
        let macs: Vec<(MacAddr, usize)> = mac_regex()
            .captures_iter(line)
            .filter_map(|caps| {
                let end = caps.get(0)?.end();
                mac_from_captures(&caps).map(|mac| (mac, end))
            })
            .collect();

        if macs.len() < 2 {
            trace!("Skipping line ({} MAC tokens): {}", macs.len(), line);
            return Err(ParseSkip::MissingLinkLayer { found: macs.len() });
        }
        if macs.len() > 2 {
            trace!("Line has {} MAC tokens, using the first two", macs.len());
        }

        let (source_mac, _) = macs[0];
        let (destination_mac, header_end) = macs[1];

        let (source_ip, destination_ip) = flow_regex()
            .captures(&line[header_end..])
            .map(|caps| {
                (
                    ipv4_from_group(&caps, "src_ip"),
                    ipv4_from_group(&caps, "dst_ip"),
                )
            })
            .unwrap_or((None, None));

        Ok(FrameAddresses {
            source: AddressPair::new(source_mac, source_ip),
            destination: AddressPair::new(destination_mac, destination_ip),
        })
    }

    /// Extracts addresses from a decoded frame. Frames without an IPv4
    /// header are skipped.
    pub fn parse_packet(ethernet: &EthernetPacket<'_>) -> Result<FrameAddresses, ParseSkip> {
        if ethernet.get_ethertype() != EtherTypes::Ipv4 {
            return Err(ParseSkip::MissingNetworkLayer);
        }
        let ipv4 = Ipv4Packet::new(ethernet.payload()).ok_or(ParseSkip::MissingNetworkLayer)?;

        Ok(FrameAddresses {
            source: AddressPair::new(ethernet.get_source(), Some(ipv4.get_source())),
            destination: AddressPair::new(
                ethernet.get_destination(),
                Some(ipv4.get_destination()),
            ),
        })
    }

    /// Decodes raw frame bytes and extracts addresses.
    pub fn parse_frame(frame: &[u8]) -> Result<FrameAddresses, ParseSkip> {
        let ethernet = EthernetPacket::new(frame).ok_or(ParseSkip::Undecodable)?;
        Self::parse_packet(&ethernet)
    }
}

fn mac_from_captures(caps: &Captures<'_>) -> Option<MacAddr> {
    let mut octets = [0u8; 6];
    for (i, name) in ["o1", "o2", "o3", "o4", "o5", "o6"].iter().enumerate() {
        octets[i] = u8::from_str_radix(caps.name(name)?.as_str(), 16).ok()?;
    }
    Some(MacAddr::new(
        octets[0], octets[1], octets[2], octets[3], octets[4], octets[5],
    ))
}

fn ipv4_from_group(caps: &Captures<'_>, name: &str) -> Option<Ipv4Addr> {
    caps.name(name)?.as_str().parse().ok()
}
