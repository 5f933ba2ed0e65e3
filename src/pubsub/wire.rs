//! Wire form of broadcast records: `<mac>,<ip>,<sequence>`, one per line.

use pnet::util::MacAddr;
use std::net::Ipv4Addr;

use crate::capture::types::AddressPair;
use crate::error_handling::types::TransportError;

/// An address pair stamped with its position in a publisher's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPairEvent {
    pub pair: AddressPair,
    pub sequence: u64,
}

impl AddressPairEvent {
    pub fn new(pair: AddressPair, sequence: u64) -> Self {
        Self { pair, sequence }
    }

    /// Serializes to the broadcast record, without line terminator.
    pub fn encode(&self) -> String {
        format!("{},{}", self.pair, self.sequence)
    }

    /// Parses a broadcast record. Surrounding whitespace is ignored.
    pub fn decode(record: &str) -> Result<Self, TransportError> {
        let malformed = || TransportError::MalformedRecord(record.to_string());

        let mut fields = record.trim().split(',');
        let (mac, ip, sequence) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(mac), Some(ip), Some(sequence), None) => (mac, ip, sequence),
            _ => return Err(malformed()),
        };

        let mac: MacAddr = mac.parse().map_err(|_| malformed())?;
        let ip: Option<Ipv4Addr> = if ip.is_empty() {
            None
        } else {
            Some(ip.parse().map_err(|_| malformed())?)
        };
        let sequence: u64 = sequence.parse().map_err(|_| malformed())?;

        Ok(Self::new(AddressPair::new(mac, ip), sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let pair = AddressPair::new(
            MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55),
            Some(Ipv4Addr::new(10, 0, 0, 1)),
        );
        assert_eq!(
            AddressPairEvent::new(pair, 7).encode(),
            "00:11:22:33:44:55,10.0.0.1,7"
        );
        let link_only = AddressPair::new(MacAddr::broadcast(), None);
        assert_eq!(
            AddressPairEvent::new(link_only, 0).encode(),
            "ff:ff:ff:ff:ff:ff,,0"
        );
    }

    #[test]
    fn test_decode_with_and_without_ip() {
        let event = AddressPairEvent::decode("aa:bb:cc:dd:ee:ff,10.0.0.2,42\n").unwrap();
        assert_eq!(event.pair.mac.to_string(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(event.pair.ip, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(event.sequence, 42);

        let event = AddressPairEvent::decode("aa:bb:cc:dd:ee:ff,,3").unwrap();
        assert_eq!(event.pair.ip, None);
        assert_eq!(event.sequence, 3);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for record in [
            "",
            "aa:bb:cc:dd:ee:ff,10.0.0.2",
            "aa:bb:cc:dd:ee:ff,10.0.0.2,1,extra",
            "not-a-mac,10.0.0.2,1",
            "aa:bb:cc:dd:ee:ff,10.0.0.300,1",
            "aa:bb:cc:dd:ee:ff,10.0.0.2,-1",
            "aa:bb:cc:dd:ee:ff,10.0.0.2,seq",
        ] {
            assert!(
                matches!(
                    AddressPairEvent::decode(record),
                    Err(TransportError::MalformedRecord(_))
                ),
                "accepted {:?}",
                record
            );
        }
    }
}
