//! What the engine needs from a network-layer unit.

use std::net::Ipv4Addr;

use crate::config::AddressField;
use crate::error::PacketError;

/// A unit carrying IPv4 addresses and an ordinal annotation slot.
pub trait Unit {
    fn source(&self) -> Ipv4Addr;
    fn destination(&self) -> Ipv4Addr;

    /// Records how many units preceded this one in its cluster.
    fn set_ordinal(&mut self, ordinal: u32);

    fn address(&self, field: AddressField) -> Ipv4Addr {
        match field {
            AddressField::Source => self.source(),
            AddressField::Destination => self.destination(),
        }
    }
}

const IPV4_MIN_HEADER: usize = 20;

/// Addresses of a raw IPv4 packet (no link-layer header) plus its annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Packet {
    src: Ipv4Addr,
    dst: Ipv4Addr,
    ordinal: Option<u32>,
}

impl Ipv4Packet {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self { src, dst, ordinal: None }
    }

    /// Reads source and destination from an IPv4 header.
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < IPV4_MIN_HEADER {
            return Err(PacketError::Truncated(bytes.len()));
        }
        let version = bytes[0] >> 4;
        if version != 4 {
            return Err(PacketError::NotIpv4(version));
        }
        let src = Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]);
        let dst = Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]);
        Ok(Self::new(src, dst))
    }

    /// Annotation set by the last engine that processed this packet.
    pub fn ordinal(&self) -> Option<u32> {
        self.ordinal
    }
}

impl Unit for Ipv4Packet {
    fn source(&self) -> Ipv4Addr {
        self.src
    }

    fn destination(&self) -> Ipv4Addr {
        self.dst
    }

    fn set_ordinal(&mut self, ordinal: u32) {
        self.ordinal = Some(ordinal);
    }
}
