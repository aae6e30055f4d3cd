//! IPv4 / UDP header codec for packets read from the tunnel device.
//!
//! Only the fields the DNS interception path needs are decoded. Options in the
//! IPv4 header are skipped (the header length is honoured) but never produced:
//! every packet we synthesize carries a bare 20-byte header.

use crate::errors::PacketError;
use std::net::Ipv4Addr;

pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;
pub const PROTOCOL_UDP: u8 = 17;
pub const DNS_PORT: u16 = 53;

const DEFAULT_TTL: u8 = 64;
const FLAG_DONT_FRAGMENT: u16 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Header length in bytes (IHL × 4).
    pub header_len: usize,
    pub total_len: u16,
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < IPV4_MIN_HEADER_LEN {
            return Err(PacketError::truncated(IPV4_MIN_HEADER_LEN, buf.len()));
        }

        let version = buf[0] >> 4;
        if version != 4 {
            return Err(PacketError::NotIpv4(version));
        }

        let header_len = (buf[0] & 0x0F) as usize * 4;
        if header_len < IPV4_MIN_HEADER_LEN {
            return Err(PacketError::BadHeaderLength(header_len));
        }
        if buf.len() < header_len {
            return Err(PacketError::truncated(header_len, buf.len()));
        }

        Ok(Self {
            version,
            header_len,
            total_len: u16::from_be_bytes([buf[2], buf[3]]),
            protocol: buf[9],
            source: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
            destination: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
        })
    }

    /// Serializes a minimal header (no options, DF set, TTL 64) with a valid
    /// header checksum.
    pub fn encode(&self) -> [u8; IPV4_MIN_HEADER_LEN] {
        let mut hdr = [0u8; IPV4_MIN_HEADER_LEN];
        hdr[0] = (4 << 4) | (IPV4_MIN_HEADER_LEN / 4) as u8;
        hdr[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        hdr[6..8].copy_from_slice(&FLAG_DONT_FRAGMENT.to_be_bytes());
        hdr[8] = DEFAULT_TTL;
        hdr[9] = self.protocol;
        hdr[12..16].copy_from_slice(&self.source.octets());
        hdr[16..20].copy_from_slice(&self.destination.octets());

        let sum = checksum(&hdr);
        hdr[10..12].copy_from_slice(&sum.to_be_bytes());
        hdr
    }

    pub fn is_udp(&self) -> bool {
        self.protocol == PROTOCOL_UDP
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    /// Read but never validated on input.
    pub checksum: u16,
}

impl UdpHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < UDP_HEADER_LEN {
            return Err(PacketError::truncated(UDP_HEADER_LEN, buf.len()));
        }
        Ok(Self {
            source_port: u16::from_be_bytes([buf[0], buf[1]]),
            destination_port: u16::from_be_bytes([buf[2], buf[3]]),
            length: u16::from_be_bytes([buf[4], buf[5]]),
            checksum: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }

    pub fn encode(&self) -> [u8; UDP_HEADER_LEN] {
        let mut hdr = [0u8; UDP_HEADER_LEN];
        hdr[0..2].copy_from_slice(&self.source_port.to_be_bytes());
        hdr[2..4].copy_from_slice(&self.destination_port.to_be_bytes());
        hdr[4..6].copy_from_slice(&self.length.to_be_bytes());
        hdr[6..8].copy_from_slice(&self.checksum.to_be_bytes());
        hdr
    }
}

/// A decoded IPv4/UDP datagram borrowing its payload from the read buffer.
#[derive(Debug, Clone, Copy)]
pub struct UdpPacket<'a> {
    pub ip: Ipv4Header,
    pub udp: UdpHeader,
    pub payload: &'a [u8],
}

impl<'a> UdpPacket<'a> {
    /// Decodes the IPv4 and UDP headers. The payload ends at the IPv4 total
    /// length so trailing padding from the device is ignored.
    pub fn decode(buf: &'a [u8]) -> Result<Self, PacketError> {
        let ip = Ipv4Header::decode(buf)?;
        let udp_start = ip.header_len;
        let payload_start = udp_start + UDP_HEADER_LEN;
        let end = ip.total_len as usize;

        if end < payload_start || end > buf.len() {
            return Err(PacketError::truncated(payload_start.max(end), buf.len()));
        }

        let udp = UdpHeader::decode(&buf[udp_start..end])?;
        Ok(Self {
            ip,
            udp,
            payload: &buf[payload_start..end],
        })
    }

    pub fn is_dns_to(&self, resolver: Ipv4Addr) -> bool {
        self.ip.is_udp() && self.udp.destination_port == DNS_PORT && self.ip.destination == resolver
    }
}

/// RFC 1071 one's-complement checksum over 16-bit big-endian words.
/// An odd trailing byte is padded with zero.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Wraps `payload` in fresh UDP and IPv4 headers. The UDP checksum is left at
/// zero, which IPv4 permits.
pub fn encode_ipv4_udp(
    payload: &[u8],
    source: Ipv4Addr,
    destination: Ipv4Addr,
    source_port: u16,
    destination_port: u16,
) -> Result<Vec<u8>, PacketError> {
    let udp_len = UDP_HEADER_LEN + payload.len();
    let total_len = IPV4_MIN_HEADER_LEN + udp_len;
    if total_len > u16::MAX as usize {
        return Err(PacketError::Oversized(total_len));
    }

    let ip = Ipv4Header {
        version: 4,
        header_len: IPV4_MIN_HEADER_LEN,
        total_len: total_len as u16,
        protocol: PROTOCOL_UDP,
        source,
        destination,
    };
    let udp = UdpHeader {
        source_port,
        destination_port,
        length: udp_len as u16,
        checksum: 0,
    };

    let mut packet = Vec::with_capacity(total_len);
    packet.extend_from_slice(&ip.encode());
    packet.extend_from_slice(&udp.encode());
    packet.extend_from_slice(payload);
    Ok(packet)
}
