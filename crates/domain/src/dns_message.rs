//! DNS wire-format helpers for the interception path.
//!
//! Inbound queries arrive as full IPv4/UDP packets from the tunnel; responses
//! are synthesized as full packets and written back. Outbound DoH queries and
//! their answers are bare DNS messages (RFC 8484 bodies).

use crate::dns_query::DnsQuery;
use crate::errors::PacketError;
use crate::packet::{encode_ipv4_udp, UdpPacket};
use std::net::Ipv4Addr;

pub const DNS_HEADER_LEN: usize = 12;
/// Offset of the question section; answer names point back here.
pub const QUESTION_OFFSET: u8 = 12;
pub const ANSWER_TTL: u32 = 60;

pub const TYPE_A: u16 = 1;
pub const CLASS_IN: u16 = 1;

pub const RCODE_NOERROR: u8 = 0;
pub const RCODE_SERVFAIL: u8 = 2;

const FLAGS_RESPONSE: u16 = 0x8180;
const FLAGS_RECURSIVE_QUERY: u16 = 0x0100;
const POINTER_MASK: u8 = 0xC0;
const MAX_LABEL_LEN: usize = 63;
const A_ANSWER_LEN: usize = 16;
/// RFC 1035 limit for a DNS message over UDP without EDNS.
pub const MAX_UDP_MESSAGE_LEN: usize = 512;

/// Location of the question inside a DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Question {
    name: String,
    /// Offset one past QCLASS.
    end: usize,
}

/// Walks an uncompressed QNAME starting at `DNS_HEADER_LEN`, failing on any
/// label that would read past the buffer. Labels holding invalid UTF-8 or a
/// literal `.` are rejected rather than rewritten.
fn read_question(dns: &[u8]) -> Result<Question, PacketError> {
    if dns.len() < DNS_HEADER_LEN {
        return Err(PacketError::MalformedDns(format!(
            "header needs {} bytes, have {}",
            DNS_HEADER_LEN,
            dns.len()
        )));
    }

    let mut pos = DNS_HEADER_LEN;
    let mut name = String::new();

    loop {
        let Some(&len) = dns.get(pos) else {
            return Err(PacketError::MalformedDns(
                "QNAME runs past end of message".to_string(),
            ));
        };
        pos += 1;

        if len == 0 {
            break;
        }
        if len & POINTER_MASK != 0 {
            return Err(PacketError::MalformedDns(format!(
                "unexpected label type 0x{:02x} in question",
                len
            )));
        }

        let len = len as usize;
        let Some(label) = dns.get(pos..pos + len) else {
            return Err(PacketError::MalformedDns(format!(
                "label length {} exceeds remaining {} bytes",
                len,
                dns.len() - pos
            )));
        };
        // The dotted name is re-encoded label by label for the DoH query.
        let label = match std::str::from_utf8(label) {
            Ok(label) if !label.contains('.') => label,
            _ => {
                return Err(PacketError::MalformedDns(format!(
                    "label {:?} cannot be forwarded as a domain name",
                    String::from_utf8_lossy(label)
                )))
            }
        };
        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(label);
        pos += len;
    }

    let end = pos + 4;
    if end > dns.len() {
        return Err(PacketError::MalformedDns(
            "question missing QTYPE/QCLASS".to_string(),
        ));
    }

    Ok(Question { name, end })
}

/// Extracts the transaction id and QNAME from a full IPv4/UDP/DNS packet.
pub fn extract_query(packet: &[u8]) -> Result<DnsQuery, PacketError> {
    let decoded = UdpPacket::decode(packet)?;
    let dns = decoded.payload;
    let question = read_question(dns)?;
    let id = u16::from_be_bytes([dns[0], dns[1]]);
    Ok(DnsQuery::new(id, question.name))
}

/// Builds the response packet for `original` carrying one A record per
/// address, RCODE 0. The answer list is cut short so the DNS message stays
/// within [`MAX_UDP_MESSAGE_LEN`].
pub fn build_response(original: &[u8], addresses: &[Ipv4Addr]) -> Result<Vec<u8>, PacketError> {
    build_reply_packet(original, addresses, RCODE_NOERROR)
}

/// Builds a SERVFAIL response packet for `original` with no answers.
pub fn build_error_response(original: &[u8]) -> Result<Vec<u8>, PacketError> {
    build_reply_packet(original, &[], RCODE_SERVFAIL)
}

fn build_reply_packet(
    original: &[u8],
    addresses: &[Ipv4Addr],
    rcode: u8,
) -> Result<Vec<u8>, PacketError> {
    let query = UdpPacket::decode(original)?;
    let payload = build_reply_payload(query.payload, addresses, rcode)?;

    // Reply appears to come from the resolver address the client queried.
    encode_ipv4_udp(
        &payload,
        query.ip.destination,
        query.ip.source,
        query.udp.destination_port,
        query.udp.source_port,
    )
}

fn build_reply_payload(
    dns: &[u8],
    addresses: &[Ipv4Addr],
    rcode: u8,
) -> Result<Vec<u8>, PacketError> {
    let question = read_question(dns)?;
    let question_bytes = &dns[DNS_HEADER_LEN..question.end];

    // Answers that would push the message past the UDP limit are left out.
    // TC stays clear: the tunnel does not serve DNS over TCP.
    let room = MAX_UDP_MESSAGE_LEN.saturating_sub(DNS_HEADER_LEN + question_bytes.len());
    let addresses = &addresses[..addresses.len().min(room / A_ANSWER_LEN)];

    let mut out =
        Vec::with_capacity(DNS_HEADER_LEN + question_bytes.len() + addresses.len() * A_ANSWER_LEN);

    out.extend_from_slice(&dns[0..2]);
    out.extend_from_slice(&(FLAGS_RESPONSE | rcode as u16).to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&(addresses.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(question_bytes);

    for addr in addresses {
        out.push(POINTER_MASK);
        out.push(QUESTION_OFFSET);
        out.extend_from_slice(&TYPE_A.to_be_bytes());
        out.extend_from_slice(&CLASS_IN.to_be_bytes());
        out.extend_from_slice(&ANSWER_TTL.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&addr.octets());
    }

    Ok(out)
}

/// Builds a minimal recursive A/IN query with a random transaction id.
pub fn build_outbound_query(domain: &str) -> Result<Vec<u8>, PacketError> {
    build_outbound_query_with_id(fastrand::u16(1..), domain)
}

pub fn build_outbound_query_with_id(id: u16, domain: &str) -> Result<Vec<u8>, PacketError> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    let mut out = Vec::with_capacity(DNS_HEADER_LEN + domain.len() + 6);

    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&FLAGS_RECURSIVE_QUERY.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&[0u8; 6]);

    if !domain.is_empty() {
        for label in domain.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(PacketError::MalformedDns(format!(
                    "invalid label '{}' in {}",
                    label, domain
                )));
            }
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
    out.extend_from_slice(&TYPE_A.to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());

    Ok(out)
}

/// Returns the position after an answer's owner name, which is either a label
/// sequence or a two-byte compression pointer.
fn skip_name(buf: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *buf.get(pos)?;
        if len == 0 {
            return Some(pos + 1);
        }
        if len & POINTER_MASK == POINTER_MASK {
            buf.get(pos + 1)?;
            return Some(pos + 2);
        }
        pos += 1 + len as usize;
    }
}

fn read_u16(buf: &[u8], pos: usize) -> Option<u16> {
    let bytes = buf.get(pos..pos + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Decodes the A records of a DoH answer. Any truncation stops the walk and
/// returns what was decoded so far; a broken question yields nothing.
pub fn parse_doh_response(bytes: &[u8]) -> Vec<Ipv4Addr> {
    let mut addresses = Vec::new();

    let Some(ancount) = read_u16(bytes, 6) else {
        return addresses;
    };
    let Ok(question) = read_question(bytes) else {
        return addresses;
    };

    let mut pos = question.end;
    for _ in 0..ancount {
        let Some(after_name) = skip_name(bytes, pos) else {
            break;
        };
        let (Some(rtype), Some(rdlength)) =
            (read_u16(bytes, after_name), read_u16(bytes, after_name + 8))
        else {
            break;
        };
        let rdata_start = after_name + 10;
        let rdlength = rdlength as usize;
        let Some(rdata) = bytes.get(rdata_start..rdata_start + rdlength) else {
            break;
        };

        if rtype == TYPE_A && rdlength == 4 {
            addresses.push(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]));
        }
        pos = rdata_start + rdlength;
    }

    addresses
}

/// Transaction id of a bare DNS message.
pub fn message_id(dns: &[u8]) -> Option<u16> {
    read_u16(dns, 0)
}

/// RCODE of a bare DNS message.
pub fn response_code(dns: &[u8]) -> Option<u8> {
    dns.get(3).map(|flags| flags & 0x0F)
}
