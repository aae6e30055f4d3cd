#![allow(dead_code)]
use ferrous_doh_domain::dns_message::build_outbound_query_with_id;
use ferrous_doh_domain::packet::encode_ipv4_udp;
use std::net::Ipv4Addr;

pub const CLIENT_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
pub const RESOLVER_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const CLIENT_PORT: u16 = 41_234;

/// Builds IPv4/UDP packets the way the host stack writes them into the tunnel.
pub struct QueryPacketBuilder {
    id: u16,
    domain: String,
    source: Ipv4Addr,
    destination: Ipv4Addr,
    source_port: u16,
    destination_port: u16,
}

impl QueryPacketBuilder {
    pub fn new(domain: &str) -> Self {
        Self {
            id: 0x1234,
            domain: domain.to_string(),
            source: CLIENT_ADDR,
            destination: RESOLVER_ADDR,
            source_port: CLIENT_PORT,
            destination_port: 53,
        }
    }

    pub fn id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    pub fn destination(mut self, destination: Ipv4Addr) -> Self {
        self.destination = destination;
        self
    }

    pub fn destination_port(mut self, port: u16) -> Self {
        self.destination_port = port;
        self
    }

    pub fn dns_payload(&self) -> Vec<u8> {
        build_outbound_query_with_id(self.id, &self.domain).unwrap()
    }

    pub fn build(self) -> Vec<u8> {
        encode_ipv4_udp(
            &self.dns_payload(),
            self.source,
            self.destination,
            self.source_port,
            self.destination_port,
        )
        .unwrap()
    }
}

/// A DoH answer body with the given answers, using compressed owner names.
pub fn doh_answer(id: u16, domain: &str, answers: &[(u16, &[u8])]) -> Vec<u8> {
    let mut msg = build_outbound_query_with_id(id, domain).unwrap();
    msg[2] = 0x81;
    msg[3] = 0x80;
    msg[6..8].copy_from_slice(&(answers.len() as u16).to_be_bytes());
    for (rtype, rdata) in answers {
        msg.extend_from_slice(&[0xC0, 0x0C]);
        msg.extend_from_slice(&rtype.to_be_bytes());
        msg.extend_from_slice(&[0x00, 0x01]);
        msg.extend_from_slice(&300u32.to_be_bytes());
        msg.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        msg.extend_from_slice(rdata);
    }
    msg
}
