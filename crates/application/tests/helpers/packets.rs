#![allow(dead_code)]

use ferrous_doh_domain::dns_message::build_outbound_query_with_id;
use ferrous_doh_domain::packet::encode_ipv4_udp;
use ferrous_doh_domain::{Config, ResolverConfig, UdpPacket};
use std::net::Ipv4Addr;

pub const CLIENT_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
pub const RESOLVER_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

pub fn dns_query_packet(id: u16, domain: &str) -> Vec<u8> {
    dns_query_packet_to(id, domain, RESOLVER_ADDR)
}

pub fn dns_query_packet_to(id: u16, domain: &str, destination: Ipv4Addr) -> Vec<u8> {
    let dns = build_outbound_query_with_id(id, domain).unwrap();
    encode_ipv4_udp(&dns, CLIENT_ADDR, destination, 30_000 + id, 53).unwrap()
}

pub fn udp_packet(destination: Ipv4Addr, port: u16, payload: &[u8]) -> Vec<u8> {
    encode_ipv4_udp(payload, CLIENT_ADDR, destination, 45_000, port).unwrap()
}

/// Transaction id, RCODE and ANCOUNT of a response packet.
pub fn response_summary(packet: &[u8]) -> (u16, u8, u16) {
    let dns = UdpPacket::decode(packet).unwrap().payload;
    let id = u16::from_be_bytes([dns[0], dns[1]]);
    let rcode = dns[3] & 0x0F;
    let ancount = u16::from_be_bytes([dns[6], dns[7]]);
    (id, rcode, ancount)
}

pub fn resolver_config() -> ResolverConfig {
    let mut config = Config::default();
    config.pinning.monitor_interval_secs = 0;
    config.pinning.verify_on_start = false;
    config.resolver_config().unwrap()
}
