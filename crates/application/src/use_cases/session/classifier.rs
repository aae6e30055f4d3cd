use ferrous_doh_domain::dns_message::extract_query;
use ferrous_doh_domain::{DnsQuery, Ipv4Header, PacketError, ResolverConfig, UdpPacket, UnmatchedPolicy};
use tracing::debug;

/// What the read loop does with one inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketAction {
    /// A DNS query for the tunnel's resolver address.
    Resolve(DnsQuery),
    /// Write the packet back unmodified.
    Passthrough,
    Drop(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Destination is on the leak-protection block list.
    Blocked,
    /// Addressed to our resolver but the DNS payload is unreadable.
    MalformedDns,
    /// Not tunnel DNS traffic and the unmatched policy is `drop`.
    Unmatched,
}

/// Classifies a packet read from the tunnel.
///
/// Packets whose IP or UDP headers cannot be decoded are passed through
/// untouched: partial understanding must not break unrelated flows.
pub fn classify_packet(packet: &[u8], config: &ResolverConfig) -> PacketAction {
    let ip = match Ipv4Header::decode(packet) {
        Ok(ip) => ip,
        Err(e) => return malformed(e),
    };

    if ip.is_udp() {
        let udp = match UdpPacket::decode(packet) {
            Ok(udp) => udp,
            Err(e) => return malformed(e),
        };
        if udp.is_dns_to(config.interface.resolver_address) {
            return match extract_query(packet) {
                Ok(query) => PacketAction::Resolve(query),
                Err(e) => {
                    debug!(error = %e, "Dropping unreadable DNS query");
                    PacketAction::Drop(DropReason::MalformedDns)
                }
            };
        }
    }

    if config.is_blocked(ip.destination) {
        debug!(destination = %ip.destination, "Dropping packet to blocked DNS server");
        return PacketAction::Drop(DropReason::Blocked);
    }

    match config.unmatched_policy {
        UnmatchedPolicy::Passthrough => PacketAction::Passthrough,
        UnmatchedPolicy::Drop => PacketAction::Drop(DropReason::Unmatched),
    }
}

fn malformed(error: PacketError) -> PacketAction {
    debug!(error = %error, "Passing through undecodable packet");
    PacketAction::Passthrough
}
