// SPDX-License-Identifier: MIT OR Apache-2.0

//! Randomized round-trip laws: build -> parse -> extract reproduces the
//! input layer for every protocol, modulo fields that are derived
//! automatically.

use std::time::SystemTime;

use proptest::prelude::*;

use wiregram::addr::{Ipv4Address, MacAddress};
use wiregram::layer_stack;
use wiregram::layers::dns::{
    Dns, DnsClass, DnsName, DnsNameCompressionMode, DnsQuery, DnsRecord, DnsRef, DnsResourceData,
    DnsType,
};
use wiregram::layers::ip::{Ipv4, Ipv4Fragmentation, Ipv4Option, Ipv4Options, Ipv4Protocol, Ipv4Ref};
use wiregram::layers::l2::Ether;
use wiregram::layers::tcp::{Tcp, TcpFlags, TcpOption, TcpOptions, TcpRef};
use wiregram::layers::udp::{Udp, UdpRef};
use wiregram::prelude::*;

fn label() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9-]{0,14}"
}

fn dns_name() -> impl Strategy<Value = DnsName> {
    proptest::collection::vec(label(), 1..5)
        .prop_map(|labels| labels.join(".").parse::<DnsName>().unwrap())
}

fn build_ethernet(layers: Vec<Box<dyn LayerObject>>) -> Packet {
    PacketBuilder::build(SystemTime::UNIX_EPOCH, layers).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn ipv4_address_to_string_round_trips(raw in any::<u32>()) {
        let addr = Ipv4Address(raw);
        let text = addr.to_string();
        prop_assert_eq!(text.parse::<Ipv4Address>().unwrap(), addr);
    }

    #[test]
    fn mac_address_to_string_round_trips(octets in any::<[u8; 6]>()) {
        let addr = MacAddress(octets);
        prop_assert_eq!(addr.to_string().parse::<MacAddress>().unwrap(), addr);
    }

    #[test]
    fn dns_name_wire_round_trips(name in dns_name()) {
        // Text form round trips.
        prop_assert_eq!(&name.to_string().parse::<DnsName>().unwrap(), &name);

        // Wire form round trips through a query section.
        let mut dns = Dns::new(0);
        dns.queries_mut().push(DnsQuery::new(
            name.clone(),
            DnsType::A,
            DnsClass::INTERNET,
        ));
        let bytes = dns.to_bytes().unwrap();
        let parsed = DnsRef::from_bytes_unchecked(&bytes);
        prop_assert_eq!(&parsed.queries()[0].name, &name);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn tcp_round_trips_through_packet(
        // Registered-port ranges keep the payload from being interpreted
        // as a port-inferred application protocol.
        sport in 1024u16..65535,
        dport in 1024u16..65535,
        seq in any::<u32>(),
        ack in any::<u32>(),
        flag_bits in any::<u16>(),
        window in any::<u16>(),
        urgent in any::<u16>(),
        mss in any::<u16>(),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut tcp = Tcp::new(sport, dport);
        tcp.set_seq(seq);
        tcp.set_ack(ack);
        tcp.set_flags(TcpFlags::from_bits_truncate(flag_bits));
        tcp.set_window(window);
        tcp.set_urgent_ptr(urgent);
        tcp.set_options(TcpOptions::new(vec![TcpOption::Mss(mss)]));
        if !payload.is_empty() {
            tcp.set_payload_unchecked(Box::new(wiregram::layers::Raw::new(payload)));
        }
        let expected = tcp.clone();

        let packet = build_ethernet(layer_stack![
            Ether::new(MacAddress([2, 0, 0, 0, 0, 1]), MacAddress([2, 0, 0, 0, 0, 2])),
            Ipv4::new(Ipv4Address(0x0A000001), Ipv4Address(0x0A000002), 64),
            tcp
        ]);
        prop_assert!(packet.is_valid());

        let parsed = packet.get_layer::<TcpRef>().unwrap().to_layer();
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn udp_round_trips_through_packet(
        sport in 1024u16..65535,
        dport in 1024u16..65535,
        payload in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        let mut udp = Udp::new(sport, dport);
        if !payload.is_empty() {
            udp.set_payload_unchecked(Box::new(wiregram::layers::Raw::new(payload)));
        }
        let expected = udp.clone();

        let packet = build_ethernet(layer_stack![
            Ether::new(MacAddress([2, 0, 0, 0, 0, 1]), MacAddress([2, 0, 0, 0, 0, 2])),
            Ipv4::new(Ipv4Address(0xC0000201), Ipv4Address(0xC0000202), 64),
            udp
        ]);
        prop_assert!(packet.is_valid());

        let parsed = packet.get_layer::<UdpRef>().unwrap().to_layer();
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn ipv4_round_trips_through_packet(
        tos in any::<u8>(),
        id in any::<u16>(),
        ttl in 1u8..255,
        dont_fragment in any::<bool>(),
        stream_id in any::<u16>(),
        saddr in any::<u32>(),
        daddr in any::<u32>(),
    ) {
        let mut ipv4 = Ipv4::new(Ipv4Address(saddr), Ipv4Address(daddr), ttl);
        ipv4.set_tos(tos);
        ipv4.set_identifier(id);
        ipv4.set_fragmentation(Ipv4Fragmentation::new(dont_fragment, false, 0).unwrap());
        ipv4.set_options(Ipv4Options::new(vec![Ipv4Option::StreamIdentifier(stream_id)]));
        ipv4.set_protocol(Some(Ipv4Protocol::Unknown(0xFD)));

        let expected = ipv4.clone();
        let packet = build_ethernet(layer_stack![
            Ether::new(MacAddress([2, 0, 0, 0, 0, 1]), MacAddress([2, 0, 0, 0, 0, 2])),
            ipv4
        ]);
        prop_assert!(packet.is_valid());

        let parsed = packet.get_layer::<Ipv4Ref>().unwrap().to_layer();
        prop_assert_eq!(parsed, expected);
    }
}

proptest! {
    // DNS messages are larger; fewer cases keep the suite fast while
    // still exercising the compression dictionary broadly.
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn dns_compression_is_lossless_and_never_larger(
        id in any::<u16>(),
        names in proptest::collection::vec(dns_name(), 1..8),
    ) {
        let mut dns = Dns::new(id);
        dns.set_is_response(true);
        for (i, name) in names.iter().enumerate() {
            dns.queries_mut().push(DnsQuery::new(
                name.clone(),
                DnsType::A,
                DnsClass::INTERNET,
            ));
            dns.answers_mut().push(DnsRecord::new(
                name.clone(),
                DnsClass::INTERNET,
                i as u32,
                DnsResourceData::A(Ipv4Address(i as u32)),
            ));
        }

        dns.set_compression_mode(DnsNameCompressionMode::Nothing);
        let plain = dns.to_bytes().unwrap();
        prop_assert_eq!(plain.len(), dns.len());

        dns.set_compression_mode(DnsNameCompressionMode::All);
        let compressed = dns.to_bytes().unwrap();
        prop_assert_eq!(compressed.len(), dns.len());

        prop_assert!(compressed.len() <= plain.len());

        let from_plain = DnsRef::from_bytes_unchecked(&plain).to_layer();
        let from_compressed = DnsRef::from_bytes_unchecked(&compressed).to_layer();
        prop_assert_eq!(&from_plain, &from_compressed);
        prop_assert_eq!(&from_compressed, &dns);

        prop_assert!(DnsRef::validate(&plain).is_ok());
        prop_assert!(DnsRef::validate(&compressed).is_ok());
    }
}
