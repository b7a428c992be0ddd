// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whole-packet tests: captured fixtures, build/parse/extract round
//! trips, and bounds-safety sweeps.

use std::time::SystemTime;

use wiregram::addr::{Ipv4Address, MacAddress};
use wiregram::layer_stack;
use wiregram::layers::dns::resource::DnsOptOption;
use wiregram::layers::dns::{
    Dns, DnsClass, DnsName, DnsNameCompressionMode, DnsQuery, DnsRecord, DnsRef, DnsResourceData,
    DnsType,
};
use wiregram::layers::ip::{Ipv4, Ipv4Protocol, Ipv4Ref};
use wiregram::layers::l2::{Ether, EtherRef};
use wiregram::layers::tcp::{Tcp, TcpFlags, TcpRef};
use wiregram::layers::udp::{Udp, UdpRef};
use wiregram::prelude::*;

fn hex(s: &str) -> Vec<u8> {
    let digits: Vec<u8> = s
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|b| match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => panic!("bad hex digit in fixture"),
        })
        .collect();
    digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}

/// A captured Ethernet+IPv4+TCP SYN frame (3372 -> 80, MSS/SACK options).
const SYN_FRAME: &str = "
    feff200001000000 0100000008004500
    00300f4140008006 91eb91fea0ed41d0
    e4df0d2c005038af fe13000000007002
    2238c30c00000204 05b401010402";

#[test]
fn captured_syn_frame_parses_valid() {
    let bytes = hex(SYN_FRAME);
    assert_eq!(bytes.len(), 62);

    let packet = Packet::from_bytes(bytes, SystemTime::UNIX_EPOCH, DataLinkKind::Ethernet);
    assert!(packet.is_valid());

    let ether = packet.ether().unwrap();
    assert_eq!(ether.src(), "00:00:01:00:00:00".parse::<MacAddress>().unwrap());
    assert_eq!(ether.dst(), "fe:ff:20:00:01:00".parse::<MacAddress>().unwrap());

    let ipv4 = packet.get_layer::<Ipv4Ref>().unwrap();
    assert_eq!(ipv4.ttl(), 128);
    assert_eq!(ipv4.protocol(), Ipv4Protocol::Tcp);
    assert!(ipv4.is_header_checksum_correct());
    assert_eq!(ipv4.is_transport_checksum_correct(), Some(true));
    assert_eq!(ipv4.saddr().to_string(), "145.254.160.237");
    assert_eq!(ipv4.daddr().to_string(), "65.208.228.223");

    let tcp = packet.get_layer::<TcpRef>().unwrap();
    assert_eq!(tcp.sport(), 3372);
    assert_eq!(tcp.dport(), 80);
    assert_eq!(tcp.seq(), 0x38AF_FE13);
    assert!(tcp.flags().contains(TcpFlags::SYN));
    assert_eq!(tcp.window(), 8760);
}

#[test]
fn flipping_any_header_byte_invalidates_the_frame() {
    let bytes = hex(SYN_FRAME);
    // Every byte of the IPv4 header is covered by the header checksum.
    for i in 14..34 {
        let mut corrupted = bytes.clone();
        corrupted[i] ^= 0x01;
        let packet =
            Packet::from_bytes(corrupted, SystemTime::UNIX_EPOCH, DataLinkKind::Ethernet);
        assert!(!packet.is_valid(), "flip of byte {i} went undetected");
    }
    // Every byte of the TCP segment is covered by the transport checksum.
    for i in 34..62 {
        let mut corrupted = bytes.clone();
        corrupted[i] ^= 0x01;
        let packet =
            Packet::from_bytes(corrupted, SystemTime::UNIX_EPOCH, DataLinkKind::Ethernet);
        assert!(!packet.is_valid(), "flip of byte {i} went undetected");
    }
}

#[test]
fn truncation_at_every_boundary_stays_sane() {
    let bytes = hex(SYN_FRAME);
    for cut in 0..bytes.len() {
        let packet = Packet::from_bytes(
            &bytes[..cut],
            SystemTime::UNIX_EPOCH,
            DataLinkKind::Ethernet,
        );
        assert!(!packet.is_valid(), "truncation to {cut} bytes counted as valid");
        // Chained accessors bounds-check rather than read out of range.
        let _ = packet.get_layer::<Ipv4Ref>();
        let _ = packet.get_layer::<TcpRef>();
    }

    // Five bytes short of the TCP segment: invalid, payload absent.
    let short = &bytes[14..bytes.len() - 5];
    assert!(Ipv4Ref::validate(short).is_err());
    let ipv4 = Ipv4Ref::from_bytes_unchecked(short);
    assert_eq!(ipv4.payload(), None);
}

#[test]
fn built_syn_matches_parse_and_extract() {
    let ether = Ether::new(
        "00:00:01:00:00:00".parse().unwrap(),
        "fe:ff:20:00:01:00".parse().unwrap(),
    );
    let mut ipv4 = Ipv4::new(
        "145.254.160.237".parse().unwrap(),
        "65.208.228.223".parse().unwrap(),
        128,
    );
    ipv4.set_identifier(0x0F41);
    let mut tcp = Tcp::new(3372, 80);
    tcp.set_seq(0x38AF_FE13);
    tcp.set_flags(TcpFlags::SYN);
    tcp.set_window(8760);

    let expected_tcp = tcp.clone();
    let packet = PacketBuilder::build(
        SystemTime::now(),
        layer_stack![ether, ipv4, tcp],
    )
    .unwrap();
    assert!(packet.is_valid());

    let parsed = packet.get_layer::<TcpRef>().unwrap().to_layer();
    assert_eq!(parsed, expected_tcp);
}

#[test]
fn builder_rejects_bad_layer_stacks() {
    let empty: Vec<Box<dyn LayerObject>> = Vec::new();
    assert!(matches!(
        PacketBuilder::build(SystemTime::now(), empty),
        Err(BuildError::EmptyLayerStack)
    ));

    // A transport layer cannot open a packet.
    assert!(matches!(
        PacketBuilder::build(SystemTime::now(), layer_stack![Tcp::new(1, 2)]),
        Err(BuildError::InvalidFirstLayer(_))
    ));

    // An Ethernet payload with no EtherType and no capability to supply
    // one cannot be auto-determined.
    let ether = Ether::new(MacAddress::ZERO, MacAddress::BROADCAST);
    let result = PacketBuilder::build(
        SystemTime::now(),
        layer_stack![ether, wiregram::layers::Raw::new(vec![1, 2, 3])],
    );
    assert!(matches!(result, Err(BuildError::IncompatiblePayload { .. })));
}

fn dns_response() -> Dns {
    let name = |s: &str| s.parse::<DnsName>().unwrap();
    let mut dns = Dns::new(0xBEEF);
    dns.set_is_response(true);
    dns.set_is_recursion_desired(true);
    dns.set_is_recursion_available(true);
    dns.queries_mut().push(DnsQuery::new(
        name("www.example.com"),
        DnsType::A,
        DnsClass::INTERNET,
    ));
    dns.answers_mut().push(DnsRecord::new(
        name("www.example.com"),
        DnsClass::INTERNET,
        300,
        DnsResourceData::Cname(name("example.com")),
    ));
    dns.answers_mut().push(DnsRecord::new(
        name("example.com"),
        DnsClass::INTERNET,
        300,
        DnsResourceData::A(Ipv4Address::from_octets([93, 184, 216, 34])),
    ));
    dns.answers_mut().push(DnsRecord::new(
        name("example.com"),
        DnsClass::INTERNET,
        300,
        DnsResourceData::Mx {
            preference: 10,
            exchange: name("mail.example.com"),
        },
    ));
    dns.additionals_mut().push(DnsRecord::new(
        DnsName::root(),
        DnsClass(4096), // OPT: requestor's UDP payload size
        0,
        DnsResourceData::Opt(vec![DnsOptOption {
            code: 10,
            data: vec![0, 1, 2, 3, 4, 5, 6, 7],
        }]),
    ));
    dns
}

#[test]
fn dns_over_udp_round_trips_in_both_modes() {
    for mode in [DnsNameCompressionMode::All, DnsNameCompressionMode::Nothing] {
        let mut dns = dns_response();
        dns.set_compression_mode(mode);
        let expected = dns.clone();

        let ether = Ether::new(MacAddress([2, 0, 0, 0, 0, 1]), MacAddress([2, 0, 0, 0, 0, 2]));
        let ipv4 = Ipv4::new(
            "192.0.2.53".parse().unwrap(),
            "192.0.2.99".parse().unwrap(),
            64,
        );
        let udp = Udp::new(53, 33000);

        let packet = PacketBuilder::build(
            SystemTime::now(),
            layer_stack![ether, ipv4, udp, dns],
        )
        .unwrap();
        assert!(packet.is_valid());

        let parsed = packet.get_layer::<DnsRef>().unwrap();
        assert_eq!(parsed.to_layer(), expected);
        assert_eq!(parsed.answers().len(), 3);
    }
}

#[test]
fn dns_compression_size_law_holds_end_to_end() {
    let mut dns = dns_response();

    dns.set_compression_mode(DnsNameCompressionMode::Nothing);
    let uncompressed_len = dns.len();
    let uncompressed = dns.to_bytes().unwrap();
    assert_eq!(uncompressed.len(), uncompressed_len);

    dns.set_compression_mode(DnsNameCompressionMode::All);
    let compressed = dns.to_bytes().unwrap();
    assert_eq!(compressed.len(), dns.len());

    assert!(compressed.len() < uncompressed.len());

    // Suffix sharing across the whole message:
    //   query  "www.example.com"    written in full       (17 bytes)
    //   answer "www.example.com"    -> pointer            (17 -> 2)
    //   CNAME  "example.com"        -> pointer            (13 -> 2)
    //   answer "example.com"        -> pointer            (13 -> 2)
    //   answer "example.com"        -> pointer            (13 -> 2)
    //   MX     "mail.example.com"   -> "mail" + pointer   (18 -> 7)
    let expected_savings = (17 - 2) + (13 - 2) + (13 - 2) + (13 - 2) + (18 - 7);
    assert_eq!(uncompressed.len() - compressed.len(), expected_savings);

    // Both byte streams decode to the same message.
    let a = DnsRef::from_bytes_unchecked(&compressed).to_layer();
    let b = DnsRef::from_bytes_unchecked(&uncompressed).to_layer();
    assert_eq!(a, b);
}

#[test]
fn udp_zero_checksum_is_accepted_as_correct() {
    let ether = Ether::new(MacAddress([2, 0, 0, 0, 0, 1]), MacAddress([2, 0, 0, 0, 0, 2]));
    let ipv4 = Ipv4::new("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap(), 64);
    let mut udp = Udp::new(4000, 4001);
    udp.set_chksum(Some(0)); // explicitly "no checksum"

    let packet = PacketBuilder::build(
        SystemTime::now(),
        layer_stack![ether, ipv4, udp],
    )
    .unwrap();
    assert!(packet.is_valid());

    let ipv4 = packet.get_layer::<Ipv4Ref>().unwrap();
    assert_eq!(ipv4.is_transport_checksum_correct(), Some(true));
    assert_eq!(packet.get_layer::<UdpRef>().unwrap().chksum(), 0);
}

#[test]
fn ether_arp_defaults_to_broadcast_destination() {
    use wiregram::layers::arp::{Arp, ArpOperation, ArpRef};

    let ether = Ether::new(MacAddress([2, 0, 0, 0, 0, 7]), MacAddress::ZERO);
    let arp = Arp::new(
        ArpOperation::Request,
        [2, 0, 0, 0, 0, 7],
        [10, 0, 0, 1],
        [0; 6],
        [10, 0, 0, 2],
    );

    let packet = PacketBuilder::build(SystemTime::now(), layer_stack![ether, arp]).unwrap();
    assert!(packet.is_valid());

    let ether = packet.get_layer::<EtherRef>().unwrap();
    assert_eq!(ether.dst(), MacAddress::BROADCAST);

    let arp = packet.get_layer::<ArpRef>().unwrap();
    assert_eq!(arp.operation(), ArpOperation::Request);
    assert_eq!(arp.target_protocol_addr().unwrap(), &[10, 0, 0, 2]);
}

#[test]
fn forward_pointing_dns_name_fails_without_looping() {
    // A well-formed header declaring one query whose name is a forward
    // pointer.
    let mut bytes = hex("000a 0000 0001 0000 0000 0000");
    bytes.extend([0xC0, 0x20, 0x00, 0x01, 0x00, 0x01]);

    let parsed = DnsRef::from_bytes_unchecked(&bytes);
    assert!(parsed.queries().is_empty());
    assert!(DnsRef::validate(&bytes).is_err());
}
