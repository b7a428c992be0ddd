// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Internet Protocol, versions 4 and 6, and the IPv4 options
//! sublanguage.
//!
//! ## IPv4 Packet Layout
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |Version|  IHL  |Typ of Service|          Total Length          |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |         Identification        |Flags|     Fragment Offset     |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  8 |  Time to Live |    Protocol   |        Header Checksum        |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 12 |                         Source Address                        |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 16 |                      Destination Address                      |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 20 Z                            Options                            Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ?? Z                            Payload                            Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use wiregram_common::Buffer;

use crate::addr::{Ipv4Address, Ipv6Address};
use crate::error::*;
use crate::layers::gre::{Gre, GreRef};
use crate::layers::icmp::{Icmp, IcmpRef};
use crate::layers::igmp::{Igmp, IgmpRef};
use crate::layers::l2::EtherType;
use crate::layers::tcp::{Tcp, TcpRef};
use crate::layers::udp::{Udp, UdpRef};
use crate::layers::{Raw, RawRef};
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

pub const DATA_PROTO_ICMP: u8 = 0x01;
pub const DATA_PROTO_IGMP: u8 = 0x02;
pub const DATA_PROTO_TCP: u8 = 0x06;
pub const DATA_PROTO_UDP: u8 = 0x11;
pub const DATA_PROTO_GRE: u8 = 0x2F;

/// The protocol carried in an IPv4/IPv6 packet's payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ipv4Protocol {
    Icmp,
    Igmp,
    Tcp,
    Udp,
    Gre,
    Unknown(u8),
}

impl Ipv4Protocol {
    /// The 8-bit wire value of the protocol.
    #[inline]
    pub fn number(self) -> u8 {
        match self {
            Ipv4Protocol::Icmp => DATA_PROTO_ICMP,
            Ipv4Protocol::Igmp => DATA_PROTO_IGMP,
            Ipv4Protocol::Tcp => DATA_PROTO_TCP,
            Ipv4Protocol::Udp => DATA_PROTO_UDP,
            Ipv4Protocol::Gre => DATA_PROTO_GRE,
            Ipv4Protocol::Unknown(raw) => raw,
        }
    }
}

impl From<u8> for Ipv4Protocol {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            DATA_PROTO_ICMP => Ipv4Protocol::Icmp,
            DATA_PROTO_IGMP => Ipv4Protocol::Igmp,
            DATA_PROTO_TCP => Ipv4Protocol::Tcp,
            DATA_PROTO_UDP => Ipv4Protocol::Udp,
            DATA_PROTO_GRE => Ipv4Protocol::Gre,
            raw => Ipv4Protocol::Unknown(raw),
        }
    }
}

const RESERVED_BIT: u16 = 0b_1000_0000_0000_0000;
const DONT_FRAGMENT_BIT: u16 = 0b_0100_0000_0000_0000;
const MORE_FRAGMENTS_BIT: u16 = 0b_0010_0000_0000_0000;
const FRAG_OFFSET_MASK: u16 = 0b_0001_1111_1111_1111;

/// The packed fragmentation word of an IPv4 header: three flag bits over a
/// 13-bit offset measured in 8-byte units.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Ipv4Fragmentation {
    raw: u16,
}

impl Ipv4Fragmentation {
    /// No flags, offset zero.
    pub const NONE: Ipv4Fragmentation = Ipv4Fragmentation { raw: 0 };

    /// Builds a fragmentation word from flag bits and a *byte* offset.
    ///
    /// Returns an error unless `byte_offset` is a multiple of 8 no larger
    /// than the 13-bit field can carry.
    pub fn new(
        dont_fragment: bool,
        more_fragments: bool,
        byte_offset: usize,
    ) -> Result<Self, SerializationError> {
        if byte_offset % 8 != 0 || byte_offset / 8 > FRAG_OFFSET_MASK as usize {
            return Err(SerializationError::invalid_field_value(Ipv4::name()));
        }
        let mut raw = (byte_offset / 8) as u16;
        if dont_fragment {
            raw |= DONT_FRAGMENT_BIT;
        }
        if more_fragments {
            raw |= MORE_FRAGMENTS_BIT;
        }
        Ok(Ipv4Fragmentation { raw })
    }

    #[inline]
    pub fn from_raw(raw: u16) -> Self {
        Ipv4Fragmentation { raw }
    }

    #[inline]
    pub fn raw(&self) -> u16 {
        self.raw
    }

    #[inline]
    pub fn reserved(&self) -> bool {
        self.raw & RESERVED_BIT > 0
    }

    #[inline]
    pub fn dont_fragment(&self) -> bool {
        self.raw & DONT_FRAGMENT_BIT > 0
    }

    #[inline]
    pub fn more_fragments(&self) -> bool {
        self.raw & MORE_FRAGMENTS_BIT > 0
    }

    /// The fragment offset in bytes (the 13-bit field re-multiplied by 8).
    #[inline]
    pub fn byte_offset(&self) -> usize {
        (self.raw & FRAG_OFFSET_MASK) as usize * 8
    }
}

/// An IPv4 packet.
#[derive(Clone, Debug)]
pub struct Ipv4 {
    // version, ihl, total length and (when left unset) protocol and
    // checksum are derived at serialization time
    tos: u8,
    id: u16,
    fragmentation: Ipv4Fragmentation,
    ttl: u8,
    protocol: Option<Ipv4Protocol>,
    chksum: Option<u16>,
    saddr: Ipv4Address,
    daddr: Ipv4Address,
    options: Ipv4Options,
    payload: Option<Box<dyn LayerObject>>,
}

impl Default for Ipv4 {
    fn default() -> Self {
        Ipv4 {
            tos: 0,
            id: 0,
            fragmentation: Ipv4Fragmentation::NONE,
            ttl: 0,
            protocol: None,
            chksum: None,
            saddr: Ipv4Address::ZERO,
            daddr: Ipv4Address::ZERO,
            options: Ipv4Options::default(),
            payload: None,
        }
    }
}

impl Ipv4 {
    /// Creates a packet between the given addresses with the given TTL;
    /// every other field keeps its default and the protocol/checksum are
    /// derived at build time.
    pub fn new(saddr: Ipv4Address, daddr: Ipv4Address, ttl: u8) -> Self {
        Ipv4 {
            ttl,
            saddr,
            daddr,
            ..Ipv4::default()
        }
    }

    /// The Type of Service byte (DSCP + ECN).
    #[inline]
    pub fn tos(&self) -> u8 {
        self.tos
    }

    #[inline]
    pub fn set_tos(&mut self, tos: u8) {
        self.tos = tos;
    }

    #[inline]
    pub fn identifier(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn set_identifier(&mut self, id: u16) {
        self.id = id;
    }

    #[inline]
    pub fn fragmentation(&self) -> Ipv4Fragmentation {
        self.fragmentation
    }

    #[inline]
    pub fn set_fragmentation(&mut self, fragmentation: Ipv4Fragmentation) {
        self.fragmentation = fragmentation;
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    #[inline]
    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = ttl;
    }

    /// The protocol explicitly assigned to the packet, or `None` if it is
    /// derived from the payload layer at serialization time.
    #[inline]
    pub fn protocol(&self) -> Option<Ipv4Protocol> {
        self.protocol
    }

    #[inline]
    pub fn set_protocol(&mut self, protocol: Option<Ipv4Protocol>) {
        self.protocol = protocol;
    }

    /// The header checksum explicitly assigned to the packet, or `None` if
    /// it is computed at serialization time.
    #[inline]
    pub fn chksum(&self) -> Option<u16> {
        self.chksum
    }

    #[inline]
    pub fn set_chksum(&mut self, chksum: Option<u16>) {
        self.chksum = chksum;
    }

    #[inline]
    pub fn saddr(&self) -> Ipv4Address {
        self.saddr
    }

    #[inline]
    pub fn set_saddr(&mut self, saddr: Ipv4Address) {
        self.saddr = saddr;
    }

    #[inline]
    pub fn daddr(&self) -> Ipv4Address {
        self.daddr
    }

    #[inline]
    pub fn set_daddr(&mut self, daddr: Ipv4Address) {
        self.daddr = daddr;
    }

    #[inline]
    pub fn options(&self) -> &Ipv4Options {
        &self.options
    }

    #[inline]
    pub fn set_options(&mut self, options: Ipv4Options) {
        self.options = options;
    }

    /// The length (in bytes) of the IPv4 header, options included.
    #[inline]
    pub fn header_len(&self) -> usize {
        20 + self.options.byte_len()
    }

    fn resolved_protocol(&self) -> Result<Ipv4Protocol, SerializationError> {
        match self.protocol {
            Some(protocol) => Ok(protocol),
            None => self
                .payload
                .as_ref()
                .and_then(|p| p.ip_payload_protocol())
                .ok_or_else(|| SerializationError::bad_payload_layer(Ipv4::name())),
        }
    }
}

layer_identity!(Ipv4, Ipv4Ref, "Ipv4");

impl PartialEq for Ipv4 {
    fn eq(&self, other: &Self) -> bool {
        self.tos == other.tos
            && self.id == other.id
            && self.fragmentation == other.fragmentation
            && self.ttl == other.ttl
            && self.protocol == other.protocol
            && self.chksum == other.chksum
            && self.saddr == other.saddr
            && self.daddr == other.daddr
            && self.options == other.options
            && match (&self.payload, &other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => a.compare(b.as_ref()),
                _ => false,
            }
    }
}

impl LayerLength for Ipv4 {
    #[inline]
    fn len(&self) -> usize {
        self.header_len() + self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl LayerObject for Ipv4 {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn ether_payload_type(&self) -> Option<EtherType> {
        Some(EtherType::Ipv4)
    }

    #[inline]
    fn can_add_payload_default(&self, payload: &dyn LayerObject) -> bool {
        self.protocol.is_some() || payload.ip_payload_protocol().is_some()
    }

    #[inline]
    fn payload(&self) -> Option<&dyn LayerObject> {
        self.payload.as_deref()
    }

    #[inline]
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject> {
        self.payload.as_deref_mut()
    }

    #[inline]
    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>) {
        self.payload = Some(payload);
    }

    #[inline]
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>> {
        self.payload.take()
    }

    #[inline]
    fn to_boxed_layer(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    #[inline]
    fn compare(&self, other: &dyn LayerObject) -> bool {
        other.as_any().downcast_ref::<Self>().is_some_and(|o| self == o)
    }
}

impl Layer for Ipv4 {}

impl ToBytes for Ipv4 {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();
        let options_len = self.options.byte_len();
        if options_len > IPV4_MAX_OPTIONS_LEN {
            return Err(SerializationError::length_encoding(Ipv4::name()));
        }
        let ihl = 5 + options_len / 4;
        let total_length: u16 = self
            .len()
            .try_into()
            .map_err(|_| SerializationError::length_encoding(Ipv4::name()))?;
        let protocol = self.resolved_protocol()?;

        bytes.push(0x40 | ihl as u8);
        bytes.push(self.tos);
        bytes.extend(total_length.to_be_bytes());
        bytes.extend(self.id.to_be_bytes());
        bytes.extend(self.fragmentation.raw().to_be_bytes());
        bytes.push(self.ttl);
        bytes.push(protocol.number());
        bytes.extend([0, 0]); // checksum backfilled below
        bytes.extend(self.saddr.octets());
        bytes.extend(self.daddr.octets());
        self.options.to_bytes_extended(bytes);

        let chksum = match self.chksum {
            Some(chksum) => chksum,
            None => !utils::ones_complement_16bit(&bytes[start..start + ihl * 4]),
        };
        bytes[start + 10..start + 12].copy_from_slice(&chksum.to_be_bytes());

        match self.payload.as_ref() {
            None => Ok(()),
            Some(p) => p.to_bytes_checksummed(bytes, Some((Self::layer_id(), start))),
        }
    }
}

impl FromBytesCurrent for Ipv4 {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let ipv4 = Ipv4Ref::from_bytes_unchecked(bytes);
        Ipv4 {
            tos: ipv4.tos(),
            id: ipv4.identifier(),
            fragmentation: ipv4.fragmentation(),
            ttl: ipv4.ttl(),
            protocol: Some(ipv4.protocol()),
            chksum: None,
            saddr: ipv4.saddr(),
            daddr: ipv4.daddr(),
            options: ipv4.options().to_options(),
            payload: None,
        }
    }

    fn payload_from_bytes_unchecked_default(&mut self, bytes: &[u8]) {
        let ipv4 = Ipv4Ref::from_bytes_unchecked(bytes);
        let payload = ipv4.payload().unwrap_or(&[]);
        if payload.is_empty() {
            self.payload = None;
            return;
        }

        self.payload = Some(match ipv4.protocol() {
            Ipv4Protocol::Tcp => Box::new(Tcp::from_bytes_unchecked(payload)),
            Ipv4Protocol::Udp => Box::new(Udp::from_bytes_unchecked(payload)),
            Ipv4Protocol::Icmp => Box::new(Icmp::from_bytes_unchecked(payload)),
            Ipv4Protocol::Igmp => Box::new(Igmp::from_bytes_unchecked(payload)),
            Ipv4Protocol::Gre => Box::new(Gre::from_bytes_unchecked(payload)),
            Ipv4Protocol::Unknown(_) => Box::new(Raw::from_bytes_unchecked(payload)),
        });
    }
}

/// A view of an IPv4 packet.
#[derive(Clone, Copy, Debug)]
pub struct Ipv4Ref<'a> {
    data: &'a [u8],
}

impl<'a> Ipv4Ref<'a> {
    #[inline]
    pub fn version(&self) -> u8 {
        self.data
            .first()
            .expect("insufficient bytes in Ipv4 layer to retrieve IP Version field")
            >> 4
    }

    /// The Internet Header Length field: header length in 4-byte words.
    #[inline]
    pub fn ihl(&self) -> u8 {
        self.data
            .first()
            .expect("insufficient bytes in Ipv4 layer to retrieve Internet Header Length field")
            & 0x0F
    }

    #[inline]
    pub fn tos(&self) -> u8 {
        *self
            .data
            .get(1)
            .expect("insufficient bytes in Ipv4 layer to retrieve Type of Service field")
    }

    #[inline]
    pub fn total_length(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 2)
                .expect("insufficient bytes in Ipv4 layer to retrieve Total Length field"),
        )
    }

    #[inline]
    pub fn identifier(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 4)
                .expect("insufficient bytes in Ipv4 layer to retrieve Identification field"),
        )
    }

    #[inline]
    pub fn fragmentation(&self) -> Ipv4Fragmentation {
        Ipv4Fragmentation::from_raw(u16::from_be_bytes(
            utils::to_array(self.data, 6)
                .expect("insufficient bytes in Ipv4 layer to retrieve Fragmentation field"),
        ))
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        *self
            .data
            .get(8)
            .expect("insufficient bytes in Ipv4 layer to retrieve Time to Live field")
    }

    #[inline]
    pub fn protocol(&self) -> Ipv4Protocol {
        Ipv4Protocol::from(
            *self
                .data
                .get(9)
                .expect("insufficient bytes in Ipv4 layer to retrieve Protocol field"),
        )
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 10)
                .expect("insufficient bytes in Ipv4 layer to retrieve Header Checksum field"),
        )
    }

    #[inline]
    pub fn saddr(&self) -> Ipv4Address {
        Ipv4Address::from_octets(
            utils::to_array(self.data, 12)
                .expect("insufficient bytes in Ipv4 layer to retrieve Source Address field"),
        )
    }

    #[inline]
    pub fn daddr(&self) -> Ipv4Address {
        Ipv4Address::from_octets(
            utils::to_array(self.data, 16)
                .expect("insufficient bytes in Ipv4 layer to retrieve Destination Address field"),
        )
    }

    /// A view of the options region declared by the IHL field, clamped to
    /// the available bytes.
    #[inline]
    pub fn options(&self) -> Ipv4OptionsRef<'a> {
        let end = core::cmp::max(self.ihl() as usize, 5) * 4;
        let end = core::cmp::min(end, self.data.len());
        let start = core::cmp::min(20, end);
        Ipv4OptionsRef::from_bytes_unchecked(&self.data[start..end])
    }

    /// Whether the header checksum field matches the header contents.
    pub fn is_header_checksum_correct(&self) -> bool {
        let header_len = core::cmp::max(self.ihl() as usize, 5) * 4;
        match self.data.get(..header_len) {
            Some(header) => utils::ones_complement_16bit(header) == 0xFFFF,
            None => false,
        }
    }

    /// Whether the transport payload's checksum matches its contents
    /// (computed over the IPv4 pseudo-header and the payload).
    ///
    /// `None` when the packet carries no recognized transport protocol or
    /// is too short for the check. The zero wire value is accepted for
    /// UDP, whose checksum is optional.
    pub fn is_transport_checksum_correct(&self) -> Option<bool> {
        let transport = self.payload()?;
        match self.protocol() {
            Ipv4Protocol::Udp => {
                let wire = utils::read_u16(transport, 6, utils::Endianness::Big)?;
                if wire == 0 {
                    return Some(true);
                }
                Some(self.transport_pseudo_header_sum(transport)? == 0xFFFF)
            }
            Ipv4Protocol::Tcp => Some(self.transport_pseudo_header_sum(transport)? == 0xFFFF),
            _ => None,
        }
    }

    fn transport_pseudo_header_sum(&self, transport: &[u8]) -> Option<u16> {
        let transport_len: u16 = transport.len().try_into().ok()?;
        let addrs = self.data.get(12..20)?;
        let mut sum = utils::ones_complement_16bit(transport);
        sum = utils::ones_complement_add(sum, utils::ones_complement_16bit(addrs));
        sum = utils::ones_complement_add(sum, self.protocol().number() as u16);
        sum = utils::ones_complement_add(sum, transport_len);
        Some(sum)
    }

    /// The payload bytes between the header and the declared total
    /// length. `None` when the buffer is truncated before the declared
    /// length - a short capture exposes no partial payload rather than
    /// one that silently reads out of bounds.
    #[inline]
    pub fn payload(&self) -> Option<&'a [u8]> {
        let header_len = core::cmp::max((*self.data.first()? & 0x0F) as usize, 5) * 4;
        let total_length = utils::read_u16(self.data, 2, utils::Endianness::Big)? as usize;
        let end = core::cmp::max(total_length, header_len);
        if end > self.data.len() {
            return None;
        }
        self.data.get(header_len..end)
    }

    /// A view of the packet's TCP payload, if the protocol field declares
    /// one.
    #[inline]
    pub fn tcp(&self) -> Option<TcpRef<'a>> {
        self.get_layer::<TcpRef>()
    }

    /// A view of the packet's UDP payload, if the protocol field declares
    /// one.
    #[inline]
    pub fn udp(&self) -> Option<UdpRef<'a>> {
        self.get_layer::<UdpRef>()
    }

    /// A view of the packet's ICMP payload, if the protocol field declares
    /// one.
    #[inline]
    pub fn icmp(&self) -> Option<IcmpRef<'a>> {
        self.get_layer::<IcmpRef>()
    }
}

impl<'a> FromBytesRef<'a> for Ipv4Ref<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Ipv4Ref { data: bytes }
    }
}

impl LayerOffset for Ipv4Ref<'_> {
    fn payload_byte_index_default(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        let ihl = core::cmp::max((*bytes.first()? & 0x0F) as usize, 5) * 4;
        let payload = bytes.get(ihl..)?;

        match bytes.get(9).map(|&b| Ipv4Protocol::from(b))? {
            Ipv4Protocol::Tcp => {
                if layer_type == TcpRef::layer_id() {
                    Some(ihl)
                } else {
                    TcpRef::payload_byte_index_default(payload, layer_type).map(|idx| ihl + idx)
                }
            }
            Ipv4Protocol::Udp => {
                if layer_type == UdpRef::layer_id() {
                    Some(ihl)
                } else {
                    UdpRef::payload_byte_index_default(payload, layer_type).map(|idx| ihl + idx)
                }
            }
            Ipv4Protocol::Icmp => {
                if layer_type == IcmpRef::layer_id() {
                    Some(ihl)
                } else {
                    None
                }
            }
            Ipv4Protocol::Igmp => {
                if layer_type == IgmpRef::layer_id() {
                    Some(ihl)
                } else {
                    None
                }
            }
            Ipv4Protocol::Gre => {
                if layer_type == GreRef::layer_id() {
                    Some(ihl)
                } else {
                    GreRef::payload_byte_index_default(payload, layer_type).map(|idx| ihl + idx)
                }
            }
            Ipv4Protocol::Unknown(_) => {
                if layer_type == RawRef::layer_id() {
                    Some(ihl)
                } else {
                    None
                }
            }
        }
    }
}

impl Validate for Ipv4Ref<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let (version, ihl) = match curr_layer.first() {
            None => {
                return Err(ValidationError {
                    layer: Ipv4::name(),
                    class: ValidationErrorClass::InsufficientBytes,
                    reason: "packet too short for Ipv4 frame--missing version/IHL byte",
                })
            }
            Some(&b) => (b >> 4, (b & 0x0F) as usize * 4),
        };

        let total_length = match utils::read_u16(curr_layer, 2, utils::Endianness::Big) {
            None => {
                return Err(ValidationError {
                    layer: Ipv4::name(),
                    class: ValidationErrorClass::InsufficientBytes,
                    reason: "packet too short for Ipv4 frame--missing Total Length field",
                })
            }
            Some(l) => l as usize,
        };

        if total_length > curr_layer.len() || ihl > curr_layer.len() {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "length reported in Ipv4 header exceeded the available bytes",
            });
        }

        if version != 4 {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "version number of Ipv4 header was not equal to 0x04",
            });
        }

        if ihl < 20 {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "invalid Ipv4 header length value (IHL must be a value of 5 or more)",
            });
        }

        if total_length < ihl {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::InvalidSize,
                reason: "Total Length field of Ipv4 header smaller than its header length",
            });
        }

        if utils::ones_complement_16bit(&curr_layer[..ihl]) != 0xFFFF {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "incorrect checksum in Ipv4 header",
            });
        }

        if !Ipv4OptionsRef::from_bytes_unchecked(&curr_layer[20..ihl]).is_valid() {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "malformed entry in Ipv4 Options",
            });
        }

        if total_length < curr_layer.len() {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::ExcessBytes(curr_layer.len() - total_length),
                reason: "extra bytes remain past the length reported in the Ipv4 header",
            });
        }

        Ok(())
    }

    fn validate_payload_default(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let ipv4 = Ipv4Ref::from_bytes_unchecked(curr_layer);
        let Some(payload) = ipv4.payload() else {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "packet too short for Ipv4 frame--insufficient bytes for header",
            });
        };

        let protocol = match curr_layer.get(9) {
            Some(&b) => Ipv4Protocol::from(b),
            None => return Ok(()),
        };

        match protocol {
            Ipv4Protocol::Tcp => TcpRef::validate(payload)?,
            Ipv4Protocol::Udp => UdpRef::validate(payload)?,
            Ipv4Protocol::Icmp => IcmpRef::validate(payload)?,
            Ipv4Protocol::Igmp => IgmpRef::validate(payload)?,
            Ipv4Protocol::Gre => GreRef::validate(payload)?,
            // Unrecognized protocols are not interpreted further, and so
            // validate vacuously.
            Ipv4Protocol::Unknown(_) => return RawRef::validate(payload),
        }

        if ipv4.is_transport_checksum_correct() == Some(false) {
            return Err(ValidationError {
                layer: Ipv4::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "incorrect transport checksum under Ipv4 pseudo-header",
            });
        }

        Ok(())
    }
}

impl ToLayer for Ipv4Ref<'_> {
    type Owned = Ipv4;

    #[inline]
    fn to_layer(&self) -> Ipv4 {
        Ipv4::from_bytes_unchecked(self.data)
    }
}

// =============================================================================
//                              IPv4 Options
// =============================================================================

pub const IPV4_MAX_OPTIONS_LEN: usize = 40;

pub const IPV4_OPT_TYPE_EOOL: u8 = 0;
pub const IPV4_OPT_TYPE_NOP: u8 = 1;
pub const IPV4_OPT_TYPE_RECORD_ROUTE: u8 = 7;
pub const IPV4_OPT_TYPE_QUICK_START: u8 = 25;
pub const IPV4_OPT_TYPE_TIMESTAMP: u8 = 68;
pub const IPV4_OPT_TYPE_TRACE_ROUTE: u8 = 82;
pub const IPV4_OPT_TYPE_SECURITY: u8 = 130;
pub const IPV4_OPT_TYPE_LOOSE_ROUTE: u8 = 131;
pub const IPV4_OPT_TYPE_STREAM_ID: u8 = 136;
pub const IPV4_OPT_TYPE_STRICT_ROUTE: u8 = 137;
pub const IPV4_OPT_TYPE_ROUTER_ALERT: u8 = 148;

/// A single option of an IPv4 header.
///
/// `Eool` and `Nop` are *simple* options occupying one byte with no length
/// octet; every other variant is a *complex* option carrying a length
/// octet and a value. All complex options may appear at most once in a
/// valid options list.
#[derive(Clone, Debug, PartialEq)]
pub enum Ipv4Option {
    /// End of Options List; any leftover bytes are padding.
    Eool,
    /// No operation; aligns subsequent options.
    Nop,
    /// DoD Basic Security (RFC 1108): classification level plus protection
    /// authority flag bytes.
    Security(Ipv4OptionSecurity),
    /// Loose source routing (RFC 791).
    LooseSourceRouting(Ipv4OptionRoute),
    /// Strict source routing (RFC 791).
    StrictSourceRouting(Ipv4OptionRoute),
    /// Record route (RFC 791).
    RecordRoute(Ipv4OptionRoute),
    /// Stream identifier (RFC 791).
    StreamIdentifier(u16),
    /// Internet timestamp (RFC 791), with or without recorded addresses.
    Timestamp(Ipv4OptionTimestamp),
    /// Router alert (RFC 2113).
    RouterAlert(u16),
    /// Quick-start (RFC 4782).
    QuickStart(Ipv4OptionQuickStart),
    /// Traceroute using an IP option (RFC 1393).
    TraceRoute(Ipv4OptionTraceRoute),
    /// A structurally sound option of an unrecognized type.
    Unknown(Ipv4OptionUnknown),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ipv4OptionSecurity {
    pub classification_level: u8,
    pub protection_authority: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ipv4OptionRoute {
    /// Index of the next address to be processed (0-based).
    pub pointed_index: u8,
    pub route: Vec<Ipv4Address>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Ipv4OptionTimestamp {
    /// Timestamps only (flag value 0).
    Only {
        overflow: u8,
        pointed_index: u8,
        timestamps: Vec<u32>,
    },
    /// Address/timestamp pairs (flag value 1).
    AndAddress {
        overflow: u8,
        pointed_index: u8,
        pairs: Vec<(Ipv4Address, u32)>,
    },
    /// Address/timestamp pairs for prespecified addresses (flag value 3).
    Prespecified {
        overflow: u8,
        pointed_index: u8,
        pairs: Vec<(Ipv4Address, u32)>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ipv4OptionQuickStart {
    pub function: u8,
    pub rate: u8,
    pub ttl: u8,
    pub nonce: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ipv4OptionTraceRoute {
    pub id: u16,
    pub outbound_hop_count: u16,
    pub return_hop_count: u16,
    pub originator: Ipv4Address,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ipv4OptionUnknown {
    pub option_type: u8,
    pub value: Buffer<u8, 38>, // 40 bytes maximum in options, minus 2 for type and length
}

impl Ipv4Option {
    /// The wire type byte of the option.
    pub fn option_type(&self) -> u8 {
        match self {
            Ipv4Option::Eool => IPV4_OPT_TYPE_EOOL,
            Ipv4Option::Nop => IPV4_OPT_TYPE_NOP,
            Ipv4Option::Security(_) => IPV4_OPT_TYPE_SECURITY,
            Ipv4Option::LooseSourceRouting(_) => IPV4_OPT_TYPE_LOOSE_ROUTE,
            Ipv4Option::StrictSourceRouting(_) => IPV4_OPT_TYPE_STRICT_ROUTE,
            Ipv4Option::RecordRoute(_) => IPV4_OPT_TYPE_RECORD_ROUTE,
            Ipv4Option::StreamIdentifier(_) => IPV4_OPT_TYPE_STREAM_ID,
            Ipv4Option::Timestamp(_) => IPV4_OPT_TYPE_TIMESTAMP,
            Ipv4Option::RouterAlert(_) => IPV4_OPT_TYPE_ROUTER_ALERT,
            Ipv4Option::QuickStart(_) => IPV4_OPT_TYPE_QUICK_START,
            Ipv4Option::TraceRoute(_) => IPV4_OPT_TYPE_TRACE_ROUTE,
            Ipv4Option::Unknown(unknown) => unknown.option_type,
        }
    }

    /// Whether this option is a one-byte option with no length octet.
    #[inline]
    pub fn is_simple(&self) -> bool {
        matches!(self, Ipv4Option::Eool | Ipv4Option::Nop)
    }

    /// Whether a valid options list permits at most one occurrence of this
    /// option's type.
    #[inline]
    pub fn appears_at_most_once(&self) -> bool {
        !self.is_simple()
    }

    /// The encoded length of the option in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Ipv4Option::Eool | Ipv4Option::Nop => 1,
            Ipv4Option::Security(security) => 3 + security.protection_authority.len(),
            Ipv4Option::LooseSourceRouting(route)
            | Ipv4Option::StrictSourceRouting(route)
            | Ipv4Option::RecordRoute(route) => 3 + 4 * route.route.len(),
            Ipv4Option::StreamIdentifier(_) => 4,
            Ipv4Option::Timestamp(Ipv4OptionTimestamp::Only { timestamps, .. }) => {
                4 + 4 * timestamps.len()
            }
            Ipv4Option::Timestamp(Ipv4OptionTimestamp::AndAddress { pairs, .. })
            | Ipv4Option::Timestamp(Ipv4OptionTimestamp::Prespecified { pairs, .. }) => {
                4 + 8 * pairs.len()
            }
            Ipv4Option::RouterAlert(_) => 4,
            Ipv4Option::QuickStart(_) => 8,
            Ipv4Option::TraceRoute(_) => 12,
            Ipv4Option::Unknown(unknown) => 2 + unknown.value.len(),
        }
    }

    /// Decodes one option at the front of `bytes`, returning the option
    /// and the number of bytes it consumed. `None` marks a structurally
    /// malformed entry, which invalidates the whole options list.
    pub fn read(bytes: &[u8]) -> Option<(Ipv4Option, usize)> {
        let &option_type = bytes.first()?;
        match option_type {
            IPV4_OPT_TYPE_EOOL => return Some((Ipv4Option::Eool, 1)),
            IPV4_OPT_TYPE_NOP => return Some((Ipv4Option::Nop, 1)),
            _ => (),
        }

        let &length = bytes.get(1)?;
        if length < 2 {
            return None;
        }
        let value = bytes.get(2..length as usize)?;

        let option = match option_type {
            IPV4_OPT_TYPE_SECURITY => {
                let (&classification_level, protection_authority) = value.split_first()?;
                Ipv4Option::Security(Ipv4OptionSecurity {
                    classification_level,
                    protection_authority: protection_authority.into(),
                })
            }
            IPV4_OPT_TYPE_LOOSE_ROUTE | IPV4_OPT_TYPE_STRICT_ROUTE
            | IPV4_OPT_TYPE_RECORD_ROUTE => {
                let (&pointer, addrs) = value.split_first()?;
                if addrs.len() % 4 != 0 || pointer < 4 || (pointer - 4) % 4 != 0 {
                    return None;
                }
                let route = addrs
                    .chunks_exact(4)
                    .map(|c| Ipv4Address::from_octets(c.try_into().unwrap()))
                    .collect();
                let inner = Ipv4OptionRoute {
                    pointed_index: (pointer - 4) / 4,
                    route,
                };
                match option_type {
                    IPV4_OPT_TYPE_LOOSE_ROUTE => Ipv4Option::LooseSourceRouting(inner),
                    IPV4_OPT_TYPE_STRICT_ROUTE => Ipv4Option::StrictSourceRouting(inner),
                    _ => Ipv4Option::RecordRoute(inner),
                }
            }
            IPV4_OPT_TYPE_STREAM_ID => {
                if value.len() != 2 {
                    return None;
                }
                Ipv4Option::StreamIdentifier(u16::from_be_bytes(value.try_into().unwrap()))
            }
            IPV4_OPT_TYPE_TIMESTAMP => {
                let (&pointer, rest) = value.split_first()?;
                let (&overflow_flags, entries) = rest.split_first()?;
                if length % 4 != 0 || pointer < 5 || (pointer - 5) % 4 != 0 {
                    return None;
                }
                let overflow = overflow_flags >> 4;
                let pointed_index = (pointer - 5) / 4;
                match overflow_flags & 0x0F {
                    0 => {
                        if entries.len() % 4 != 0 {
                            return None;
                        }
                        let timestamps = entries
                            .chunks_exact(4)
                            .map(|c| u32::from_be_bytes(c.try_into().unwrap()))
                            .collect();
                        Ipv4Option::Timestamp(Ipv4OptionTimestamp::Only {
                            overflow,
                            pointed_index,
                            timestamps,
                        })
                    }
                    flag @ (1 | 3) => {
                        if entries.len() % 8 != 0 {
                            return None;
                        }
                        let pairs: Vec<(Ipv4Address, u32)> = entries
                            .chunks_exact(8)
                            .map(|c| {
                                (
                                    Ipv4Address::from_octets(c[..4].try_into().unwrap()),
                                    u32::from_be_bytes(c[4..].try_into().unwrap()),
                                )
                            })
                            .collect();
                        if flag == 1 {
                            Ipv4Option::Timestamp(Ipv4OptionTimestamp::AndAddress {
                                overflow,
                                pointed_index,
                                pairs,
                            })
                        } else {
                            Ipv4Option::Timestamp(Ipv4OptionTimestamp::Prespecified {
                                overflow,
                                pointed_index,
                                pairs,
                            })
                        }
                    }
                    _ => return None,
                }
            }
            IPV4_OPT_TYPE_ROUTER_ALERT => {
                if value.len() != 2 {
                    return None;
                }
                Ipv4Option::RouterAlert(u16::from_be_bytes(value.try_into().unwrap()))
            }
            IPV4_OPT_TYPE_QUICK_START => {
                if value.len() != 6 {
                    return None;
                }
                Ipv4Option::QuickStart(Ipv4OptionQuickStart {
                    function: value[0] >> 4,
                    rate: value[0] & 0x0F,
                    ttl: value[1],
                    nonce: u32::from_be_bytes(value[2..6].try_into().unwrap()) >> 2,
                })
            }
            IPV4_OPT_TYPE_TRACE_ROUTE => {
                if value.len() != 10 {
                    return None;
                }
                Ipv4Option::TraceRoute(Ipv4OptionTraceRoute {
                    id: u16::from_be_bytes(value[0..2].try_into().unwrap()),
                    outbound_hop_count: u16::from_be_bytes(value[2..4].try_into().unwrap()),
                    return_hop_count: u16::from_be_bytes(value[4..6].try_into().unwrap()),
                    originator: Ipv4Address::from_octets(value[6..10].try_into().unwrap()),
                })
            }
            _ => {
                if value.len() > 38 {
                    return None;
                }
                Ipv4Option::Unknown(Ipv4OptionUnknown {
                    option_type,
                    value: Buffer::from_slice(value),
                })
            }
        };

        Some((option, length as usize))
    }

    /// Appends the encoded form of the option.
    pub fn to_bytes_extended(&self, bytes: &mut Vec<u8>) {
        bytes.push(self.option_type());
        if self.is_simple() {
            return;
        }
        bytes.push(self.byte_len() as u8);

        match self {
            Ipv4Option::Security(security) => {
                bytes.push(security.classification_level);
                bytes.extend(&security.protection_authority);
            }
            Ipv4Option::LooseSourceRouting(route)
            | Ipv4Option::StrictSourceRouting(route)
            | Ipv4Option::RecordRoute(route) => {
                bytes.push(4 + 4 * route.pointed_index);
                for addr in &route.route {
                    bytes.extend(addr.octets());
                }
            }
            Ipv4Option::StreamIdentifier(id) => bytes.extend(id.to_be_bytes()),
            Ipv4Option::Timestamp(Ipv4OptionTimestamp::Only {
                overflow,
                pointed_index,
                timestamps,
            }) => {
                bytes.push(5 + 4 * pointed_index);
                bytes.push(overflow << 4);
                for ts in timestamps {
                    bytes.extend(ts.to_be_bytes());
                }
            }
            Ipv4Option::Timestamp(
                Ipv4OptionTimestamp::AndAddress {
                    overflow,
                    pointed_index,
                    pairs,
                }
                | Ipv4OptionTimestamp::Prespecified {
                    overflow,
                    pointed_index,
                    pairs,
                },
            ) => {
                let flag = match self {
                    Ipv4Option::Timestamp(Ipv4OptionTimestamp::Prespecified { .. }) => 3,
                    _ => 1,
                };
                bytes.push(5 + 4 * pointed_index);
                bytes.push((overflow << 4) | flag);
                for (addr, ts) in pairs {
                    bytes.extend(addr.octets());
                    bytes.extend(ts.to_be_bytes());
                }
            }
            Ipv4Option::RouterAlert(value) => bytes.extend(value.to_be_bytes()),
            Ipv4Option::QuickStart(qs) => {
                bytes.push((qs.function << 4) | (qs.rate & 0x0F));
                bytes.push(qs.ttl);
                bytes.extend((qs.nonce << 2).to_be_bytes());
            }
            Ipv4Option::TraceRoute(tr) => {
                bytes.extend(tr.id.to_be_bytes());
                bytes.extend(tr.outbound_hop_count.to_be_bytes());
                bytes.extend(tr.return_hop_count.to_be_bytes());
                bytes.extend(tr.originator.octets());
            }
            Ipv4Option::Unknown(unknown) => bytes.extend(unknown.value.as_slice()),
            Ipv4Option::Eool | Ipv4Option::Nop => unreachable!(),
        }
    }
}

/// The ordered options list of an IPv4 header.
///
/// The list is normalized at construction: when the encoded options do not
/// end on a 4-byte boundary, an `Eool` terminator is appended (the
/// remaining padding is written as zero bytes and not part of the list).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ipv4Options {
    options: Vec<Ipv4Option>,
}

impl Ipv4Options {
    /// An empty options list.
    pub const fn none() -> Self {
        Ipv4Options {
            options: Vec::new(),
        }
    }

    /// Builds a normalized options list.
    pub fn new(mut options: Vec<Ipv4Option>) -> Self {
        let unpadded: usize = options.iter().map(Ipv4Option::byte_len).sum();
        let ends_with_eool = matches!(options.last(), Some(Ipv4Option::Eool));
        if unpadded % 4 != 0 && !ends_with_eool {
            options.push(Ipv4Option::Eool);
        }
        Ipv4Options { options }
    }

    #[inline]
    pub fn options(&self) -> &[Ipv4Option] {
        &self.options
    }

    /// The number of bytes the encoded options occupy, padding included.
    #[inline]
    pub fn byte_len(&self) -> usize {
        let unpadded: usize = self.options.iter().map(Ipv4Option::byte_len).sum();
        utils::padded_length::<4>(unpadded)
    }

    /// Appends the encoded options followed by zero padding up to the
    /// 4-byte boundary.
    pub fn to_bytes_extended(&self, bytes: &mut Vec<u8>) {
        let start = bytes.len();
        for option in &self.options {
            option.to_bytes_extended(bytes);
        }
        let end = start + self.byte_len();
        bytes.resize(end, 0);
    }
}

/// A view of the options region of an IPv4 header.
#[derive(Clone, Copy, Debug)]
pub struct Ipv4OptionsRef<'a> {
    bytes: &'a [u8],
}

impl<'a> Ipv4OptionsRef<'a> {
    #[inline]
    pub fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Ipv4OptionsRef { bytes }
    }

    #[inline]
    pub fn iter(&self) -> Ipv4OptionsIterRef<'a> {
        Ipv4OptionsIterRef {
            bytes: self.bytes,
            end_reached: false,
        }
    }

    /// Decodes the whole region. `None` marks a structurally malformed
    /// entry or a repeated at-most-once option, either of which
    /// invalidates the list as a whole.
    pub fn to_options_checked(&self) -> Option<Ipv4Options> {
        let mut options = Vec::new();
        let mut iter = self.iter();
        for option in &mut iter {
            let option = option?;
            if option.appears_at_most_once()
                && options.iter().any(|o: &Ipv4Option| o.option_type() == option.option_type())
            {
                return None;
            }
            options.push(option);
        }
        Some(Ipv4Options { options })
    }

    /// Decodes the whole region, yielding an empty list when it is
    /// invalid.
    #[inline]
    pub fn to_options(&self) -> Ipv4Options {
        self.to_options_checked().unwrap_or_default()
    }

    /// Whether the options region parses cleanly: no malformed entry and
    /// no repeated at-most-once option.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.to_options_checked().is_some()
    }
}

/// Iterates the options of an [`Ipv4OptionsRef`], yielding `None` items
/// for malformed entries.
pub struct Ipv4OptionsIterRef<'a> {
    bytes: &'a [u8],
    end_reached: bool,
}

impl Iterator for Ipv4OptionsIterRef<'_> {
    type Item = Option<Ipv4Option>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end_reached || self.bytes.is_empty() {
            return None;
        }

        match Ipv4Option::read(self.bytes) {
            None => {
                self.end_reached = true;
                Some(None)
            }
            Some((option, consumed)) => {
                self.bytes = &self.bytes[consumed..];
                if matches!(option, Ipv4Option::Eool) {
                    self.end_reached = true;
                }
                Some(Some(option))
            }
        }
    }
}

// =============================================================================
//                                   IPv6
// =============================================================================

/// An IPv6 packet (fixed header only; extension headers are not
/// interpreted).
///
/// ## Packet Layout
/// ```txt
///    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
///    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  0 |Version| Traffic Class |             Flow Label                |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  4 |        Payload Length         |  Next Header  |   Hop Limit   |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  8 |                                                               |
///    +                                                               +
/// .. |                         Source Address                        |
///    +                                                               +
///    |                                                               |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// 24 |                                                               |
///    +                                                               +
/// .. |                      Destination Address                      |
///    +                                                               +
///    |                                                               |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// 40 Z                            Payload                            Z
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Debug)]
pub struct Ipv6 {
    traffic_class: u8,
    flow_label: u32,
    next_header: Option<Ipv4Protocol>,
    hop_limit: u8,
    saddr: Ipv6Address,
    daddr: Ipv6Address,
    payload: Option<Box<dyn LayerObject>>,
}

impl Ipv6 {
    pub fn new(saddr: Ipv6Address, daddr: Ipv6Address, hop_limit: u8) -> Self {
        Ipv6 {
            traffic_class: 0,
            flow_label: 0,
            next_header: None,
            hop_limit,
            saddr,
            daddr,
            payload: None,
        }
    }

    #[inline]
    pub fn traffic_class(&self) -> u8 {
        self.traffic_class
    }

    #[inline]
    pub fn set_traffic_class(&mut self, traffic_class: u8) {
        self.traffic_class = traffic_class;
    }

    #[inline]
    pub fn flow_label(&self) -> u32 {
        self.flow_label
    }

    #[inline]
    pub fn set_flow_label(&mut self, flow_label: u32) {
        self.flow_label = flow_label & 0x000F_FFFF;
    }

    /// The next-header value explicitly assigned to the packet, or `None`
    /// if it is derived from the payload layer at serialization time.
    #[inline]
    pub fn next_header(&self) -> Option<Ipv4Protocol> {
        self.next_header
    }

    #[inline]
    pub fn set_next_header(&mut self, next_header: Option<Ipv4Protocol>) {
        self.next_header = next_header;
    }

    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    #[inline]
    pub fn set_hop_limit(&mut self, hop_limit: u8) {
        self.hop_limit = hop_limit;
    }

    #[inline]
    pub fn saddr(&self) -> Ipv6Address {
        self.saddr
    }

    #[inline]
    pub fn daddr(&self) -> Ipv6Address {
        self.daddr
    }
}

layer_identity!(Ipv6, Ipv6Ref, "Ipv6");

impl PartialEq for Ipv6 {
    fn eq(&self, other: &Self) -> bool {
        self.traffic_class == other.traffic_class
            && self.flow_label == other.flow_label
            && self.next_header == other.next_header
            && self.hop_limit == other.hop_limit
            && self.saddr == other.saddr
            && self.daddr == other.daddr
            && match (&self.payload, &other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => a.compare(b.as_ref()),
                _ => false,
            }
    }
}

impl LayerLength for Ipv6 {
    #[inline]
    fn len(&self) -> usize {
        40 + self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl LayerObject for Ipv6 {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn ether_payload_type(&self) -> Option<EtherType> {
        Some(EtherType::Ipv6)
    }

    #[inline]
    fn can_add_payload_default(&self, payload: &dyn LayerObject) -> bool {
        self.next_header.is_some() || payload.ip_payload_protocol().is_some()
    }

    #[inline]
    fn payload(&self) -> Option<&dyn LayerObject> {
        self.payload.as_deref()
    }

    #[inline]
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject> {
        self.payload.as_deref_mut()
    }

    #[inline]
    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>) {
        self.payload = Some(payload);
    }

    #[inline]
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>> {
        self.payload.take()
    }

    #[inline]
    fn to_boxed_layer(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    #[inline]
    fn compare(&self, other: &dyn LayerObject) -> bool {
        other.as_any().downcast_ref::<Self>().is_some_and(|o| self == o)
    }
}

impl Layer for Ipv6 {}

impl ToBytes for Ipv6 {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();
        let payload_len: u16 = self
            .payload
            .as_ref()
            .map(|p| p.len())
            .unwrap_or(0)
            .try_into()
            .map_err(|_| SerializationError::length_encoding(Ipv6::name()))?;
        let next_header = match self.next_header {
            Some(next_header) => next_header,
            None => self
                .payload
                .as_ref()
                .and_then(|p| p.ip_payload_protocol())
                .ok_or_else(|| SerializationError::bad_payload_layer(Ipv6::name()))?,
        };

        let first_word = (6u32 << 28)
            | ((self.traffic_class as u32) << 20)
            | (self.flow_label & 0x000F_FFFF);
        bytes.extend(first_word.to_be_bytes());
        bytes.extend(payload_len.to_be_bytes());
        bytes.push(next_header.number());
        bytes.push(self.hop_limit);
        bytes.extend(self.saddr.octets());
        bytes.extend(self.daddr.octets());

        match self.payload.as_ref() {
            None => Ok(()),
            Some(p) => p.to_bytes_checksummed(bytes, Some((Self::layer_id(), start))),
        }
    }
}

impl FromBytesCurrent for Ipv6 {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let ipv6 = Ipv6Ref::from_bytes_unchecked(bytes);
        Ipv6 {
            traffic_class: ipv6.traffic_class(),
            flow_label: ipv6.flow_label(),
            next_header: Some(ipv6.next_header()),
            hop_limit: ipv6.hop_limit(),
            saddr: ipv6.saddr(),
            daddr: ipv6.daddr(),
            payload: None,
        }
    }

    fn payload_from_bytes_unchecked_default(&mut self, bytes: &[u8]) {
        let ipv6 = Ipv6Ref::from_bytes_unchecked(bytes);
        let payload = ipv6.payload().unwrap_or(&[]);
        if payload.is_empty() {
            self.payload = None;
            return;
        }

        self.payload = Some(match ipv6.next_header() {
            Ipv4Protocol::Tcp => Box::new(Tcp::from_bytes_unchecked(payload)),
            Ipv4Protocol::Udp => Box::new(Udp::from_bytes_unchecked(payload)),
            Ipv4Protocol::Gre => Box::new(Gre::from_bytes_unchecked(payload)),
            _ => Box::new(Raw::from_bytes_unchecked(payload)),
        });
    }
}

/// A view of an IPv6 packet.
#[derive(Clone, Copy, Debug)]
pub struct Ipv6Ref<'a> {
    data: &'a [u8],
}

impl<'a> Ipv6Ref<'a> {
    #[inline]
    pub fn version(&self) -> u8 {
        self.data
            .first()
            .expect("insufficient bytes in Ipv6 layer to retrieve IP Version field")
            >> 4
    }

    #[inline]
    pub fn traffic_class(&self) -> u8 {
        let word = u32::from_be_bytes(
            utils::to_array(self.data, 0)
                .expect("insufficient bytes in Ipv6 layer to retrieve Traffic Class field"),
        );
        ((word >> 20) & 0xFF) as u8
    }

    #[inline]
    pub fn flow_label(&self) -> u32 {
        u32::from_be_bytes(
            utils::to_array(self.data, 0)
                .expect("insufficient bytes in Ipv6 layer to retrieve Flow Label field"),
        ) & 0x000F_FFFF
    }

    #[inline]
    pub fn payload_length(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 4)
                .expect("insufficient bytes in Ipv6 layer to retrieve Payload Length field"),
        )
    }

    #[inline]
    pub fn next_header(&self) -> Ipv4Protocol {
        Ipv4Protocol::from(
            *self
                .data
                .get(6)
                .expect("insufficient bytes in Ipv6 layer to retrieve Next Header field"),
        )
    }

    #[inline]
    pub fn hop_limit(&self) -> u8 {
        *self
            .data
            .get(7)
            .expect("insufficient bytes in Ipv6 layer to retrieve Hop Limit field")
    }

    #[inline]
    pub fn saddr(&self) -> Ipv6Address {
        Ipv6Address(
            utils::to_array(self.data, 8)
                .expect("insufficient bytes in Ipv6 layer to retrieve Source Address field"),
        )
    }

    #[inline]
    pub fn daddr(&self) -> Ipv6Address {
        Ipv6Address(
            utils::to_array(self.data, 24)
                .expect("insufficient bytes in Ipv6 layer to retrieve Destination Address field"),
        )
    }

    /// The payload bytes after the fixed header, or `None` if the packet
    /// is truncated before the end of its header.
    #[inline]
    pub fn payload(&self) -> Option<&'a [u8]> {
        let declared = utils::read_u16(self.data, 4, utils::Endianness::Big)? as usize;
        let end = core::cmp::min(40 + declared, self.data.len());
        self.data.get(40..end)
    }
}

impl<'a> FromBytesRef<'a> for Ipv6Ref<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Ipv6Ref { data: bytes }
    }
}

impl LayerOffset for Ipv6Ref<'_> {
    fn payload_byte_index_default(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        let payload = bytes.get(40..)?;
        match bytes.get(6).map(|&b| Ipv4Protocol::from(b))? {
            Ipv4Protocol::Tcp => {
                if layer_type == TcpRef::layer_id() {
                    Some(40)
                } else {
                    TcpRef::payload_byte_index_default(payload, layer_type).map(|idx| 40 + idx)
                }
            }
            Ipv4Protocol::Udp => {
                if layer_type == UdpRef::layer_id() {
                    Some(40)
                } else {
                    UdpRef::payload_byte_index_default(payload, layer_type).map(|idx| 40 + idx)
                }
            }
            Ipv4Protocol::Gre => {
                if layer_type == GreRef::layer_id() {
                    Some(40)
                } else {
                    None
                }
            }
            _ => {
                if layer_type == RawRef::layer_id() {
                    Some(40)
                } else {
                    None
                }
            }
        }
    }
}

impl Validate for Ipv6Ref<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        if curr_layer.len() < 40 {
            return Err(ValidationError {
                layer: Ipv6::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes in Ipv6 header (40 bytes required)",
            });
        }

        let declared = utils::read_u16(curr_layer, 4, utils::Endianness::Big).unwrap() as usize;
        if 40 + declared > curr_layer.len() {
            return Err(ValidationError {
                layer: Ipv6::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "payload length reported in Ipv6 header exceeded the available bytes",
            });
        }

        if curr_layer[0] >> 4 != 6 {
            return Err(ValidationError {
                layer: Ipv6::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "version number of Ipv6 header was not equal to 0x06",
            });
        }

        if 40 + declared < curr_layer.len() {
            return Err(ValidationError {
                layer: Ipv6::name(),
                class: ValidationErrorClass::ExcessBytes(curr_layer.len() - 40 - declared),
                reason: "extra bytes remain past the length reported in the Ipv6 header",
            });
        }

        Ok(())
    }

    fn validate_payload_default(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let ipv6 = Ipv6Ref::from_bytes_unchecked(curr_layer);
        let Some(payload) = ipv6.payload() else {
            return Err(ValidationError {
                layer: Ipv6::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "packet too short for Ipv6 frame--insufficient bytes for header",
            });
        };

        match curr_layer.get(6).map(|&b| Ipv4Protocol::from(b)) {
            Some(Ipv4Protocol::Tcp) => TcpRef::validate(payload),
            Some(Ipv4Protocol::Udp) => UdpRef::validate(payload),
            Some(Ipv4Protocol::Gre) => GreRef::validate(payload),
            _ => RawRef::validate(payload),
        }
    }
}

impl ToLayer for Ipv6Ref<'_> {
    type Owned = Ipv6;

    #[inline]
    fn to_layer(&self) -> Ipv6 {
        Ipv6::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_header() -> Ipv4 {
        Ipv4::new(
            Ipv4Address::from_octets([10, 0, 0, 1]),
            Ipv4Address::from_octets([10, 0, 0, 2]),
            64,
        )
    }

    #[test]
    fn header_checksum_is_computed_and_verified() {
        let mut ipv4 = base_header();
        ipv4.set_protocol(Some(Ipv4Protocol::Unknown(0xFD)));
        let bytes = ipv4.to_bytes().unwrap();
        let parsed = Ipv4Ref::from_bytes_unchecked(&bytes);
        assert!(parsed.is_header_checksum_correct());
        assert!(Ipv4Ref::validate(&bytes).is_ok());

        // Flipping any header byte falsifies the checksum.
        for i in 0..20 {
            let mut corrupted = bytes.clone();
            corrupted[i] ^= 0x04;
            let corrupted_ref = Ipv4Ref::from_bytes_unchecked(&corrupted);
            assert!(
                !corrupted_ref.is_header_checksum_correct(),
                "flip of byte {i} went undetected"
            );
        }
    }

    #[test]
    fn fragmentation_requires_eight_byte_alignment() {
        assert!(Ipv4Fragmentation::new(false, true, 24).is_ok());
        assert!(Ipv4Fragmentation::new(false, true, 20).is_err());

        let frag = Ipv4Fragmentation::new(true, false, 64).unwrap();
        assert_eq!(frag.byte_offset(), 64);
        assert!(frag.dont_fragment());
        assert!(!frag.more_fragments());
        assert_eq!(Ipv4Fragmentation::from_raw(frag.raw()), frag);
    }

    #[test]
    fn options_round_trip_with_padding() {
        let options = Ipv4Options::new(vec![Ipv4Option::StreamIdentifier(77), Ipv4Option::Nop]);
        // 5 bytes of options are normalized with an Eool and padded to 8.
        assert_eq!(options.byte_len(), 8);

        let mut bytes = Vec::new();
        options.to_bytes_extended(&mut bytes);
        assert_eq!(bytes.len(), 8);

        let parsed = Ipv4OptionsRef::from_bytes_unchecked(&bytes);
        assert!(parsed.is_valid());
        assert_eq!(parsed.to_options(), options);
    }

    #[test]
    fn repeated_at_most_once_option_invalidates_list() {
        let mut bytes = Vec::new();
        Ipv4Option::StreamIdentifier(1).to_bytes_extended(&mut bytes);
        Ipv4Option::StreamIdentifier(2).to_bytes_extended(&mut bytes);
        let parsed = Ipv4OptionsRef::from_bytes_unchecked(&bytes);
        assert!(!parsed.is_valid());
        assert_eq!(parsed.to_options(), Ipv4Options::none());
    }

    #[test]
    fn truncated_option_length_invalidates_only_options() {
        let mut ipv4 = base_header();
        ipv4.set_protocol(Some(Ipv4Protocol::Unknown(0xFD)));
        ipv4.set_options(Ipv4Options::new(vec![Ipv4Option::RouterAlert(0)]));
        let mut bytes = ipv4.to_bytes().unwrap();

        // Shrink the router-alert option's declared length below its
        // minimum, then fix up the header checksum so only the options
        // parse is at fault.
        bytes[21] = 1;
        bytes[10] = 0;
        bytes[11] = 0;
        let ihl = (bytes[0] & 0x0F) as usize * 4;
        let chksum = !utils::ones_complement_16bit(&bytes[..ihl]);
        bytes[10..12].copy_from_slice(&chksum.to_be_bytes());

        let parsed = Ipv4Ref::from_bytes_unchecked(&bytes);
        assert!(!parsed.options().is_valid());
        assert!(Ipv4Ref::validate(&bytes).is_err());
        // Fixed header fields stay readable.
        assert_eq!(parsed.ttl(), 64);
        assert_eq!(parsed.saddr().to_string(), "10.0.0.1");
    }

    #[test]
    fn unknown_protocol_payload_validates_vacuously() {
        let mut ipv4 = base_header();
        ipv4.set_protocol(Some(Ipv4Protocol::Unknown(0xAB)));
        ipv4.set_payload_unchecked(Box::new(Raw::new(vec![1, 2, 3, 4, 5])));
        let bytes = ipv4.to_bytes().unwrap();
        assert!(Ipv4Ref::validate(&bytes).is_ok());
    }

    #[test]
    fn ipv6_fixed_header_round_trip() {
        let mut ipv6 = Ipv6::new(Ipv6Address([0x20; 16]), Ipv6Address([0x10; 16]), 64);
        ipv6.set_flow_label(0xBEEF);
        ipv6.set_next_header(Some(Ipv4Protocol::Unknown(59)));
        let bytes = ipv6.to_bytes().unwrap();
        assert_eq!(bytes.len(), 40);
        assert!(Ipv6Ref::validate(&bytes).is_ok());

        let parsed = Ipv6Ref::from_bytes_unchecked(&bytes);
        assert_eq!(parsed.version(), 6);
        assert_eq!(parsed.flow_label(), 0xBEEF);
        assert_eq!(parsed.hop_limit(), 64);
        assert_eq!(parsed.to_layer(), ipv6);
    }
}
