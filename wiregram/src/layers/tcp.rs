// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Transmission Control Protocol (TCP) and its options sublanguage.
//!
//! ## Packet Layout
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |          Source Port          |        Destination Port       |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |                        Sequence Number                        |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  8 |                     Acknowledgement Number                    |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 12 | Offset| Res |N|C|E|U|A|P|R|S|F|          Window Size          |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 16 |            Checksum           |         Urgent Pointer        |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 20 Z                            Options                            Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ?? Z                            Payload                            Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bitflags::bitflags;
use wiregram_common::Buffer;

use crate::error::*;
use crate::layers::http::{Http, HttpRef};
use crate::layers::ip::{Ipv4, Ipv4Protocol, Ipv6, DATA_PROTO_TCP};
use crate::layers::{Raw, RawRef};
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

const HTTP_PORT: u16 = 80;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TcpFlags: u16 {
        const NS = 0b_0000_0001_0000_0000;
        const CWR = 0b_0000_0000_1000_0000;
        const ECE = 0b_0000_0000_0100_0000;
        const URG = 0b_0000_0000_0010_0000;
        const ACK = 0b_0000_0000_0001_0000;
        const PSH = 0b_0000_0000_0000_1000;
        const RST = 0b_0000_0000_0000_0100;
        const SYN = 0b_0000_0000_0000_0010;
        const FIN = 0b_0000_0000_0000_0001;
    }
}

impl TcpFlags {
    #[inline]
    pub fn new() -> Self {
        TcpFlags::default()
    }
}

impl From<u16> for TcpFlags {
    #[inline]
    fn from(value: u16) -> Self {
        TcpFlags::from_bits_truncate(value)
    }
}

/// A TCP segment.
#[derive(Clone, Debug)]
pub struct Tcp {
    sport: u16,
    dport: u16,
    seq: u32,
    ack: u32,
    flags: TcpFlags,
    window: u16,
    chksum: Option<u16>,
    urgent_ptr: u16,
    options: TcpOptions,
    payload: Option<Box<dyn LayerObject>>,
}

impl Tcp {
    /// Creates a segment between the given ports; every other field keeps
    /// its default and the checksum is computed at build time.
    pub fn new(sport: u16, dport: u16) -> Self {
        Tcp {
            sport,
            dport,
            seq: 0,
            ack: 0,
            flags: TcpFlags::new(),
            window: 0,
            chksum: None,
            urgent_ptr: 0,
            options: TcpOptions::default(),
            payload: None,
        }
    }

    /// The source port of the TCP segment.
    #[inline]
    pub fn sport(&self) -> u16 {
        self.sport
    }

    #[inline]
    pub fn set_sport(&mut self, sport: u16) {
        self.sport = sport;
    }

    /// The destination port of the TCP segment.
    #[inline]
    pub fn dport(&self) -> u16 {
        self.dport
    }

    #[inline]
    pub fn set_dport(&mut self, dport: u16) {
        self.dport = dport;
    }

    /// The sequence number of the TCP segment.
    #[inline]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    #[inline]
    pub fn set_seq(&mut self, seq: u32) {
        self.seq = seq;
    }

    /// The acknowledgement number of the TCP segment.
    #[inline]
    pub fn ack(&self) -> u32 {
        self.ack
    }

    #[inline]
    pub fn set_ack(&mut self, ack: u32) {
        self.ack = ack;
    }

    /// The flags of the TCP segment.
    #[inline]
    pub fn flags(&self) -> TcpFlags {
        self.flags
    }

    #[inline]
    pub fn set_flags(&mut self, flags: TcpFlags) {
        self.flags = flags;
    }

    /// The receive window advertised by the TCP segment.
    #[inline]
    pub fn window(&self) -> u16 {
        self.window
    }

    #[inline]
    pub fn set_window(&mut self, window: u16) {
        self.window = window;
    }

    /// The checksum explicitly assigned to the segment, or `None` if it is
    /// computed over the pseudo-header and payload at serialization time.
    #[inline]
    pub fn chksum(&self) -> Option<u16> {
        self.chksum
    }

    #[inline]
    pub fn set_chksum(&mut self, chksum: Option<u16>) {
        self.chksum = chksum;
    }

    /// A pointer to the offset of data considered urgent within the
    /// segment.
    #[inline]
    pub fn urgent_ptr(&self) -> u16 {
        self.urgent_ptr
    }

    #[inline]
    pub fn set_urgent_ptr(&mut self, urgent_ptr: u16) {
        self.urgent_ptr = urgent_ptr;
    }

    /// The optional parameters, or TCP options, of the segment.
    #[inline]
    pub fn options(&self) -> &TcpOptions {
        &self.options
    }

    #[inline]
    pub fn set_options(&mut self, options: TcpOptions) {
        self.options = options;
    }

    /// Indicates the first byte of the data payload of the segment, in
    /// 4-byte words.
    #[inline]
    pub fn data_offset(&self) -> usize {
        5 + self.options.byte_len() / 4
    }
}

layer_identity!(Tcp, TcpRef, "Tcp");

impl PartialEq for Tcp {
    fn eq(&self, other: &Self) -> bool {
        self.sport == other.sport
            && self.dport == other.dport
            && self.seq == other.seq
            && self.ack == other.ack
            && self.flags == other.flags
            && self.window == other.window
            && self.chksum == other.chksum
            && self.urgent_ptr == other.urgent_ptr
            && self.options == other.options
            && match (&self.payload, &other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => a.compare(b.as_ref()),
                _ => false,
            }
    }
}

impl LayerLength for Tcp {
    #[inline]
    fn len(&self) -> usize {
        self.data_offset() * 4 + self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl LayerObject for Tcp {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn ip_payload_protocol(&self) -> Option<Ipv4Protocol> {
        Some(Ipv4Protocol::Tcp)
    }

    #[inline]
    fn can_add_payload_default(&self, _payload: &dyn LayerObject) -> bool {
        true // any application protocol may be served over TCP
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

impl Layer for Tcp {}

impl ToBytes for Tcp {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();
        let options_len = self.options.byte_len();
        if options_len > MAX_TCP_OPTIONS_LEN {
            return Err(SerializationError::length_encoding(Tcp::name()));
        }

        bytes.extend(self.sport.to_be_bytes());
        bytes.extend(self.dport.to_be_bytes());
        bytes.extend(self.seq.to_be_bytes());
        bytes.extend(self.ack.to_be_bytes());
        bytes.push(((self.data_offset() as u8) << 4) | ((self.flags.bits() >> 8) as u8));
        bytes.push((self.flags.bits() & 0x00FF) as u8);
        bytes.extend(self.window.to_be_bytes());
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        bytes.extend(self.urgent_ptr.to_be_bytes());
        self.options.to_bytes_extended(bytes);
        match self.payload.as_ref() {
            None => (),
            Some(p) => p.to_bytes_checksummed(bytes, Some((Self::layer_id(), start)))?,
        }

        if self.chksum.is_none() {
            let Some((id, prev_idx)) = prev else {
                return Err(SerializationError::bad_upper_layer(Tcp::name()));
            };

            let new_chksum = if id == Ipv4::layer_id() {
                let mut data_chksum = utils::ones_complement_16bit(&bytes[start..]);
                let addr_chksum =
                    utils::ones_complement_16bit(&bytes[prev_idx + 12..prev_idx + 20]);
                data_chksum = utils::ones_complement_add(data_chksum, addr_chksum);
                data_chksum = utils::ones_complement_add(data_chksum, DATA_PROTO_TCP as u16);
                let upper_layer_len = (bytes.len() - start) as u16;
                utils::ones_complement_add(data_chksum, upper_layer_len)
            } else if id == Ipv6::layer_id() {
                let mut data_chksum = utils::ones_complement_16bit(&bytes[start..]);
                let addr_chksum =
                    utils::ones_complement_16bit(&bytes[prev_idx + 8..prev_idx + 40]);
                data_chksum = utils::ones_complement_add(data_chksum, addr_chksum);
                let upper_layer_len = (bytes.len() - start) as u32;
                data_chksum =
                    utils::ones_complement_add(data_chksum, (upper_layer_len >> 16) as u16);
                data_chksum =
                    utils::ones_complement_add(data_chksum, (upper_layer_len & 0xFFFF) as u16);
                utils::ones_complement_add(data_chksum, DATA_PROTO_TCP as u16)
            } else {
                // No IPv4/IPv6 pseudo-header to reach back into; the
                // checksum field stays zero.
                return Ok(());
            };

            bytes[start + 16..start + 18].copy_from_slice(&(!new_chksum).to_be_bytes());
        }

        Ok(())
    }
}

impl FromBytesCurrent for Tcp {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let tcp = TcpRef::from_bytes_unchecked(bytes);
        Tcp {
            sport: tcp.sport(),
            dport: tcp.dport(),
            seq: tcp.seq(),
            ack: tcp.ack(),
            flags: tcp.flags(),
            window: tcp.window(),
            chksum: None,
            urgent_ptr: tcp.urgent_ptr(),
            options: tcp.options().to_options(),
            payload: None,
        }
    }

    fn payload_from_bytes_unchecked_default(&mut self, bytes: &[u8]) {
        let tcp = TcpRef::from_bytes_unchecked(bytes);
        let payload = tcp.payload().unwrap_or(&[]);
        if payload.is_empty() {
            self.payload = None;
        } else if self.sport == HTTP_PORT || self.dport == HTTP_PORT {
            self.payload = Some(Box::new(Http::from_bytes_unchecked(payload)));
        } else {
            self.payload = Some(Box::new(Raw::from_bytes_unchecked(payload)));
        }
    }
}

/// A view of a TCP segment.
#[derive(Clone, Copy, Debug)]
pub struct TcpRef<'a> {
    data: &'a [u8],
}

impl<'a> TcpRef<'a> {
    /// The source port of the TCP segment.
    #[inline]
    pub fn sport(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 0)
                .expect("insufficient bytes in Tcp layer to retrieve Source Port field"),
        )
    }

    /// The destination port of the TCP segment.
    #[inline]
    pub fn dport(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 2)
                .expect("insufficient bytes in Tcp layer to retrieve Destination Port field"),
        )
    }

    /// The sequence number of the TCP segment.
    #[inline]
    pub fn seq(&self) -> u32 {
        u32::from_be_bytes(
            utils::to_array(self.data, 4)
                .expect("insufficient bytes in Tcp layer to retrieve Sequence Number field"),
        )
    }

    /// The acknowledgement number of the TCP segment.
    #[inline]
    pub fn ack(&self) -> u32 {
        u32::from_be_bytes(
            utils::to_array(self.data, 8)
                .expect("insufficient bytes in Tcp layer to retrieve Acknowledgement field"),
        )
    }

    /// Indicates the first byte of the data payload of the segment, in
    /// 4-byte words.
    #[inline]
    pub fn data_offset(&self) -> usize {
        (self
            .data
            .get(12)
            .expect("insufficient bytes in Tcp layer to retrieve Data Offset field")
            >> 4) as usize
    }

    /// The flags of the TCP segment.
    #[inline]
    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from(u16::from_be_bytes(
            utils::to_array(self.data, 12)
                .expect("insufficient bytes in Tcp layer to retrieve Flags field"),
        ))
    }

    /// The receive window advertised by the TCP segment.
    #[inline]
    pub fn window(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 14)
                .expect("insufficient bytes in Tcp layer to retrieve Window Size field"),
        )
    }

    /// The checksum of the segment, calculated over the pseudo-header,
    /// TCP header and payload.
    #[inline]
    pub fn chksum(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 16)
                .expect("insufficient bytes in Tcp layer to retrieve Checksum field"),
        )
    }

    /// A pointer to the offset of data considered urgent within the
    /// segment.
    #[inline]
    pub fn urgent_ptr(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 18)
                .expect("insufficient bytes in Tcp layer to retrieve Urgent Pointer field"),
        )
    }

    /// The optional parameters, or TCP options, of the segment, clamped to
    /// the available bytes.
    #[inline]
    pub fn options(&self) -> TcpOptionsRef<'a> {
        let end = core::cmp::max(self.data_offset(), 5) * 4;
        let end = core::cmp::min(end, self.data.len());
        let start = core::cmp::min(20, end);
        TcpOptionsRef::from_bytes_unchecked(&self.data[start..end])
    }

    /// The payload bytes after the header, or `None` if the segment is
    /// truncated before the end of its declared header.
    #[inline]
    pub fn payload(&self) -> Option<&'a [u8]> {
        let offset = core::cmp::max((*self.data.get(12)? >> 4) as usize, 5) * 4;
        self.data.get(offset..)
    }

    /// A view of the segment's HTTP payload, when a port declares one.
    #[inline]
    pub fn http(&self) -> Option<HttpRef<'a>> {
        self.get_layer::<HttpRef>()
    }
}

impl<'a> FromBytesRef<'a> for TcpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        TcpRef { data: bytes }
    }
}

impl LayerOffset for TcpRef<'_> {
    fn payload_byte_index_default(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        let offset = core::cmp::max((*bytes.get(12)? >> 4) as usize, 5) * 4;
        if offset > bytes.len() {
            return None;
        }

        let sport = utils::read_u16(bytes, 0, utils::Endianness::Big)?;
        let dport = utils::read_u16(bytes, 2, utils::Endianness::Big)?;
        if layer_type == HttpRef::layer_id() && (sport == HTTP_PORT || dport == HTTP_PORT) {
            Some(offset)
        } else if layer_type == RawRef::layer_id() {
            Some(offset)
        } else {
            None
        }
    }
}

impl Validate for TcpRef<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let header_len = match curr_layer.get(12) {
            None => {
                return Err(ValidationError {
                    layer: Tcp::name(),
                    class: ValidationErrorClass::InsufficientBytes,
                    reason: "packet too short for Tcp frame--missing Data Offset byte",
                })
            }
            Some(l) => (l >> 4) as usize * 4,
        };

        if curr_layer.len() < header_len || curr_layer.len() < 20 {
            return Err(ValidationError {
                layer: Tcp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes for Tcp segment header",
            });
        }

        if header_len < 20 {
            return Err(ValidationError {
                layer: Tcp::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "invalid Tcp header length value (Data Offset must be a value of 5 or more)",
            });
        }

        if !TcpOptionsRef::from_bytes_unchecked(&curr_layer[20..header_len]).is_valid() {
            return Err(ValidationError {
                layer: Tcp::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "malformed entry in Tcp options",
            });
        }

        Ok(())
    }

    #[inline]
    fn validate_payload_default(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        // The payload after TCP is opaque at this level; transport
        // checksum validation happens under the enclosing IP layer, where
        // the pseudo-header is available.
        Ok(())
    }
}

impl ToLayer for TcpRef<'_> {
    type Owned = Tcp;

    #[inline]
    fn to_layer(&self) -> Tcp {
        Tcp::from_bytes_unchecked(self.data)
    }
}

// =============================================================================
//                                 TCP Options
// =============================================================================

pub const MAX_TCP_OPTIONS_LEN: usize = 40;

pub const TCP_OPT_KIND_EOOL: u8 = 0;
pub const TCP_OPT_KIND_NOP: u8 = 1;
pub const TCP_OPT_KIND_MSS: u8 = 2;
pub const TCP_OPT_KIND_WSCALE: u8 = 3;
pub const TCP_OPT_KIND_SACK_PERMITTED: u8 = 4;
pub const TCP_OPT_KIND_SACK: u8 = 5;
pub const TCP_OPT_KIND_ECHO: u8 = 6;
pub const TCP_OPT_KIND_ECHO_REPLY: u8 = 7;
pub const TCP_OPT_KIND_TIMESTAMP: u8 = 8;
pub const TCP_OPT_KIND_POC_PERMITTED: u8 = 9;
pub const TCP_OPT_KIND_POC_SERVICE_PROFILE: u8 = 10;
pub const TCP_OPT_KIND_CC: u8 = 11;
pub const TCP_OPT_KIND_CC_NEW: u8 = 12;
pub const TCP_OPT_KIND_CC_ECHO: u8 = 13;
pub const TCP_OPT_KIND_ALT_CHECKSUM_REQUEST: u8 = 14;
pub const TCP_OPT_KIND_ALT_CHECKSUM_DATA: u8 = 15;
pub const TCP_OPT_KIND_MD5_SIGNATURE: u8 = 19;
pub const TCP_OPT_KIND_MOOD: u8 = 25;

/// A single option of a TCP header.
///
/// `Eool` and `Nop` are one-byte options with no length octet; every other
/// variant carries a length octet and may appear at most once in a valid
/// options list.
#[derive(Clone, Debug, PartialEq)]
pub enum TcpOption {
    /// End of Options List; any leftover bytes are padding.
    Eool,
    /// No operation; aligns subsequent options.
    Nop,
    /// Maximum Segment Size (RFC 793).
    Mss(u16),
    /// Window scale shift count (RFC 7323).
    WindowScale(u8),
    /// Selective Acknowledgement permitted (RFC 2018); SYN-only.
    SackPermitted,
    /// Selective Acknowledgement blocks (RFC 2018): (begin, end) sequence
    /// number pairs.
    Sack(Vec<(u32, u32)>),
    /// Echo (obsoleted by Timestamp; RFC 1072).
    Echo(u32),
    /// Echo reply (obsoleted by Timestamp; RFC 1072).
    EchoReply(u32),
    /// Timestamp and previous-timestamp echo (RFC 7323).
    Timestamp { ts: u32, prev_ts: u32 },
    /// Partial Order Connection permitted (RFC 1693).
    PartialOrderConnectionPermitted,
    /// Partial Order Connection service profile (RFC 1693).
    PartialOrderServiceProfile { start: bool, end: bool },
    /// Connection Count (RFC 1644).
    ConnectionCount(u32),
    /// Connection Count New (RFC 1644).
    ConnectionCountNew(u32),
    /// Connection Count Echo (RFC 1644).
    ConnectionCountEcho(u32),
    /// Alternate checksum request (RFC 1146).
    AlternateChecksumRequest(u8),
    /// Alternate checksum data (RFC 1146).
    AlternateChecksumData(Vec<u8>),
    /// MD5 signature (RFC 2385).
    Md5Signature([u8; 16]),
    /// The sender's current mood (RFC 5841).
    Mood(TcpOptionMood),
    /// A structurally sound option of an unrecognized kind.
    Unknown(TcpOptionUnknown),
}

/// The emotional state a TCP segment was sent in (RFC 5841).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TcpOptionMood {
    Happy,
    Sad,
    Amused,
    Confused,
    Bored,
    Surprised,
    Silly,
    Frustrated,
    Angry,
    Apathetic,
    Sneaky,
    Evil,
}

impl TcpOptionMood {
    /// The ASCII emoticon carried on the wire.
    pub fn emoticon(self) -> &'static [u8] {
        match self {
            TcpOptionMood::Happy => b":)",
            TcpOptionMood::Sad => b":(",
            TcpOptionMood::Amused => b":D",
            TcpOptionMood::Confused => b"%(",
            TcpOptionMood::Bored => b":|",
            TcpOptionMood::Surprised => b":O",
            TcpOptionMood::Silly => b":P",
            TcpOptionMood::Frustrated => b":<",
            TcpOptionMood::Angry => b">:@",
            TcpOptionMood::Apathetic => b"(_!_)",
            TcpOptionMood::Sneaky => b":->",
            TcpOptionMood::Evil => b">:)",
        }
    }

    fn from_emoticon(emoticon: &[u8]) -> Option<Self> {
        const MOODS: [TcpOptionMood; 12] = [
            TcpOptionMood::Happy,
            TcpOptionMood::Sad,
            TcpOptionMood::Amused,
            TcpOptionMood::Confused,
            TcpOptionMood::Bored,
            TcpOptionMood::Surprised,
            TcpOptionMood::Silly,
            TcpOptionMood::Frustrated,
            TcpOptionMood::Angry,
            TcpOptionMood::Apathetic,
            TcpOptionMood::Sneaky,
            TcpOptionMood::Evil,
        ];
        MOODS.into_iter().find(|mood| mood.emoticon() == emoticon)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TcpOptionUnknown {
    pub kind: u8,
    pub value: Buffer<u8, 38>, // 40 bytes maximum in options, minus 2 for kind and length
}

impl TcpOption {
    /// The wire kind byte of the option.
    pub fn kind(&self) -> u8 {
        match self {
            TcpOption::Eool => TCP_OPT_KIND_EOOL,
            TcpOption::Nop => TCP_OPT_KIND_NOP,
            TcpOption::Mss(_) => TCP_OPT_KIND_MSS,
            TcpOption::WindowScale(_) => TCP_OPT_KIND_WSCALE,
            TcpOption::SackPermitted => TCP_OPT_KIND_SACK_PERMITTED,
            TcpOption::Sack(_) => TCP_OPT_KIND_SACK,
            TcpOption::Echo(_) => TCP_OPT_KIND_ECHO,
            TcpOption::EchoReply(_) => TCP_OPT_KIND_ECHO_REPLY,
            TcpOption::Timestamp { .. } => TCP_OPT_KIND_TIMESTAMP,
            TcpOption::PartialOrderConnectionPermitted => TCP_OPT_KIND_POC_PERMITTED,
            TcpOption::PartialOrderServiceProfile { .. } => TCP_OPT_KIND_POC_SERVICE_PROFILE,
            TcpOption::ConnectionCount(_) => TCP_OPT_KIND_CC,
            TcpOption::ConnectionCountNew(_) => TCP_OPT_KIND_CC_NEW,
            TcpOption::ConnectionCountEcho(_) => TCP_OPT_KIND_CC_ECHO,
            TcpOption::AlternateChecksumRequest(_) => TCP_OPT_KIND_ALT_CHECKSUM_REQUEST,
            TcpOption::AlternateChecksumData(_) => TCP_OPT_KIND_ALT_CHECKSUM_DATA,
            TcpOption::Md5Signature(_) => TCP_OPT_KIND_MD5_SIGNATURE,
            TcpOption::Mood(_) => TCP_OPT_KIND_MOOD,
            TcpOption::Unknown(unknown) => unknown.kind,
        }
    }

    /// Whether this option is a one-byte option with no length octet.
    #[inline]
    pub fn is_simple(&self) -> bool {
        matches!(self, TcpOption::Eool | TcpOption::Nop)
    }

    /// Whether a valid options list permits at most one occurrence of this
    /// option's kind.
    #[inline]
    pub fn appears_at_most_once(&self) -> bool {
        !self.is_simple()
    }

    /// The encoded length of the option in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            TcpOption::Eool | TcpOption::Nop => 1,
            TcpOption::SackPermitted | TcpOption::PartialOrderConnectionPermitted => 2,
            TcpOption::WindowScale(_)
            | TcpOption::PartialOrderServiceProfile { .. }
            | TcpOption::AlternateChecksumRequest(_) => 3,
            TcpOption::Mss(_) => 4,
            TcpOption::Sack(blocks) => 2 + 8 * blocks.len(),
            TcpOption::Echo(_)
            | TcpOption::EchoReply(_)
            | TcpOption::ConnectionCount(_)
            | TcpOption::ConnectionCountNew(_)
            | TcpOption::ConnectionCountEcho(_) => 6,
            TcpOption::Timestamp { .. } => 10,
            TcpOption::AlternateChecksumData(data) => 2 + data.len(),
            TcpOption::Md5Signature(_) => 18,
            TcpOption::Mood(mood) => 2 + mood.emoticon().len(),
            TcpOption::Unknown(unknown) => 2 + unknown.value.len(),
        }
    }

    /// Decodes one option at the front of `bytes`, returning the option
    /// and the number of bytes it consumed. `None` marks a structurally
    /// malformed entry, which invalidates the whole options list.
    pub fn read(bytes: &[u8]) -> Option<(TcpOption, usize)> {
        let &kind = bytes.first()?;
        match kind {
            TCP_OPT_KIND_EOOL => return Some((TcpOption::Eool, 1)),
            TCP_OPT_KIND_NOP => return Some((TcpOption::Nop, 1)),
            _ => (),
        }

        let &length = bytes.get(1)?;
        if length < 2 {
            return None;
        }
        let value = bytes.get(2..length as usize)?;

        let option = match kind {
            TCP_OPT_KIND_MSS => {
                if value.len() != 2 {
                    return None;
                }
                TcpOption::Mss(u16::from_be_bytes(value.try_into().unwrap()))
            }
            TCP_OPT_KIND_WSCALE => {
                if value.len() != 1 {
                    return None;
                }
                TcpOption::WindowScale(value[0])
            }
            TCP_OPT_KIND_SACK_PERMITTED => {
                if !value.is_empty() {
                    return None;
                }
                TcpOption::SackPermitted
            }
            TCP_OPT_KIND_SACK => {
                if value.is_empty() || value.len() % 8 != 0 || value.len() > 32 {
                    return None;
                }
                let blocks = value
                    .chunks_exact(8)
                    .map(|c| {
                        (
                            u32::from_be_bytes(c[..4].try_into().unwrap()),
                            u32::from_be_bytes(c[4..].try_into().unwrap()),
                        )
                    })
                    .collect();
                TcpOption::Sack(blocks)
            }
            TCP_OPT_KIND_ECHO | TCP_OPT_KIND_ECHO_REPLY | TCP_OPT_KIND_CC | TCP_OPT_KIND_CC_NEW
            | TCP_OPT_KIND_CC_ECHO => {
                if value.len() != 4 {
                    return None;
                }
                let word = u32::from_be_bytes(value.try_into().unwrap());
                match kind {
                    TCP_OPT_KIND_ECHO => TcpOption::Echo(word),
                    TCP_OPT_KIND_ECHO_REPLY => TcpOption::EchoReply(word),
                    TCP_OPT_KIND_CC => TcpOption::ConnectionCount(word),
                    TCP_OPT_KIND_CC_NEW => TcpOption::ConnectionCountNew(word),
                    _ => TcpOption::ConnectionCountEcho(word),
                }
            }
            TCP_OPT_KIND_TIMESTAMP => {
                if value.len() != 8 {
                    return None;
                }
                TcpOption::Timestamp {
                    ts: u32::from_be_bytes(value[..4].try_into().unwrap()),
                    prev_ts: u32::from_be_bytes(value[4..].try_into().unwrap()),
                }
            }
            TCP_OPT_KIND_POC_PERMITTED => {
                if !value.is_empty() {
                    return None;
                }
                TcpOption::PartialOrderConnectionPermitted
            }
            TCP_OPT_KIND_POC_SERVICE_PROFILE => {
                if value.len() != 1 {
                    return None;
                }
                TcpOption::PartialOrderServiceProfile {
                    start: value[0] & 0x80 > 0,
                    end: value[0] & 0x40 > 0,
                }
            }
            TCP_OPT_KIND_ALT_CHECKSUM_REQUEST => {
                if value.len() != 1 {
                    return None;
                }
                TcpOption::AlternateChecksumRequest(value[0])
            }
            TCP_OPT_KIND_ALT_CHECKSUM_DATA => TcpOption::AlternateChecksumData(value.into()),
            TCP_OPT_KIND_MD5_SIGNATURE => {
                if value.len() != 16 {
                    return None;
                }
                TcpOption::Md5Signature(value.try_into().unwrap())
            }
            TCP_OPT_KIND_MOOD => match TcpOptionMood::from_emoticon(value) {
                Some(mood) => TcpOption::Mood(mood),
                None => return None,
            },
            _ => {
                if value.len() > 38 {
                    return None;
                }
                TcpOption::Unknown(TcpOptionUnknown {
                    kind,
                    value: Buffer::from_slice(value),
                })
            }
        };

        Some((option, length as usize))
    }

    /// Appends the encoded form of the option.
    pub fn to_bytes_extended(&self, bytes: &mut Vec<u8>) {
        bytes.push(self.kind());
        if self.is_simple() {
            return;
        }
        bytes.push(self.byte_len() as u8);

        match self {
            TcpOption::Mss(mss) => bytes.extend(mss.to_be_bytes()),
            TcpOption::WindowScale(shift) => bytes.push(*shift),
            TcpOption::SackPermitted | TcpOption::PartialOrderConnectionPermitted => (),
            TcpOption::Sack(blocks) => {
                for (begin, end) in blocks {
                    bytes.extend(begin.to_be_bytes());
                    bytes.extend(end.to_be_bytes());
                }
            }
            TcpOption::Echo(word)
            | TcpOption::EchoReply(word)
            | TcpOption::ConnectionCount(word)
            | TcpOption::ConnectionCountNew(word)
            | TcpOption::ConnectionCountEcho(word) => bytes.extend(word.to_be_bytes()),
            TcpOption::Timestamp { ts, prev_ts } => {
                bytes.extend(ts.to_be_bytes());
                bytes.extend(prev_ts.to_be_bytes());
            }
            TcpOption::PartialOrderServiceProfile { start, end } => {
                bytes.push(((*start as u8) << 7) | ((*end as u8) << 6))
            }
            TcpOption::AlternateChecksumRequest(alg) => bytes.push(*alg),
            TcpOption::AlternateChecksumData(data) => bytes.extend(data),
            TcpOption::Md5Signature(digest) => bytes.extend(digest),
            TcpOption::Mood(mood) => bytes.extend(mood.emoticon()),
            TcpOption::Unknown(unknown) => bytes.extend(unknown.value.as_slice()),
            TcpOption::Eool | TcpOption::Nop => unreachable!(),
        }
    }
}

/// The ordered options list of a TCP header.
///
/// The list is normalized at construction: when the encoded options do not
/// end on a 4-byte boundary, an `Eool` terminator is appended (the
/// remaining padding is written as zero bytes and not part of the list).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TcpOptions {
    options: Vec<TcpOption>,
}

impl TcpOptions {
    /// An empty options list.
    pub const fn none() -> Self {
        TcpOptions {
            options: Vec::new(),
        }
    }

    /// Builds a normalized options list.
    pub fn new(mut options: Vec<TcpOption>) -> Self {
        let unpadded: usize = options.iter().map(TcpOption::byte_len).sum();
        let ends_with_eool = matches!(options.last(), Some(TcpOption::Eool));
        if unpadded % 4 != 0 && !ends_with_eool {
            options.push(TcpOption::Eool);
        }
        TcpOptions { options }
    }

    #[inline]
    pub fn options(&self) -> &[TcpOption] {
        &self.options
    }

    /// The number of bytes the encoded options occupy, padding included.
    #[inline]
    pub fn byte_len(&self) -> usize {
        let unpadded: usize = self.options.iter().map(TcpOption::byte_len).sum();
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

/// A view of the options region of a TCP header.
#[derive(Clone, Copy, Debug)]
pub struct TcpOptionsRef<'a> {
    bytes: &'a [u8],
}

impl<'a> TcpOptionsRef<'a> {
    #[inline]
    pub fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        TcpOptionsRef { bytes }
    }

    #[inline]
    pub fn iter(&self) -> TcpOptionsIterRef<'a> {
        TcpOptionsIterRef {
            bytes: self.bytes,
            end_reached: false,
        }
    }

    /// Decodes the whole region. `None` marks a structurally malformed
    /// entry or a repeated at-most-once option, either of which
    /// invalidates the list as a whole.
    pub fn to_options_checked(&self) -> Option<TcpOptions> {
        let mut options = Vec::new();
        let mut iter = self.iter();
        for option in &mut iter {
            let option = option?;
            if option.appears_at_most_once()
                && options.iter().any(|o: &TcpOption| o.kind() == option.kind())
            {
                return None;
            }
            options.push(option);
        }
        Some(TcpOptions { options })
    }

    /// Decodes the whole region, yielding an empty list when it is
    /// invalid.
    #[inline]
    pub fn to_options(&self) -> TcpOptions {
        self.to_options_checked().unwrap_or_default()
    }

    /// Whether the options region parses cleanly: no malformed entry and
    /// no repeated at-most-once option.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.to_options_checked().is_some()
    }
}

/// Iterates the options of a [`TcpOptionsRef`], yielding `None` items for
/// malformed entries.
pub struct TcpOptionsIterRef<'a> {
    bytes: &'a [u8],
    end_reached: bool,
}

impl Iterator for TcpOptionsIterRef<'_> {
    type Item = Option<TcpOption>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end_reached || self.bytes.is_empty() {
            return None;
        }

        match TcpOption::read(self.bytes) {
            None => {
                self.end_reached = true;
                Some(None)
            }
            Some((option, consumed)) => {
                self.bytes = &self.bytes[consumed..];
                if matches!(option, TcpOption::Eool) {
                    self.end_reached = true;
                }
                Some(Some(option))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syn_options_round_trip() {
        let options = TcpOptions::new(vec![
            TcpOption::Mss(1460),
            TcpOption::Nop,
            TcpOption::Nop,
            TcpOption::SackPermitted,
        ]);
        assert_eq!(options.byte_len(), 8);

        let mut bytes = Vec::new();
        options.to_bytes_extended(&mut bytes);
        assert_eq!(bytes, [2, 4, 0x05, 0xB4, 1, 1, 4, 2]);

        let parsed = TcpOptionsRef::from_bytes_unchecked(&bytes);
        assert!(parsed.is_valid());
        assert_eq!(parsed.to_options(), options);
    }

    #[test]
    fn mood_option_round_trips() {
        let options = TcpOptions::new(vec![TcpOption::Mood(TcpOptionMood::Evil)]);
        let mut bytes = Vec::new();
        options.to_bytes_extended(&mut bytes);

        let parsed = TcpOptionsRef::from_bytes_unchecked(&bytes).to_options();
        assert_eq!(parsed, options);
    }

    #[test]
    fn truncated_option_invalidates_list() {
        // MSS claims 4 bytes but only 3 are present.
        let bytes = [2u8, 4, 0x05];
        assert!(!TcpOptionsRef::from_bytes_unchecked(&bytes).is_valid());
    }

    #[test]
    fn repeated_option_invalidates_list() {
        let mut bytes = Vec::new();
        TcpOption::WindowScale(2).to_bytes_extended(&mut bytes);
        TcpOption::WindowScale(3).to_bytes_extended(&mut bytes);
        bytes.extend([0, 0]);
        assert!(!TcpOptionsRef::from_bytes_unchecked(&bytes).is_valid());
    }

    #[test]
    fn checksum_requires_enclosing_ip_layer() {
        let tcp = Tcp::new(1234, 80);
        // A bare TCP layer cannot compute its pseudo-header checksum.
        assert!(tcp.to_bytes().is_err());

        let mut pinned = Tcp::new(1234, 80);
        pinned.set_chksum(Some(0xABCD));
        let bytes = pinned.to_bytes().unwrap();
        assert_eq!(&bytes[16..18], &[0xAB, 0xCD]);
    }
}
