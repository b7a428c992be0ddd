// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Internet Control Message Protocol (ICMP), RFC 792.
//!
//! ## Packet Layout
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |      Type     |      Code     |            Checksum           |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |                         Rest of Header                        |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  8 Z                            Payload                            Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The checksum covers the whole ICMP message; no pseudo-header is
//! involved. For error messages such as destination-unreachable, the
//! payload carries the offending datagram's IP header plus its first 8
//! payload bytes, kept as opaque bytes here.

use crate::error::*;
use crate::layers::ip::Ipv4Protocol;
use crate::layers::{Raw, RawRef};
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

pub const ICMP_TYPE_ECHO_REPLY: u8 = 0;
pub const ICMP_TYPE_DESTINATION_UNREACHABLE: u8 = 3;
pub const ICMP_TYPE_ECHO_REQUEST: u8 = 8;
pub const ICMP_TYPE_TIME_EXCEEDED: u8 = 11;

/// The destination-unreachable code points of RFC 792 (and later
/// additions).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IcmpUnreachableCode {
    NetUnreachable,
    HostUnreachable,
    ProtocolUnreachable,
    PortUnreachable,
    FragmentationNeeded,
    SourceRouteFailed,
    Unknown(u8),
}

impl IcmpUnreachableCode {
    #[inline]
    pub fn number(self) -> u8 {
        match self {
            IcmpUnreachableCode::NetUnreachable => 0,
            IcmpUnreachableCode::HostUnreachable => 1,
            IcmpUnreachableCode::ProtocolUnreachable => 2,
            IcmpUnreachableCode::PortUnreachable => 3,
            IcmpUnreachableCode::FragmentationNeeded => 4,
            IcmpUnreachableCode::SourceRouteFailed => 5,
            IcmpUnreachableCode::Unknown(raw) => raw,
        }
    }
}

impl From<u8> for IcmpUnreachableCode {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            0 => IcmpUnreachableCode::NetUnreachable,
            1 => IcmpUnreachableCode::HostUnreachable,
            2 => IcmpUnreachableCode::ProtocolUnreachable,
            3 => IcmpUnreachableCode::PortUnreachable,
            4 => IcmpUnreachableCode::FragmentationNeeded,
            5 => IcmpUnreachableCode::SourceRouteFailed,
            raw => IcmpUnreachableCode::Unknown(raw),
        }
    }
}

/// An ICMP message.
#[derive(Clone, Debug)]
pub struct Icmp {
    icmp_type: u8,
    code: u8,
    chksum: Option<u16>,
    rest_of_header: u32,
    payload: Option<Box<dyn LayerObject>>,
}

impl Icmp {
    /// Creates a message of the given type and code, with the checksum
    /// computed at build time.
    pub fn new(icmp_type: u8, code: u8) -> Self {
        Icmp {
            icmp_type,
            code,
            chksum: None,
            rest_of_header: 0,
            payload: None,
        }
    }

    /// Creates a destination-unreachable message. The payload should be
    /// the offending datagram's IP header plus its first 8 payload bytes.
    pub fn destination_unreachable(code: IcmpUnreachableCode) -> Self {
        Icmp::new(ICMP_TYPE_DESTINATION_UNREACHABLE, code.number())
    }

    #[inline]
    pub fn icmp_type(&self) -> u8 {
        self.icmp_type
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.code
    }

    /// The checksum explicitly assigned to the message, or `None` if it
    /// is computed at serialization time.
    #[inline]
    pub fn chksum(&self) -> Option<u16> {
        self.chksum
    }

    #[inline]
    pub fn set_chksum(&mut self, chksum: Option<u16>) {
        self.chksum = chksum;
    }

    /// The second 32-bit word of the header, whose meaning depends on the
    /// message type (unused for destination-unreachable).
    #[inline]
    pub fn rest_of_header(&self) -> u32 {
        self.rest_of_header
    }

    #[inline]
    pub fn set_rest_of_header(&mut self, rest_of_header: u32) {
        self.rest_of_header = rest_of_header;
    }
}

layer_identity!(Icmp, IcmpRef, "Icmp");

impl PartialEq for Icmp {
    fn eq(&self, other: &Self) -> bool {
        self.icmp_type == other.icmp_type
            && self.code == other.code
            && self.chksum == other.chksum
            && self.rest_of_header == other.rest_of_header
            && match (&self.payload, &other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => a.compare(b.as_ref()),
                _ => false,
            }
    }
}

impl LayerLength for Icmp {
    #[inline]
    fn len(&self) -> usize {
        8 + self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl LayerObject for Icmp {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn ip_payload_protocol(&self) -> Option<Ipv4Protocol> {
        Some(Ipv4Protocol::Icmp)
    }

    #[inline]
    fn can_add_payload_default(&self, payload: &dyn LayerObject) -> bool {
        // Error payloads are opaque captured bytes, never structured layers.
        payload.as_any().downcast_ref::<Raw>().is_some()
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

impl Layer for Icmp {}

impl ToBytes for Icmp {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();
        bytes.push(self.icmp_type);
        bytes.push(self.code);
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        bytes.extend(self.rest_of_header.to_be_bytes());
        match self.payload.as_ref() {
            None => (),
            Some(p) => p.to_bytes_checksummed(bytes, Some((Self::layer_id(), start)))?,
        }

        if self.chksum.is_none() {
            let chksum = !utils::ones_complement_16bit(&bytes[start..]);
            bytes[start + 2..start + 4].copy_from_slice(&chksum.to_be_bytes());
        }

        Ok(())
    }
}

impl FromBytesCurrent for Icmp {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let icmp = IcmpRef::from_bytes_unchecked(bytes);
        Icmp {
            icmp_type: icmp.icmp_type(),
            code: icmp.code(),
            chksum: None,
            rest_of_header: icmp.rest_of_header(),
            payload: None,
        }
    }

    fn payload_from_bytes_unchecked_default(&mut self, bytes: &[u8]) {
        self.payload = match bytes.get(8..) {
            None | Some([]) => None,
            Some(payload) => Some(Box::new(Raw::from_bytes_unchecked(payload))),
        };
    }
}

/// A view of an ICMP message.
#[derive(Clone, Copy, Debug)]
pub struct IcmpRef<'a> {
    data: &'a [u8],
}

impl<'a> IcmpRef<'a> {
    #[inline]
    pub fn icmp_type(&self) -> u8 {
        *self
            .data
            .first()
            .expect("insufficient bytes in Icmp layer to retrieve Type field")
    }

    #[inline]
    pub fn code(&self) -> u8 {
        *self
            .data
            .get(1)
            .expect("insufficient bytes in Icmp layer to retrieve Code field")
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 2)
                .expect("insufficient bytes in Icmp layer to retrieve Checksum field"),
        )
    }

    #[inline]
    pub fn rest_of_header(&self) -> u32 {
        u32::from_be_bytes(
            utils::to_array(self.data, 4)
                .expect("insufficient bytes in Icmp layer to retrieve Rest of Header field"),
        )
    }

    /// The destination-unreachable code, when the message is one.
    #[inline]
    pub fn unreachable_code(&self) -> Option<IcmpUnreachableCode> {
        (self.icmp_type() == ICMP_TYPE_DESTINATION_UNREACHABLE)
            .then(|| IcmpUnreachableCode::from(self.code()))
    }

    /// Whether the message checksum matches its contents.
    #[inline]
    pub fn is_checksum_correct(&self) -> bool {
        self.data.len() >= 8 && utils::ones_complement_16bit(self.data) == 0xFFFF
    }

    /// The message body after the 8-byte header, or `None` if truncated.
    #[inline]
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.data.get(8..)
    }
}

impl<'a> FromBytesRef<'a> for IcmpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        IcmpRef { data: bytes }
    }
}

impl LayerOffset for IcmpRef<'_> {
    fn payload_byte_index_default(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if layer_type == RawRef::layer_id() && bytes.len() >= 8 {
            Some(8)
        } else {
            None
        }
    }
}

impl Validate for IcmpRef<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        if curr_layer.len() < 8 {
            return Err(ValidationError {
                layer: Icmp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes in Icmp header (8 bytes required)",
            });
        }

        if utils::ones_complement_16bit(curr_layer) != 0xFFFF {
            return Err(ValidationError {
                layer: Icmp::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "incorrect checksum in Icmp message",
            });
        }

        Ok(())
    }

    #[inline]
    fn validate_payload_default(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl ToLayer for IcmpRef<'_> {
    type Owned = Icmp;

    #[inline]
    fn to_layer(&self) -> Icmp {
        Icmp::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_unreachable_round_trip() {
        let mut icmp = Icmp::destination_unreachable(IcmpUnreachableCode::PortUnreachable);
        icmp.set_payload_unchecked(Box::new(Raw::new(vec![0x45, 0, 0, 0x1C])));
        let bytes = icmp.to_bytes().unwrap();

        let parsed = IcmpRef::from_bytes_unchecked(&bytes);
        assert!(parsed.is_checksum_correct());
        assert_eq!(
            parsed.unreachable_code(),
            Some(IcmpUnreachableCode::PortUnreachable)
        );
        assert!(IcmpRef::validate(&bytes).is_ok());
    }

    #[test]
    fn corrupted_message_fails_checksum() {
        let icmp = Icmp::destination_unreachable(IcmpUnreachableCode::HostUnreachable);
        let mut bytes = icmp.to_bytes().unwrap();
        bytes[5] ^= 0xFF;
        assert!(!IcmpRef::from_bytes_unchecked(&bytes).is_checksum_correct());
        assert!(IcmpRef::validate(&bytes).is_err());
    }
}
