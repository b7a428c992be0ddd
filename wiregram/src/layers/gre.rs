// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic Routing Encapsulation (GRE), RFC 2784 with the RFC 2890 key
//! and sequence-number extensions.
//!
//! ## Packet Layout
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |C| |K|S| Reserved0       | Ver |         Protocol Type         |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |   Checksum (optional)         |       Reserved1 (optional)    |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! .. |                         Key (optional)                        |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! .. |                  Sequence Number (optional)                   |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! .. Z                            Payload                            Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bitflags::bitflags;

use crate::error::*;
use crate::layers::ip::{Ipv4, Ipv4Protocol, Ipv4Ref};
use crate::layers::l2::EtherType;
use crate::layers::{Raw, RawRef};
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

bitflags! {
    /// The present-bits of a GRE header's first word.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct GreFlags: u16 {
        const CHECKSUM = 0b_1000_0000_0000_0000;
        const KEY = 0b_0010_0000_0000_0000;
        const SEQUENCE = 0b_0001_0000_0000_0000;
    }
}

/// A GRE encapsulation header.
#[derive(Clone, Debug)]
pub struct Gre {
    protocol_type: EtherType,
    /// `Some` adds the checksum word; `Some(None)` computes it at build
    /// time, `Some(Some(v))` pins the wire value.
    chksum: Option<Option<u16>>,
    key: Option<u32>,
    sequence: Option<u32>,
    payload: Option<Box<dyn LayerObject>>,
}

impl Gre {
    pub fn new(protocol_type: EtherType) -> Self {
        Gre {
            protocol_type,
            chksum: None,
            key: None,
            sequence: None,
            payload: None,
        }
    }

    #[inline]
    pub fn protocol_type(&self) -> EtherType {
        self.protocol_type
    }

    /// Enables the checksum word, computed at serialization time.
    #[inline]
    pub fn enable_chksum(&mut self) {
        self.chksum = Some(None);
    }

    #[inline]
    pub fn set_key(&mut self, key: Option<u32>) {
        self.key = key;
    }

    #[inline]
    pub fn key(&self) -> Option<u32> {
        self.key
    }

    #[inline]
    pub fn set_sequence(&mut self, sequence: Option<u32>) {
        self.sequence = sequence;
    }

    #[inline]
    pub fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    /// The present-bits the header will carry.
    pub fn flags(&self) -> GreFlags {
        let mut flags = GreFlags::empty();
        if self.chksum.is_some() {
            flags |= GreFlags::CHECKSUM;
        }
        if self.key.is_some() {
            flags |= GreFlags::KEY;
        }
        if self.sequence.is_some() {
            flags |= GreFlags::SEQUENCE;
        }
        flags
    }

    fn header_len(&self) -> usize {
        4 + if self.chksum.is_some() { 4 } else { 0 }
            + if self.key.is_some() { 4 } else { 0 }
            + if self.sequence.is_some() { 4 } else { 0 }
    }
}

layer_identity!(Gre, GreRef, "Gre");

impl PartialEq for Gre {
    fn eq(&self, other: &Self) -> bool {
        self.protocol_type == other.protocol_type
            && self.chksum == other.chksum
            && self.key == other.key
            && self.sequence == other.sequence
            && match (&self.payload, &other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => a.compare(b.as_ref()),
                _ => false,
            }
    }
}

impl LayerLength for Gre {
    #[inline]
    fn len(&self) -> usize {
        self.header_len() + self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl LayerObject for Gre {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn ip_payload_protocol(&self) -> Option<Ipv4Protocol> {
        Some(Ipv4Protocol::Gre)
    }

    #[inline]
    fn can_add_payload_default(&self, _payload: &dyn LayerObject) -> bool {
        true
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

impl Layer for Gre {}

impl ToBytes for Gre {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();
        bytes.extend(self.flags().bits().to_be_bytes());
        bytes.extend(self.protocol_type.number().to_be_bytes());
        if let Some(pinned) = self.chksum {
            bytes.extend(pinned.unwrap_or(0).to_be_bytes());
            bytes.extend([0, 0]);
        }
        if let Some(key) = self.key {
            bytes.extend(key.to_be_bytes());
        }
        if let Some(sequence) = self.sequence {
            bytes.extend(sequence.to_be_bytes());
        }

        match self.payload.as_ref() {
            None => (),
            Some(p) => p.to_bytes_checksummed(bytes, Some((Self::layer_id(), start)))?,
        }

        if let Some(None) = self.chksum {
            let chksum = !utils::ones_complement_16bit(&bytes[start..]);
            bytes[start + 4..start + 6].copy_from_slice(&chksum.to_be_bytes());
        }

        Ok(())
    }
}

impl FromBytesCurrent for Gre {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let gre = GreRef::from_bytes_unchecked(bytes);
        Gre {
            protocol_type: gre.protocol_type(),
            chksum: gre.flags().contains(GreFlags::CHECKSUM).then_some(None),
            key: gre.key(),
            sequence: gre.sequence(),
            payload: None,
        }
    }

    fn payload_from_bytes_unchecked_default(&mut self, bytes: &[u8]) {
        let gre = GreRef::from_bytes_unchecked(bytes);
        let payload = gre.payload().unwrap_or(&[]);
        if payload.is_empty() {
            self.payload = None;
            return;
        }

        self.payload = Some(match gre.protocol_type() {
            EtherType::Ipv4 => Box::new(Ipv4::from_bytes_unchecked(payload)),
            _ => Box::new(Raw::from_bytes_unchecked(payload)),
        });
    }
}

/// A view of a GRE header.
#[derive(Clone, Copy, Debug)]
pub struct GreRef<'a> {
    data: &'a [u8],
}

impl<'a> GreRef<'a> {
    #[inline]
    pub fn flags(&self) -> GreFlags {
        GreFlags::from_bits_truncate(u16::from_be_bytes(
            utils::to_array(self.data, 0)
                .expect("insufficient bytes in Gre layer to retrieve flags field"),
        ))
    }

    /// The version carried in the header's first word.
    #[inline]
    pub fn version(&self) -> u8 {
        self.data
            .get(1)
            .map(|b| b & 0x07)
            .expect("insufficient bytes in Gre layer to retrieve Version field")
    }

    /// The EtherType of the encapsulated payload.
    #[inline]
    pub fn protocol_type(&self) -> EtherType {
        EtherType::from(u16::from_be_bytes(
            utils::to_array(self.data, 2)
                .expect("insufficient bytes in Gre layer to retrieve Protocol Type field"),
        ))
    }

    fn header_len_from(bytes: &[u8]) -> Option<usize> {
        let flags = GreFlags::from_bits_truncate(utils::read_u16(bytes, 0, utils::Endianness::Big)?);
        let mut len = 4;
        if flags.contains(GreFlags::CHECKSUM) {
            len += 4;
        }
        if flags.contains(GreFlags::KEY) {
            len += 4;
        }
        if flags.contains(GreFlags::SEQUENCE) {
            len += 4;
        }
        Some(len)
    }

    /// The checksum word, when the present-bit declares one.
    pub fn chksum(&self) -> Option<u16> {
        self.flags()
            .contains(GreFlags::CHECKSUM)
            .then(|| utils::read_u16(self.data, 4, utils::Endianness::Big))
            .flatten()
    }

    /// The key word, when the present-bit declares one.
    pub fn key(&self) -> Option<u32> {
        let flags = self.flags();
        if !flags.contains(GreFlags::KEY) {
            return None;
        }
        let offset = if flags.contains(GreFlags::CHECKSUM) { 8 } else { 4 };
        utils::read_u32(self.data, offset, utils::Endianness::Big)
    }

    /// The sequence number, when the present-bit declares one.
    pub fn sequence(&self) -> Option<u32> {
        let flags = self.flags();
        if !flags.contains(GreFlags::SEQUENCE) {
            return None;
        }
        let mut offset = 4;
        if flags.contains(GreFlags::CHECKSUM) {
            offset += 4;
        }
        if flags.contains(GreFlags::KEY) {
            offset += 4;
        }
        utils::read_u32(self.data, offset, utils::Endianness::Big)
    }

    /// Whether the optional checksum matches the header and payload;
    /// `None` when the header carries no checksum.
    pub fn is_checksum_correct(&self) -> Option<bool> {
        self.chksum()?;
        Some(utils::ones_complement_16bit(self.data) == 0xFFFF)
    }

    /// The encapsulated payload bytes, or `None` if the header is
    /// truncated.
    #[inline]
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.data.get(Self::header_len_from(self.data)?..)
    }
}

impl<'a> FromBytesRef<'a> for GreRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        GreRef { data: bytes }
    }
}

impl LayerOffset for GreRef<'_> {
    fn payload_byte_index_default(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        let header_len = Self::header_len_from(bytes)?;
        if bytes.len() < header_len {
            return None;
        }
        let protocol = EtherType::from(utils::read_u16(bytes, 2, utils::Endianness::Big)?);
        match protocol {
            EtherType::Ipv4 => {
                if layer_type == Ipv4Ref::layer_id() {
                    Some(header_len)
                } else {
                    Ipv4Ref::payload_byte_index_default(&bytes[header_len..], layer_type)
                        .map(|idx| header_len + idx)
                }
            }
            _ => {
                if layer_type == RawRef::layer_id() {
                    Some(header_len)
                } else {
                    None
                }
            }
        }
    }
}

impl Validate for GreRef<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let Some(header_len) = GreRef::header_len_from(curr_layer) else {
            return Err(ValidationError {
                layer: Gre::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes in Gre header (4 bytes required)",
            });
        };

        if curr_layer.len() < header_len {
            return Err(ValidationError {
                layer: Gre::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes for the optional fields declared by the Gre flags",
            });
        }

        if curr_layer[1] & 0x07 != 0 {
            return Err(ValidationError {
                layer: Gre::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "unsupported Gre version (only version 0 is recognized)",
            });
        }

        let gre = GreRef::from_bytes_unchecked(curr_layer);
        if gre.is_checksum_correct() == Some(false) {
            return Err(ValidationError {
                layer: Gre::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "incorrect checksum in Gre header",
            });
        }

        Ok(())
    }

    fn validate_payload_default(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let gre = GreRef::from_bytes_unchecked(curr_layer);
        let Some(payload) = gre.payload() else {
            return Ok(());
        };
        if payload.is_empty() {
            return Ok(());
        }

        match utils::read_u16(curr_layer, 2, utils::Endianness::Big).map(EtherType::from) {
            Some(EtherType::Ipv4) => Ipv4Ref::validate(payload),
            _ => RawRef::validate(payload),
        }
    }
}

impl ToLayer for GreRef<'_> {
    type Owned = Gre;

    #[inline]
    fn to_layer(&self) -> Gre {
        Gre::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_follow_present_bits() {
        let mut gre = Gre::new(EtherType::Ipv4);
        gre.enable_chksum();
        gre.set_key(Some(0xDEADBEEF));
        gre.set_sequence(Some(7));
        gre.set_payload_unchecked(Box::new(Raw::new(vec![0x45])));

        let bytes = gre.to_bytes().unwrap();
        assert_eq!(bytes.len(), 4 + 4 + 4 + 4 + 1);

        let parsed = GreRef::from_bytes_unchecked(&bytes);
        assert_eq!(parsed.version(), 0);
        assert_eq!(parsed.key(), Some(0xDEADBEEF));
        assert_eq!(parsed.sequence(), Some(7));
        assert_eq!(parsed.is_checksum_correct(), Some(true));
    }

    #[test]
    fn key_only_header_round_trip() {
        let mut gre = Gre::new(EtherType::Unknown(0x880B));
        gre.set_key(Some(42));
        let bytes = gre.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8);
        assert!(GreRef::validate(&bytes).is_ok());
        assert_eq!(GreRef::from_bytes_unchecked(&bytes).to_layer(), gre);
    }
}
