// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ethernet II framing.
//!
//! ## Packet Layout
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |                      Destination Address                      |
//!    +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |                               |                               |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//!  8 |                         Source Address                        |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 12 |           EtherType           Z            Payload            Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::addr::MacAddress;
use crate::error::*;
use crate::layers::arp::{Arp, ArpRef};
use crate::layers::ip::{Ipv4, Ipv4Ref, Ipv6, Ipv6Ref};
use crate::layers::{Raw, RawRef};
use crate::packet::DataLinkKind;
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

/// The protocol carried in an Ethernet frame's payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Ipv6,
    Unknown(u16),
}

impl EtherType {
    /// The 16-bit wire value of the EtherType.
    #[inline]
    pub fn number(self) -> u16 {
        match self {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::Ipv6 => 0x86DD,
            EtherType::Unknown(raw) => raw,
        }
    }
}

impl From<u16> for EtherType {
    #[inline]
    fn from(value: u16) -> Self {
        match value {
            0x0800 => EtherType::Ipv4,
            0x0806 => EtherType::Arp,
            0x86DD => EtherType::Ipv6,
            raw => EtherType::Unknown(raw),
        }
    }
}

/// An Ethernet II frame.
#[derive(Clone, Debug)]
pub struct Ether {
    src: MacAddress,
    dst: MacAddress,
    ether_type: Option<EtherType>,
    payload: Option<Box<dyn LayerObject>>,
}

impl Ether {
    /// Creates a frame between the given addresses, with the EtherType
    /// left to be derived from the payload layer.
    #[inline]
    pub fn new(src: MacAddress, dst: MacAddress) -> Self {
        Ether {
            src,
            dst,
            ether_type: None,
            payload: None,
        }
    }

    #[inline]
    pub fn src(&self) -> MacAddress {
        self.src
    }

    #[inline]
    pub fn set_src(&mut self, src: MacAddress) {
        self.src = src;
    }

    #[inline]
    pub fn dst(&self) -> MacAddress {
        self.dst
    }

    #[inline]
    pub fn set_dst(&mut self, dst: MacAddress) {
        self.dst = dst;
    }

    /// The EtherType explicitly assigned to the frame, or `None` if it is
    /// derived from the payload layer at serialization time.
    #[inline]
    pub fn ether_type(&self) -> Option<EtherType> {
        self.ether_type
    }

    #[inline]
    pub fn set_ether_type(&mut self, ether_type: Option<EtherType>) {
        self.ether_type = ether_type;
    }
}

layer_identity!(Ether, EtherRef, "Ether");

impl PartialEq for Ether {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src
            && self.dst == other.dst
            && self.ether_type == other.ether_type
            && match (&self.payload, &other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => a.compare(b.as_ref()),
                _ => false,
            }
    }
}

impl LayerLength for Ether {
    #[inline]
    fn len(&self) -> usize {
        14 + self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl LayerObject for Ether {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn data_link(&self) -> Option<DataLinkKind> {
        Some(DataLinkKind::Ethernet)
    }

    #[inline]
    fn can_add_payload_default(&self, payload: &dyn LayerObject) -> bool {
        self.ether_type.is_some() || payload.ether_payload_type().is_some()
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

impl Layer for Ether {}

impl ToBytes for Ether {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();

        let ether_type = match self.ether_type {
            Some(t) => t,
            None => self
                .payload
                .as_ref()
                .and_then(|p| p.ether_payload_type())
                .ok_or_else(|| SerializationError::bad_payload_layer(Ether::name()))?,
        };

        let mut dst = self.dst;
        if dst == MacAddress::ZERO {
            if let Some(default) = self.payload.as_ref().and_then(|p| p.default_ether_destination())
            {
                dst = default;
            }
        }

        bytes.extend(dst.octets());
        bytes.extend(self.src.octets());
        bytes.extend(ether_type.number().to_be_bytes());
        match self.payload.as_ref() {
            None => Ok(()),
            Some(p) => p.to_bytes_checksummed(bytes, Some((Self::layer_id(), start))),
        }
    }
}

impl FromBytesCurrent for Ether {
    #[inline]
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let ether = EtherRef::from_bytes_unchecked(bytes);
        Ether {
            src: ether.src(),
            dst: ether.dst(),
            ether_type: Some(ether.ether_type()),
            payload: None,
        }
    }

    fn payload_from_bytes_unchecked_default(&mut self, bytes: &[u8]) {
        let Some(payload) = bytes.get(14..) else {
            self.payload = None;
            return;
        };
        if payload.is_empty() {
            self.payload = None;
            return;
        }

        let ether = EtherRef::from_bytes_unchecked(bytes);
        self.payload = Some(match ether.ether_type() {
            EtherType::Ipv4 => Box::new(Ipv4::from_bytes_unchecked(payload)),
            EtherType::Ipv6 => Box::new(Ipv6::from_bytes_unchecked(payload)),
            EtherType::Arp => Box::new(Arp::from_bytes_unchecked(payload)),
            EtherType::Unknown(_) => Box::new(Raw::from_bytes_unchecked(payload)),
        });
    }
}

/// A view of an Ethernet II frame.
#[derive(Clone, Copy, Debug)]
pub struct EtherRef<'a> {
    data: &'a [u8],
}

impl<'a> EtherRef<'a> {
    /// The destination MAC address of the frame.
    #[inline]
    pub fn dst(&self) -> MacAddress {
        MacAddress(
            utils::to_array(self.data, 0)
                .expect("insufficient bytes in Ether layer to retrieve Destination Address field"),
        )
    }

    /// The source MAC address of the frame.
    #[inline]
    pub fn src(&self) -> MacAddress {
        MacAddress(
            utils::to_array(self.data, 6)
                .expect("insufficient bytes in Ether layer to retrieve Source Address field"),
        )
    }

    /// The EtherType of the frame's payload.
    #[inline]
    pub fn ether_type(&self) -> EtherType {
        EtherType::from(u16::from_be_bytes(
            utils::to_array(self.data, 12)
                .expect("insufficient bytes in Ether layer to retrieve EtherType field"),
        ))
    }

    /// The frame's payload bytes, or `None` if the frame is truncated
    /// before the end of its header.
    #[inline]
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.data.get(14..)
    }

    /// A view of the frame's IPv4 payload, if the EtherType declares one.
    #[inline]
    pub fn ipv4(&self) -> Option<Ipv4Ref<'a>> {
        self.get_layer::<Ipv4Ref>()
    }

    /// A view of the frame's IPv6 payload, if the EtherType declares one.
    #[inline]
    pub fn ipv6(&self) -> Option<Ipv6Ref<'a>> {
        self.get_layer::<Ipv6Ref>()
    }

    /// A view of the frame's ARP payload, if the EtherType declares one.
    #[inline]
    pub fn arp(&self) -> Option<ArpRef<'a>> {
        self.get_layer::<ArpRef>()
    }
}

impl<'a> FromBytesRef<'a> for EtherRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        EtherRef { data: bytes }
    }
}

impl LayerOffset for EtherRef<'_> {
    fn payload_byte_index_default(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        let ether_type = utils::read_u16(bytes, 12, utils::Endianness::Big)?;
        let payload = bytes.get(14..)?;
        match EtherType::from(ether_type) {
            EtherType::Ipv4 => {
                if layer_type == Ipv4Ref::layer_id() {
                    Some(14)
                } else {
                    Ipv4Ref::payload_byte_index_default(payload, layer_type).map(|idx| 14 + idx)
                }
            }
            EtherType::Ipv6 => {
                if layer_type == Ipv6Ref::layer_id() {
                    Some(14)
                } else {
                    Ipv6Ref::payload_byte_index_default(payload, layer_type).map(|idx| 14 + idx)
                }
            }
            EtherType::Arp => {
                if layer_type == ArpRef::layer_id() {
                    Some(14)
                } else {
                    None
                }
            }
            EtherType::Unknown(_) => {
                if layer_type == RawRef::layer_id() {
                    Some(14)
                } else {
                    None
                }
            }
        }
    }
}

impl Validate for EtherRef<'_> {
    #[inline]
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        if curr_layer.len() < 14 {
            return Err(ValidationError {
                layer: Ether::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes in Ether header (14 bytes required)",
            });
        }

        Ok(())
    }

    fn validate_payload_default(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let Some(payload) = curr_layer.get(14..) else {
            return Err(ValidationError {
                layer: Ether::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "packet too short for Ether frame--missing header bytes",
            });
        };

        match utils::read_u16(curr_layer, 12, utils::Endianness::Big).map(EtherType::from) {
            Some(EtherType::Ipv4) => Ipv4Ref::validate(payload),
            Some(EtherType::Ipv6) => Ipv6Ref::validate(payload),
            Some(EtherType::Arp) => ArpRef::validate(payload),
            _ => RawRef::validate(payload),
        }
    }
}

impl ToLayer for EtherRef<'_> {
    type Owned = Ether;

    #[inline]
    fn to_layer(&self) -> Ether {
        Ether::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_fields() {
        let mut bytes = vec![
            0xFE, 0xFF, 0x20, 0x00, 0x01, 0x00, // destination
            0x00, 0x00, 0x01, 0x00, 0x00, 0x00, // source
            0x08, 0x00, // EtherType: IPv4
        ];
        bytes.extend([0u8; 4]);

        let ether = EtherRef::from_bytes_unchecked(&bytes);
        assert_eq!(ether.dst().to_string(), "fe:ff:20:00:01:00");
        assert_eq!(ether.src().to_string(), "00:00:01:00:00:00");
        assert_eq!(ether.ether_type(), EtherType::Ipv4);
        assert_eq!(ether.payload().unwrap().len(), 4);
    }

    #[test]
    fn short_frame_is_invalid_but_never_panics() {
        let bytes = [0u8; 9];
        assert!(EtherRef::validate(&bytes).is_err());
        let ether = EtherRef::from_bytes_unchecked(&bytes);
        assert!(ether.payload().is_none());
    }

    #[test]
    fn ether_type_inference_fails_without_capable_payload() {
        let mut ether = Ether::new(MacAddress::ZERO, MacAddress::BROADCAST);
        assert!(ether.to_bytes().is_err());

        ether.set_ether_type(Some(EtherType::Unknown(0x88B5)));
        let bytes = ether.to_bytes().unwrap();
        assert_eq!(&bytes[12..14], &[0x88, 0xB5]);
    }
}
