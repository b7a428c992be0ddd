// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Address Resolution Protocol (ARP).
//!
//! ## Packet Layout
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |         Hardware Type         |         Protocol Type         |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |  Hardware Len |  Protocol Len |           Operation           |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  8 Z    Sender Hardware Address    Z    Sender Protocol Address    Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! .. Z    Target Hardware Address    Z    Target Protocol Address    Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::addr::MacAddress;
use crate::error::*;
use crate::layers::l2::EtherType;
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

/// The operation an ARP packet performs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Unknown(u16),
}

impl ArpOperation {
    #[inline]
    pub fn number(self) -> u16 {
        match self {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::Unknown(raw) => raw,
        }
    }
}

impl From<u16> for ArpOperation {
    #[inline]
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            raw => ArpOperation::Unknown(raw),
        }
    }
}

pub const ARP_HARDWARE_TYPE_ETHERNET: u16 = 1;

/// An ARP packet.
///
/// Hardware and protocol addresses are arbitrary byte strings whose
/// lengths are declared in the header; the sender/target pairs must agree
/// in length.
#[derive(Clone, Debug, PartialEq)]
pub struct Arp {
    hardware_type: u16,
    protocol_type: u16,
    operation: ArpOperation,
    sender_hardware_addr: Vec<u8>,
    sender_protocol_addr: Vec<u8>,
    target_hardware_addr: Vec<u8>,
    target_protocol_addr: Vec<u8>,
}

impl Arp {
    /// Creates an Ethernet/IPv4 ARP packet.
    pub fn new(
        operation: ArpOperation,
        sender_hardware_addr: [u8; 6],
        sender_protocol_addr: [u8; 4],
        target_hardware_addr: [u8; 6],
        target_protocol_addr: [u8; 4],
    ) -> Self {
        Arp {
            hardware_type: ARP_HARDWARE_TYPE_ETHERNET,
            protocol_type: EtherType::Ipv4.number(),
            operation,
            sender_hardware_addr: sender_hardware_addr.into(),
            sender_protocol_addr: sender_protocol_addr.into(),
            target_hardware_addr: target_hardware_addr.into(),
            target_protocol_addr: target_protocol_addr.into(),
        }
    }

    #[inline]
    pub fn hardware_type(&self) -> u16 {
        self.hardware_type
    }

    #[inline]
    pub fn protocol_type(&self) -> u16 {
        self.protocol_type
    }

    #[inline]
    pub fn operation(&self) -> ArpOperation {
        self.operation
    }

    #[inline]
    pub fn set_operation(&mut self, operation: ArpOperation) {
        self.operation = operation;
    }

    #[inline]
    pub fn sender_hardware_addr(&self) -> &[u8] {
        &self.sender_hardware_addr
    }

    #[inline]
    pub fn sender_protocol_addr(&self) -> &[u8] {
        &self.sender_protocol_addr
    }

    #[inline]
    pub fn target_hardware_addr(&self) -> &[u8] {
        &self.target_hardware_addr
    }

    #[inline]
    pub fn target_protocol_addr(&self) -> &[u8] {
        &self.target_protocol_addr
    }
}

layer_identity!(Arp, ArpRef, "Arp");

impl LayerLength for Arp {
    #[inline]
    fn len(&self) -> usize {
        8 + 2 * self.sender_hardware_addr.len() + 2 * self.sender_protocol_addr.len()
    }
}

impl LayerObject for Arp {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn ether_payload_type(&self) -> Option<EtherType> {
        Some(EtherType::Arp)
    }

    #[inline]
    fn default_ether_destination(&self) -> Option<MacAddress> {
        Some(MacAddress::BROADCAST)
    }

    #[inline]
    fn can_add_payload_default(&self, _payload: &dyn LayerObject) -> bool {
        false
    }

    #[inline]
    fn payload(&self) -> Option<&dyn LayerObject> {
        None
    }

    #[inline]
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject> {
        None
    }

    #[inline]
    fn set_payload_unchecked(&mut self, _payload: Box<dyn LayerObject>) {
        panic!("set_payload_unchecked() called on Arp layer, which cannot hold a payload")
    }

    #[inline]
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>> {
        None
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

impl Layer for Arp {}

impl ToBytes for Arp {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        if self.sender_hardware_addr.len() != self.target_hardware_addr.len()
            || self.sender_protocol_addr.len() != self.target_protocol_addr.len()
        {
            return Err(SerializationError::invalid_field_value(Arp::name()));
        }
        let hardware_len: u8 = self
            .sender_hardware_addr
            .len()
            .try_into()
            .map_err(|_| SerializationError::length_encoding(Arp::name()))?;
        let protocol_len: u8 = self
            .sender_protocol_addr
            .len()
            .try_into()
            .map_err(|_| SerializationError::length_encoding(Arp::name()))?;

        bytes.extend(self.hardware_type.to_be_bytes());
        bytes.extend(self.protocol_type.to_be_bytes());
        bytes.push(hardware_len);
        bytes.push(protocol_len);
        bytes.extend(self.operation.number().to_be_bytes());
        bytes.extend(&self.sender_hardware_addr);
        bytes.extend(&self.sender_protocol_addr);
        bytes.extend(&self.target_hardware_addr);
        bytes.extend(&self.target_protocol_addr);
        Ok(())
    }
}

impl FromBytesCurrent for Arp {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let arp = ArpRef::from_bytes_unchecked(bytes);
        Arp {
            hardware_type: arp.hardware_type(),
            protocol_type: arp.protocol_type(),
            operation: arp.operation(),
            sender_hardware_addr: arp.sender_hardware_addr().unwrap_or(&[]).into(),
            sender_protocol_addr: arp.sender_protocol_addr().unwrap_or(&[]).into(),
            target_hardware_addr: arp.target_hardware_addr().unwrap_or(&[]).into(),
            target_protocol_addr: arp.target_protocol_addr().unwrap_or(&[]).into(),
        }
    }

    #[inline]
    fn payload_from_bytes_unchecked_default(&mut self, _bytes: &[u8]) {}
}

/// A view of an ARP packet.
#[derive(Clone, Copy, Debug)]
pub struct ArpRef<'a> {
    data: &'a [u8],
}

impl<'a> ArpRef<'a> {
    #[inline]
    pub fn hardware_type(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 0)
                .expect("insufficient bytes in Arp layer to retrieve Hardware Type field"),
        )
    }

    #[inline]
    pub fn protocol_type(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 2)
                .expect("insufficient bytes in Arp layer to retrieve Protocol Type field"),
        )
    }

    #[inline]
    pub fn hardware_len(&self) -> u8 {
        *self
            .data
            .get(4)
            .expect("insufficient bytes in Arp layer to retrieve Hardware Length field")
    }

    #[inline]
    pub fn protocol_len(&self) -> u8 {
        *self
            .data
            .get(5)
            .expect("insufficient bytes in Arp layer to retrieve Protocol Length field")
    }

    #[inline]
    pub fn operation(&self) -> ArpOperation {
        ArpOperation::from(u16::from_be_bytes(
            utils::to_array(self.data, 6)
                .expect("insufficient bytes in Arp layer to retrieve Operation field"),
        ))
    }

    /// The sender hardware address, or `None` if the packet is truncated.
    #[inline]
    pub fn sender_hardware_addr(&self) -> Option<&'a [u8]> {
        let hlen = *self.data.get(4)? as usize;
        self.data.get(8..8 + hlen)
    }

    /// The sender protocol address, or `None` if the packet is truncated.
    #[inline]
    pub fn sender_protocol_addr(&self) -> Option<&'a [u8]> {
        let hlen = *self.data.get(4)? as usize;
        let plen = *self.data.get(5)? as usize;
        self.data.get(8 + hlen..8 + hlen + plen)
    }

    /// The target hardware address, or `None` if the packet is truncated.
    #[inline]
    pub fn target_hardware_addr(&self) -> Option<&'a [u8]> {
        let hlen = *self.data.get(4)? as usize;
        let plen = *self.data.get(5)? as usize;
        self.data.get(8 + hlen + plen..8 + 2 * hlen + plen)
    }

    /// The target protocol address, or `None` if the packet is truncated.
    #[inline]
    pub fn target_protocol_addr(&self) -> Option<&'a [u8]> {
        let hlen = *self.data.get(4)? as usize;
        let plen = *self.data.get(5)? as usize;
        self.data.get(8 + 2 * hlen + plen..8 + 2 * hlen + 2 * plen)
    }
}

impl<'a> FromBytesRef<'a> for ArpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        ArpRef { data: bytes }
    }
}

impl LayerOffset for ArpRef<'_> {
    #[inline]
    fn payload_byte_index_default(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

impl Validate for ArpRef<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        if curr_layer.len() < 8 {
            return Err(ValidationError {
                layer: Arp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes in Arp header (8 bytes required)",
            });
        }

        let hlen = curr_layer[4] as usize;
        let plen = curr_layer[5] as usize;
        let expected = 8 + 2 * hlen + 2 * plen;
        if curr_layer.len() < expected {
            return Err(ValidationError {
                layer: Arp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes for the address lengths declared in the Arp header",
            });
        }
        if curr_layer.len() > expected {
            return Err(ValidationError {
                layer: Arp::name(),
                class: ValidationErrorClass::ExcessBytes(curr_layer.len() - expected),
                reason: "excess bytes at the end of the Arp packet",
            });
        }

        Ok(())
    }

    #[inline]
    fn validate_payload_default(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl ToLayer for ArpRef<'_> {
    type Owned = Arp;

    #[inline]
    fn to_layer(&self) -> Arp {
        Arp::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let arp = Arp::new(
            ArpOperation::Request,
            [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
            [10, 0, 0, 1],
            [0; 6],
            [10, 0, 0, 2],
        );
        let bytes = arp.to_bytes().unwrap();
        assert_eq!(bytes.len(), 28);
        assert!(ArpRef::validate(&bytes).is_ok());

        let parsed = ArpRef::from_bytes_unchecked(&bytes).to_layer();
        assert_eq!(parsed, arp);
    }

    #[test]
    fn truncated_address_region_is_invalid() {
        let arp = Arp::new(ArpOperation::Reply, [1; 6], [2; 4], [3; 6], [4; 4]);
        let bytes = arp.to_bytes().unwrap();
        let err = ArpRef::validate(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.class, ValidationErrorClass::InsufficientBytes);
    }
}
