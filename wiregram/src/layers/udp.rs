// SPDX-License-Identifier: MIT OR Apache-2.0

//! The User Datagram Protocol (UDP).
//!
//! ## Packet Layout
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |          Source Port          |        Destination Port       |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |             Length            |            Checksum           |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  8 Z                            Payload                            Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The UDP checksum is optional: a zero wire value means "no checksum",
//! so a *computed* checksum of zero is re-encoded as `0xFFFF`.

use crate::error::*;
use crate::layers::dhcp::{Dhcp, DhcpRef};
use crate::layers::dns::{Dns, DnsRef};
use crate::layers::ip::{Ipv4, Ipv4Protocol, Ipv6, DATA_PROTO_UDP};
use crate::layers::{Raw, RawRef};
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

const DNS_PORT: u16 = 53;
const DHCP_SERVER_PORT: u16 = 67;
const DHCP_CLIENT_PORT: u16 = 68;

/// A UDP datagram.
#[derive(Clone, Debug)]
pub struct Udp {
    sport: u16,
    dport: u16,
    chksum: Option<u16>,
    payload: Option<Box<dyn LayerObject>>,
}

impl Udp {
    /// Creates a datagram between the given ports, with the checksum
    /// computed at build time.
    pub fn new(sport: u16, dport: u16) -> Self {
        Udp {
            sport,
            dport,
            chksum: None,
            payload: None,
        }
    }

    #[inline]
    pub fn sport(&self) -> u16 {
        self.sport
    }

    #[inline]
    pub fn set_sport(&mut self, sport: u16) {
        self.sport = sport;
    }

    #[inline]
    pub fn dport(&self) -> u16 {
        self.dport
    }

    #[inline]
    pub fn set_dport(&mut self, dport: u16) {
        self.dport = dport;
    }

    /// The checksum explicitly assigned to the datagram (`Some(0)` means
    /// "no checksum"), or `None` if it is computed over the pseudo-header
    /// and payload at serialization time.
    #[inline]
    pub fn chksum(&self) -> Option<u16> {
        self.chksum
    }

    #[inline]
    pub fn set_chksum(&mut self, chksum: Option<u16>) {
        self.chksum = chksum;
    }
}

layer_identity!(Udp, UdpRef, "Udp");

impl PartialEq for Udp {
    fn eq(&self, other: &Self) -> bool {
        self.sport == other.sport
            && self.dport == other.dport
            && self.chksum == other.chksum
            && match (&self.payload, &other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => a.compare(b.as_ref()),
                _ => false,
            }
    }
}

impl LayerLength for Udp {
    #[inline]
    fn len(&self) -> usize {
        8 + self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl LayerObject for Udp {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn ip_payload_protocol(&self) -> Option<Ipv4Protocol> {
        Some(Ipv4Protocol::Udp)
    }

    #[inline]
    fn can_add_payload_default(&self, _payload: &dyn LayerObject) -> bool {
        true // any application protocol may be served over UDP
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

impl Layer for Udp {}

impl ToBytes for Udp {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();
        let length: u16 = self
            .len()
            .try_into()
            .map_err(|_| SerializationError::length_encoding(Udp::name()))?;

        bytes.extend(self.sport.to_be_bytes());
        bytes.extend(self.dport.to_be_bytes());
        bytes.extend(length.to_be_bytes());
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        match self.payload.as_ref() {
            None => (),
            Some(p) => p.to_bytes_checksummed(bytes, Some((Self::layer_id(), start)))?,
        }

        if self.chksum.is_none() {
            let Some((id, prev_idx)) = prev else {
                return Err(SerializationError::bad_upper_layer(Udp::name()));
            };

            let sum = if id == Ipv4::layer_id() {
                let mut data_chksum = utils::ones_complement_16bit(&bytes[start..]);
                let addr_chksum =
                    utils::ones_complement_16bit(&bytes[prev_idx + 12..prev_idx + 20]);
                data_chksum = utils::ones_complement_add(data_chksum, addr_chksum);
                data_chksum = utils::ones_complement_add(data_chksum, DATA_PROTO_UDP as u16);
                utils::ones_complement_add(data_chksum, length)
            } else if id == Ipv6::layer_id() {
                let mut data_chksum = utils::ones_complement_16bit(&bytes[start..]);
                let addr_chksum =
                    utils::ones_complement_16bit(&bytes[prev_idx + 8..prev_idx + 40]);
                data_chksum = utils::ones_complement_add(data_chksum, addr_chksum);
                data_chksum = utils::ones_complement_add(data_chksum, length);
                utils::ones_complement_add(data_chksum, DATA_PROTO_UDP as u16)
            } else {
                return Ok(()); // no pseudo-header available; leave "no checksum"
            };

            // A computed zero re-encodes as 0xFFFF to stay distinguishable
            // from "no checksum".
            let chksum = utils::fold_checksum(sum);
            bytes[start + 6..start + 8].copy_from_slice(&chksum.to_be_bytes());
        }

        Ok(())
    }
}

impl FromBytesCurrent for Udp {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let udp = UdpRef::from_bytes_unchecked(bytes);
        Udp {
            sport: udp.sport(),
            dport: udp.dport(),
            chksum: None,
            payload: None,
        }
    }

    fn payload_from_bytes_unchecked_default(&mut self, bytes: &[u8]) {
        let udp = UdpRef::from_bytes_unchecked(bytes);
        let payload = udp.payload().unwrap_or(&[]);
        let dns_port = self.sport == DNS_PORT || self.dport == DNS_PORT;
        let dhcp_port = [self.sport, self.dport]
            .iter()
            .any(|&p| p == DHCP_SERVER_PORT || p == DHCP_CLIENT_PORT);

        // Port numbers are only a heuristic; a payload shorter than the
        // fixed header of the inferred protocol stays raw.
        if payload.is_empty() {
            self.payload = None;
        } else if dns_port && payload.len() >= crate::layers::dns::DNS_HEADER_LEN {
            self.payload = Some(Box::new(Dns::from_bytes_unchecked(payload)));
        } else if dhcp_port && payload.len() >= crate::layers::dhcp::DHCP_FIXED_LEN + 4 {
            self.payload = Some(Box::new(Dhcp::from_bytes_unchecked(payload)));
        } else {
            self.payload = Some(Box::new(Raw::from_bytes_unchecked(payload)));
        }
    }
}

/// A view of a UDP datagram.
#[derive(Clone, Copy, Debug)]
pub struct UdpRef<'a> {
    data: &'a [u8],
}

impl<'a> UdpRef<'a> {
    #[inline]
    pub fn sport(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 0)
                .expect("insufficient bytes in Udp layer to retrieve Source Port field"),
        )
    }

    #[inline]
    pub fn dport(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 2)
                .expect("insufficient bytes in Udp layer to retrieve Destination Port field"),
        )
    }

    /// The datagram length declared in the UDP header (header plus
    /// payload).
    #[inline]
    pub fn packet_length(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 4)
                .expect("insufficient bytes in Udp layer to retrieve Length field"),
        )
    }

    /// The checksum of the datagram; zero means "no checksum".
    #[inline]
    pub fn chksum(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 6)
                .expect("insufficient bytes in Udp layer to retrieve Checksum field"),
        )
    }

    /// The payload bytes after the header, or `None` if the datagram is
    /// truncated before the end of its header.
    #[inline]
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.data.get(8..)
    }

    /// A view of the datagram's DNS payload, when a port declares one.
    #[inline]
    pub fn dns(&self) -> Option<DnsRef<'a>> {
        self.get_layer::<DnsRef>()
    }

    /// A view of the datagram's DHCP payload, when a port declares one.
    #[inline]
    pub fn dhcp(&self) -> Option<DhcpRef<'a>> {
        self.get_layer::<DhcpRef>()
    }
}

impl<'a> FromBytesRef<'a> for UdpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        UdpRef { data: bytes }
    }
}

impl LayerOffset for UdpRef<'_> {
    fn payload_byte_index_default(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() < 8 {
            return None;
        }
        let sport = utils::read_u16(bytes, 0, utils::Endianness::Big)?;
        let dport = utils::read_u16(bytes, 2, utils::Endianness::Big)?;

        if layer_type == DnsRef::layer_id() && (sport == DNS_PORT || dport == DNS_PORT) {
            Some(8)
        } else if layer_type == DhcpRef::layer_id()
            && [sport, dport]
                .iter()
                .any(|&p| p == DHCP_SERVER_PORT || p == DHCP_CLIENT_PORT)
        {
            Some(8)
        } else if layer_type == RawRef::layer_id() {
            Some(8)
        } else {
            None
        }
    }
}

impl Validate for UdpRef<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let Some(length) = utils::read_u16(curr_layer, 4, utils::Endianness::Big) else {
            return Err(ValidationError {
                layer: Udp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes in Udp header (8 bytes required)",
            });
        };
        let length = length as usize;

        match length.cmp(&curr_layer.len()) {
            core::cmp::Ordering::Greater => Err(ValidationError {
                layer: Udp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes for the length advertised by the Udp header",
            }),
            core::cmp::Ordering::Less => Err(ValidationError {
                layer: Udp::name(),
                class: ValidationErrorClass::ExcessBytes(curr_layer.len() - length),
                reason: "more bytes in packet than advertised by the Udp header length field",
            }),
            core::cmp::Ordering::Equal if length < 8 => Err(ValidationError {
                layer: Udp::name(),
                class: ValidationErrorClass::InvalidSize,
                reason: "length advertised by the Udp header smaller than the header itself",
            }),
            core::cmp::Ordering::Equal => Ok(()),
        }
    }

    fn validate_payload_default(curr_layer: &[u8]) -> Result<(), ValidationError> {
        let udp = UdpRef::from_bytes_unchecked(curr_layer);
        let Some(payload) = udp.payload() else {
            return Err(ValidationError {
                layer: Udp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "packet too short for Udp frame--insufficient bytes for header",
            });
        };
        if payload.is_empty() {
            return Ok(());
        }

        let sport = udp.sport();
        let dport = udp.dport();
        if sport == DNS_PORT || dport == DNS_PORT {
            DnsRef::validate(payload)
        } else if [sport, dport]
            .iter()
            .any(|&p| p == DHCP_SERVER_PORT || p == DHCP_CLIENT_PORT)
        {
            DhcpRef::validate(payload)
        } else {
            RawRef::validate(payload)
        }
    }
}

impl ToLayer for UdpRef<'_> {
    type Owned = Udp;

    #[inline]
    fn to_layer(&self) -> Udp {
        Udp::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_field_mismatch_is_detected() {
        let mut udp = Udp::new(1111, 2222);
        udp.set_chksum(Some(0));
        udp.set_payload_unchecked(Box::new(Raw::new(vec![1, 2, 3])));
        let bytes = udp.to_bytes().unwrap();
        assert_eq!(bytes.len(), 11);
        assert!(UdpRef::validate(&bytes).is_ok());

        let err = UdpRef::validate(&bytes[..10]).unwrap_err();
        assert_eq!(err.class, ValidationErrorClass::InsufficientBytes);
    }

    #[test]
    fn explicit_zero_checksum_means_absent() {
        let mut udp = Udp::new(5000, 5001);
        udp.set_chksum(Some(0));
        let bytes = udp.to_bytes().unwrap();
        assert_eq!(&bytes[6..8], &[0, 0]);
    }
}
