// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Internet Group Management Protocol (IGMP), versions 1-3.
//!
//! All v1/v2 messages share the 8-byte layout below; the v3 membership
//! query extends it with querier fields and a source list, and the v3
//! membership report replaces it with a list of group records.
//!
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |      Type     | Max Resp Time |            Checksum           |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |                         Group Address                         |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::addr::Ipv4Address;
use crate::error::*;
use crate::layers::ip::Ipv4Protocol;
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

pub const IGMP_TYPE_MEMBERSHIP_QUERY: u8 = 0x11;
pub const IGMP_TYPE_MEMBERSHIP_REPORT_V1: u8 = 0x12;
pub const IGMP_TYPE_MEMBERSHIP_REPORT_V2: u8 = 0x16;
pub const IGMP_TYPE_LEAVE_GROUP: u8 = 0x17;
pub const IGMP_TYPE_MEMBERSHIP_REPORT_V3: u8 = 0x22;

/// One group record of an IGMPv3 membership report.
#[derive(Clone, Debug, PartialEq)]
pub struct IgmpGroupRecord {
    pub record_type: u8,
    pub multicast_address: Ipv4Address,
    pub sources: Vec<Ipv4Address>,
    /// Auxiliary data trailing the record, in whole 32-bit words.
    pub aux_data: Vec<u8>,
}

impl IgmpGroupRecord {
    fn byte_len(&self) -> usize {
        8 + 4 * self.sources.len() + self.aux_data.len()
    }
}

/// The message variants of IGMP versions 1 through 3.
#[derive(Clone, Debug, PartialEq)]
pub enum IgmpMessage {
    /// v1/v2 membership query (v1 queries carry a zero response time).
    MembershipQuery {
        max_response_time: u8,
        group_address: Ipv4Address,
    },
    /// v1 membership report.
    MembershipReportV1 { group_address: Ipv4Address },
    /// v2 membership report.
    MembershipReportV2 { group_address: Ipv4Address },
    /// v2 leave group.
    LeaveGroup { group_address: Ipv4Address },
    /// v3 membership query, RFC 3376.
    MembershipQueryV3 {
        max_response_code: u8,
        group_address: Ipv4Address,
        suppress_router_processing: bool,
        robustness_variable: u8,
        query_interval_code: u8,
        sources: Vec<Ipv4Address>,
    },
    /// v3 membership report, RFC 3376.
    MembershipReportV3 { records: Vec<IgmpGroupRecord> },
}

/// An IGMP message.
#[derive(Clone, Debug, PartialEq)]
pub struct Igmp {
    message: IgmpMessage,
    chksum: Option<u16>,
}

impl Igmp {
    pub fn new(message: IgmpMessage) -> Self {
        Igmp {
            message,
            chksum: None,
        }
    }

    #[inline]
    pub fn message(&self) -> &IgmpMessage {
        &self.message
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

    /// The wire type byte of the message.
    pub fn message_type(&self) -> u8 {
        match &self.message {
            IgmpMessage::MembershipQuery { .. } | IgmpMessage::MembershipQueryV3 { .. } => {
                IGMP_TYPE_MEMBERSHIP_QUERY
            }
            IgmpMessage::MembershipReportV1 { .. } => IGMP_TYPE_MEMBERSHIP_REPORT_V1,
            IgmpMessage::MembershipReportV2 { .. } => IGMP_TYPE_MEMBERSHIP_REPORT_V2,
            IgmpMessage::LeaveGroup { .. } => IGMP_TYPE_LEAVE_GROUP,
            IgmpMessage::MembershipReportV3 { .. } => IGMP_TYPE_MEMBERSHIP_REPORT_V3,
        }
    }
}

layer_identity!(Igmp, IgmpRef, "Igmp");

impl LayerLength for Igmp {
    fn len(&self) -> usize {
        match &self.message {
            IgmpMessage::MembershipQuery { .. }
            | IgmpMessage::MembershipReportV1 { .. }
            | IgmpMessage::MembershipReportV2 { .. }
            | IgmpMessage::LeaveGroup { .. } => 8,
            IgmpMessage::MembershipQueryV3 { sources, .. } => 12 + 4 * sources.len(),
            IgmpMessage::MembershipReportV3 { records } => {
                8 + records.iter().map(IgmpGroupRecord::byte_len).sum::<usize>()
            }
        }
    }
}

impl LayerObject for Igmp {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn ip_payload_protocol(&self) -> Option<Ipv4Protocol> {
        Some(Ipv4Protocol::Igmp)
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
        panic!("set_payload_unchecked() called on Igmp layer, which cannot hold a payload")
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

impl Layer for Igmp {}

impl ToBytes for Igmp {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();
        bytes.push(self.message_type());

        match &self.message {
            IgmpMessage::MembershipQuery {
                max_response_time,
                group_address,
            } => {
                bytes.push(*max_response_time);
                bytes.extend([0, 0]);
                bytes.extend(group_address.octets());
            }
            IgmpMessage::MembershipReportV1 { group_address }
            | IgmpMessage::MembershipReportV2 { group_address }
            | IgmpMessage::LeaveGroup { group_address } => {
                bytes.push(0);
                bytes.extend([0, 0]);
                bytes.extend(group_address.octets());
            }
            IgmpMessage::MembershipQueryV3 {
                max_response_code,
                group_address,
                suppress_router_processing,
                robustness_variable,
                query_interval_code,
                sources,
            } => {
                let source_count: u16 = sources
                    .len()
                    .try_into()
                    .map_err(|_| SerializationError::length_encoding(Igmp::name()))?;
                bytes.push(*max_response_code);
                bytes.extend([0, 0]);
                bytes.extend(group_address.octets());
                bytes.push(
                    ((*suppress_router_processing as u8) << 3) | (robustness_variable & 0x07),
                );
                bytes.push(*query_interval_code);
                bytes.extend(source_count.to_be_bytes());
                for source in sources {
                    bytes.extend(source.octets());
                }
            }
            IgmpMessage::MembershipReportV3 { records } => {
                let record_count: u16 = records
                    .len()
                    .try_into()
                    .map_err(|_| SerializationError::length_encoding(Igmp::name()))?;
                bytes.push(0);
                bytes.extend([0, 0]);
                bytes.extend([0, 0]);
                bytes.extend(record_count.to_be_bytes());
                for record in records {
                    if record.aux_data.len() % 4 != 0 {
                        return Err(SerializationError::invalid_field_value(Igmp::name()));
                    }
                    let source_count: u16 = record
                        .sources
                        .len()
                        .try_into()
                        .map_err(|_| SerializationError::length_encoding(Igmp::name()))?;
                    bytes.push(record.record_type);
                    bytes.push((record.aux_data.len() / 4) as u8);
                    bytes.extend(source_count.to_be_bytes());
                    bytes.extend(record.multicast_address.octets());
                    for source in &record.sources {
                        bytes.extend(source.octets());
                    }
                    bytes.extend(&record.aux_data);
                }
            }
        }

        if self.chksum.is_none() {
            let chksum = !utils::ones_complement_16bit(&bytes[start..]);
            bytes[start + 2..start + 4].copy_from_slice(&chksum.to_be_bytes());
        } else {
            let chksum = self.chksum.unwrap();
            bytes[start + 2..start + 4].copy_from_slice(&chksum.to_be_bytes());
        }

        Ok(())
    }
}

impl FromBytesCurrent for Igmp {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let igmp = IgmpRef::from_bytes_unchecked(bytes);
        Igmp {
            message: igmp.message().unwrap_or(IgmpMessage::MembershipQuery {
                max_response_time: 0,
                group_address: Ipv4Address::ZERO,
            }),
            chksum: None,
        }
    }

    #[inline]
    fn payload_from_bytes_unchecked_default(&mut self, _bytes: &[u8]) {}
}

/// A view of an IGMP message.
#[derive(Clone, Copy, Debug)]
pub struct IgmpRef<'a> {
    data: &'a [u8],
}

impl IgmpRef<'_> {
    #[inline]
    pub fn message_type(&self) -> u8 {
        *self
            .data
            .first()
            .expect("insufficient bytes in Igmp layer to retrieve Type field")
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 2)
                .expect("insufficient bytes in Igmp layer to retrieve Checksum field"),
        )
    }

    /// Whether the message checksum matches its contents.
    #[inline]
    pub fn is_checksum_correct(&self) -> bool {
        self.data.len() >= 8 && utils::ones_complement_16bit(self.data) == 0xFFFF
    }

    /// Decodes the message body, or `None` when it is malformed or
    /// truncated.
    pub fn message(&self) -> Option<IgmpMessage> {
        let message_type = *self.data.first()?;
        let group_address = Ipv4Address::from_octets(utils::to_array(self.data, 4)?);

        match message_type {
            IGMP_TYPE_MEMBERSHIP_QUERY if self.data.len() == 8 => {
                Some(IgmpMessage::MembershipQuery {
                    max_response_time: self.data[1],
                    group_address,
                })
            }
            IGMP_TYPE_MEMBERSHIP_QUERY => {
                let flags = *self.data.get(8)?;
                let query_interval_code = *self.data.get(9)?;
                let source_count = utils::read_u16(self.data, 10, utils::Endianness::Big)? as usize;
                let sources_bytes = self.data.get(12..12 + 4 * source_count)?;
                let sources = sources_bytes
                    .chunks_exact(4)
                    .map(|c| Ipv4Address::from_octets(c.try_into().unwrap()))
                    .collect();
                Some(IgmpMessage::MembershipQueryV3 {
                    max_response_code: self.data[1],
                    group_address,
                    suppress_router_processing: flags & 0x08 > 0,
                    robustness_variable: flags & 0x07,
                    query_interval_code,
                    sources,
                })
            }
            IGMP_TYPE_MEMBERSHIP_REPORT_V1 => {
                Some(IgmpMessage::MembershipReportV1 { group_address })
            }
            IGMP_TYPE_MEMBERSHIP_REPORT_V2 => {
                Some(IgmpMessage::MembershipReportV2 { group_address })
            }
            IGMP_TYPE_LEAVE_GROUP => Some(IgmpMessage::LeaveGroup { group_address }),
            IGMP_TYPE_MEMBERSHIP_REPORT_V3 => {
                let record_count = utils::read_u16(self.data, 6, utils::Endianness::Big)? as usize;
                let mut records = Vec::with_capacity(record_count);
                let mut offset = 8;
                for _ in 0..record_count {
                    let record_type = *self.data.get(offset)?;
                    let aux_len = *self.data.get(offset + 1)? as usize * 4;
                    let source_count =
                        utils::read_u16(self.data, offset + 2, utils::Endianness::Big)? as usize;
                    let multicast_address =
                        Ipv4Address::from_octets(utils::to_array(self.data, offset + 4)?);
                    let sources_bytes =
                        self.data.get(offset + 8..offset + 8 + 4 * source_count)?;
                    let sources = sources_bytes
                        .chunks_exact(4)
                        .map(|c| Ipv4Address::from_octets(c.try_into().unwrap()))
                        .collect();
                    let aux_start = offset + 8 + 4 * source_count;
                    let aux_data = self.data.get(aux_start..aux_start + aux_len)?.to_vec();
                    offset = aux_start + aux_len;
                    records.push(IgmpGroupRecord {
                        record_type,
                        multicast_address,
                        sources,
                        aux_data,
                    });
                }
                Some(IgmpMessage::MembershipReportV3 { records })
            }
            _ => None,
        }
    }
}

impl<'a> FromBytesRef<'a> for IgmpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        IgmpRef { data: bytes }
    }
}

impl LayerOffset for IgmpRef<'_> {
    #[inline]
    fn payload_byte_index_default(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

impl Validate for IgmpRef<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        if curr_layer.len() < 8 {
            return Err(ValidationError {
                layer: Igmp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes in Igmp message (8 bytes required)",
            });
        }

        let igmp = IgmpRef::from_bytes_unchecked(curr_layer);
        if igmp.message().is_none() {
            return Err(ValidationError {
                layer: Igmp::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "unrecognized or malformed Igmp message body",
            });
        }

        if !igmp.is_checksum_correct() {
            return Err(ValidationError {
                layer: Igmp::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "incorrect checksum in Igmp message",
            });
        }

        Ok(())
    }

    #[inline]
    fn validate_payload_default(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl ToLayer for IgmpRef<'_> {
    type Owned = Igmp;

    #[inline]
    fn to_layer(&self) -> Igmp {
        Igmp::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_query_round_trip() {
        let igmp = Igmp::new(IgmpMessage::MembershipQuery {
            max_response_time: 100,
            group_address: Ipv4Address::from_octets([224, 0, 0, 1]),
        });
        let bytes = igmp.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8);
        assert!(IgmpRef::validate(&bytes).is_ok());
        assert_eq!(IgmpRef::from_bytes_unchecked(&bytes).to_layer(), igmp);
    }

    #[test]
    fn v3_report_round_trip() {
        let igmp = Igmp::new(IgmpMessage::MembershipReportV3 {
            records: vec![IgmpGroupRecord {
                record_type: 2,
                multicast_address: Ipv4Address::from_octets([239, 1, 2, 3]),
                sources: vec![
                    Ipv4Address::from_octets([10, 0, 0, 1]),
                    Ipv4Address::from_octets([10, 0, 0, 2]),
                ],
                aux_data: Vec::new(),
            }],
        });
        let bytes = igmp.to_bytes().unwrap();
        assert!(IgmpRef::validate(&bytes).is_ok());
        assert_eq!(IgmpRef::from_bytes_unchecked(&bytes).to_layer(), igmp);
    }

    #[test]
    fn v3_query_with_sources_round_trip() {
        let igmp = Igmp::new(IgmpMessage::MembershipQueryV3 {
            max_response_code: 0x32,
            group_address: Ipv4Address::from_octets([224, 0, 0, 22]),
            suppress_router_processing: true,
            robustness_variable: 2,
            query_interval_code: 125,
            sources: vec![Ipv4Address::from_octets([192, 168, 1, 1])],
        });
        let bytes = igmp.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(IgmpRef::from_bytes_unchecked(&bytes).to_layer(), igmp);
    }
}
