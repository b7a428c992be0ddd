// SPDX-License-Identifier: MIT OR Apache-2.0

//! The DNS message format (RFC 1035, with the OPT/SIG/KEY extensions in
//! [`resource`]).
//!
//! ## Message Layout
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |               ID              |QR| Opcode|AA|TC|RD|RA| Z |RCODE|
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |            QDCOUNT            |            ANCOUNT            |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  8 |            NSCOUNT            |            ARCOUNT            |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 12 Z   Question / Answer / Authority / Additional sections         Z
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The four sections are self-delimiting: each record's extent follows
//! from parsing its own fields, so locating section N requires
//! successfully consuming sections 1..N. A record that fails to parse
//! empties its section, and a section holding fewer records than its
//! declared count makes the whole datagram invalid - never a silent
//! truncation.

pub mod name;
pub mod resource;

use crate::error::*;
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

pub use self::name::{DnsName, DnsNameCompression, DnsNameCompressionMode};
pub use self::resource::{DnsClass, DnsQuery, DnsRecord, DnsResourceData, DnsType};

/// The number of bytes the DNS header takes.
pub const DNS_HEADER_LEN: usize = 12;

const MASK_IS_RESPONSE: u16 = 0x8000;
const MASK_OPCODE: u16 = 0x7800;
const MASK_IS_AUTHORITATIVE: u16 = 0x0400;
const MASK_IS_TRUNCATED: u16 = 0x0200;
const MASK_RECURSION_DESIRED: u16 = 0x0100;
const MASK_RECURSION_AVAILABLE: u16 = 0x0080;
const MASK_FUTURE_USE: u16 = 0x0070;
const MASK_RESPONSE_CODE: u16 = 0x000F;

const SHIFT_OPCODE: u16 = 11;
const SHIFT_FUTURE_USE: u16 = 4;

/// A DNS message.
#[derive(Clone, Debug)]
pub struct Dns {
    id: u16,
    is_response: bool,
    opcode: u8,
    is_authoritative_answer: bool,
    is_truncated: bool,
    is_recursion_desired: bool,
    is_recursion_available: bool,
    future_use: u8,
    response_code: u8,
    compression_mode: DnsNameCompressionMode,
    queries: Vec<DnsQuery>,
    answers: Vec<DnsRecord>,
    authorities: Vec<DnsRecord>,
    additionals: Vec<DnsRecord>,
}

impl Dns {
    /// Creates an empty query message with the given transaction id.
    pub fn new(id: u16) -> Self {
        Dns {
            id,
            is_response: false,
            opcode: 0,
            is_authoritative_answer: false,
            is_truncated: false,
            is_recursion_desired: false,
            is_recursion_available: false,
            future_use: 0,
            response_code: 0,
            compression_mode: DnsNameCompressionMode::default(),
            queries: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn set_id(&mut self, id: u16) {
        self.id = id;
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.is_response
    }

    #[inline]
    pub fn set_is_response(&mut self, is_response: bool) {
        self.is_response = is_response;
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Sets the 4-bit operation code.
    #[inline]
    pub fn set_opcode(&mut self, opcode: u8) {
        self.opcode = opcode & 0x0F;
    }

    #[inline]
    pub fn is_authoritative_answer(&self) -> bool {
        self.is_authoritative_answer
    }

    #[inline]
    pub fn set_is_authoritative_answer(&mut self, value: bool) {
        self.is_authoritative_answer = value;
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.is_truncated
    }

    #[inline]
    pub fn set_is_truncated(&mut self, value: bool) {
        self.is_truncated = value;
    }

    #[inline]
    pub fn is_recursion_desired(&self) -> bool {
        self.is_recursion_desired
    }

    #[inline]
    pub fn set_is_recursion_desired(&mut self, value: bool) {
        self.is_recursion_desired = value;
    }

    #[inline]
    pub fn is_recursion_available(&self) -> bool {
        self.is_recursion_available
    }

    #[inline]
    pub fn set_is_recursion_available(&mut self, value: bool) {
        self.is_recursion_available = value;
    }

    /// The 3 reserved header bits (Z).
    #[inline]
    pub fn future_use(&self) -> u8 {
        self.future_use
    }

    #[inline]
    pub fn response_code(&self) -> u8 {
        self.response_code
    }

    /// Sets the 4-bit response code.
    #[inline]
    pub fn set_response_code(&mut self, response_code: u8) {
        self.response_code = response_code & 0x0F;
    }

    /// The name compression mode used when serializing this message.
    /// Selected per message; it does not affect parsing and is not part
    /// of the message's value.
    #[inline]
    pub fn compression_mode(&self) -> DnsNameCompressionMode {
        self.compression_mode
    }

    #[inline]
    pub fn set_compression_mode(&mut self, mode: DnsNameCompressionMode) {
        self.compression_mode = mode;
    }

    #[inline]
    pub fn queries(&self) -> &[DnsQuery] {
        &self.queries
    }

    #[inline]
    pub fn queries_mut(&mut self) -> &mut Vec<DnsQuery> {
        &mut self.queries
    }

    #[inline]
    pub fn answers(&self) -> &[DnsRecord] {
        &self.answers
    }

    #[inline]
    pub fn answers_mut(&mut self) -> &mut Vec<DnsRecord> {
        &mut self.answers
    }

    #[inline]
    pub fn authorities(&self) -> &[DnsRecord] {
        &self.authorities
    }

    #[inline]
    pub fn authorities_mut(&mut self) -> &mut Vec<DnsRecord> {
        &mut self.authorities
    }

    #[inline]
    pub fn additionals(&self) -> &[DnsRecord] {
        &self.additionals
    }

    #[inline]
    pub fn additionals_mut(&mut self) -> &mut Vec<DnsRecord> {
        &mut self.additionals
    }

    fn flags_word(&self) -> u16 {
        let mut flags = 0;
        if self.is_response {
            flags |= MASK_IS_RESPONSE;
        }
        flags |= ((self.opcode as u16) << SHIFT_OPCODE) & MASK_OPCODE;
        if self.is_authoritative_answer {
            flags |= MASK_IS_AUTHORITATIVE;
        }
        if self.is_truncated {
            flags |= MASK_IS_TRUNCATED;
        }
        if self.is_recursion_desired {
            flags |= MASK_RECURSION_DESIRED;
        }
        if self.is_recursion_available {
            flags |= MASK_RECURSION_AVAILABLE;
        }
        flags |= ((self.future_use as u16) << SHIFT_FUTURE_USE) & MASK_FUTURE_USE;
        flags |= (self.response_code as u16) & MASK_RESPONSE_CODE;
        flags
    }

    /// Serializes the whole message. `dns_start` is the index in `bytes`
    /// where the message begins (compression offsets are relative to it).
    fn write_message(
        &self,
        bytes: &mut Vec<u8>,
        dns_start: usize,
    ) -> Result<(), SerializationError> {
        let count = |len: usize| -> Result<u16, SerializationError> {
            len.try_into()
                .map_err(|_| SerializationError::length_encoding(Dns::name()))
        };
        let qd = count(self.queries.len())?;
        let an = count(self.answers.len())?;
        let ns = count(self.authorities.len())?;
        let ar = count(self.additionals.len())?;

        bytes.extend(self.id.to_be_bytes());
        bytes.extend(self.flags_word().to_be_bytes());
        bytes.extend(qd.to_be_bytes());
        bytes.extend(an.to_be_bytes());
        bytes.extend(ns.to_be_bytes());
        bytes.extend(ar.to_be_bytes());

        let mut compression = DnsNameCompression::new(self.compression_mode);
        for query in &self.queries {
            let offset = bytes.len() - dns_start;
            query.name.write(bytes, offset, &mut compression);
            bytes.extend(query.query_type.0.to_be_bytes());
            bytes.extend(query.class.0.to_be_bytes());
        }
        for record in [&self.answers, &self.authorities, &self.additionals]
            .into_iter()
            .flatten()
        {
            let offset = bytes.len() - dns_start;
            record.name.write(bytes, offset, &mut compression);
            bytes.extend(record.record_type().0.to_be_bytes());
            bytes.extend(record.class.0.to_be_bytes());
            bytes.extend(record.ttl.to_be_bytes());
            record.data.write(bytes, dns_start, &mut compression)?;
        }

        Ok(())
    }
}

layer_identity!(Dns, DnsRef, "Dns");

impl PartialEq for Dns {
    /// The compression mode is a serialization directive, not message
    /// content, and is excluded from equality.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.is_response == other.is_response
            && self.opcode == other.opcode
            && self.is_authoritative_answer == other.is_authoritative_answer
            && self.is_truncated == other.is_truncated
            && self.is_recursion_desired == other.is_recursion_desired
            && self.is_recursion_available == other.is_recursion_available
            && self.future_use == other.future_use
            && self.response_code == other.response_code
            && self.queries == other.queries
            && self.answers == other.answers
            && self.authorities == other.authorities
            && self.additionals == other.additionals
    }
}

impl LayerLength for Dns {
    /// Measured by a full serialization pass: with name compression in
    /// play, the wire length depends on every suffix previously written.
    fn len(&self) -> usize {
        let mut bytes = Vec::new();
        match self.write_message(&mut bytes, 0) {
            Ok(()) => bytes.len(),
            Err(_) => DNS_HEADER_LEN,
        }
    }
}

impl LayerObject for Dns {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
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
        panic!("set_payload_unchecked() called on Dns layer, which cannot hold a payload")
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

impl Layer for Dns {}

impl ToBytes for Dns {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        let start = bytes.len();
        self.write_message(bytes, start)
    }
}

impl FromBytesCurrent for Dns {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let dns = DnsRef::from_bytes_unchecked(bytes);
        let sections = dns.parse_sections();
        Dns {
            id: dns.id(),
            is_response: dns.is_response(),
            opcode: dns.opcode(),
            is_authoritative_answer: dns.is_authoritative_answer(),
            is_truncated: dns.is_truncated(),
            is_recursion_desired: dns.is_recursion_desired(),
            is_recursion_available: dns.is_recursion_available(),
            future_use: dns.future_use(),
            response_code: dns.response_code(),
            compression_mode: DnsNameCompressionMode::default(),
            queries: sections.queries,
            answers: sections.answers,
            authorities: sections.authorities,
            additionals: sections.additionals,
        }
    }

    #[inline]
    fn payload_from_bytes_unchecked_default(&mut self, _bytes: &[u8]) {}
}

/// The four parsed sections of a DNS message. A section that failed to
/// parse (or was never reached because an earlier section failed) is
/// empty.
#[derive(Clone, Debug, Default)]
pub struct DnsSections {
    pub queries: Vec<DnsQuery>,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub additionals: Vec<DnsRecord>,
}

/// A view of a DNS message.
#[derive(Clone, Copy, Debug)]
pub struct DnsRef<'a> {
    data: &'a [u8],
}

impl<'a> DnsRef<'a> {
    /// The transaction id of the message.
    #[inline]
    pub fn id(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 0)
                .expect("insufficient bytes in Dns layer to retrieve ID field"),
        )
    }

    #[inline]
    fn flags_word(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 2)
                .expect("insufficient bytes in Dns layer to retrieve flags field"),
        )
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.flags_word() & MASK_IS_RESPONSE > 0
    }

    #[inline]
    pub fn is_query(&self) -> bool {
        !self.is_response()
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        ((self.flags_word() & MASK_OPCODE) >> SHIFT_OPCODE) as u8
    }

    #[inline]
    pub fn is_authoritative_answer(&self) -> bool {
        self.flags_word() & MASK_IS_AUTHORITATIVE > 0
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.flags_word() & MASK_IS_TRUNCATED > 0
    }

    #[inline]
    pub fn is_recursion_desired(&self) -> bool {
        self.flags_word() & MASK_RECURSION_DESIRED > 0
    }

    #[inline]
    pub fn is_recursion_available(&self) -> bool {
        self.flags_word() & MASK_RECURSION_AVAILABLE > 0
    }

    /// The 3 reserved header bits (Z).
    #[inline]
    pub fn future_use(&self) -> u8 {
        ((self.flags_word() & MASK_FUTURE_USE) >> SHIFT_FUTURE_USE) as u8
    }

    #[inline]
    pub fn response_code(&self) -> u8 {
        (self.flags_word() & MASK_RESPONSE_CODE) as u8
    }

    /// The declared query count (QDCOUNT).
    #[inline]
    pub fn query_count(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 4)
                .expect("insufficient bytes in Dns layer to retrieve Query Count field"),
        )
    }

    /// The declared answer count (ANCOUNT).
    #[inline]
    pub fn answer_count(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 6)
                .expect("insufficient bytes in Dns layer to retrieve Answer Count field"),
        )
    }

    /// The declared authority count (NSCOUNT).
    #[inline]
    pub fn authority_count(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 8)
                .expect("insufficient bytes in Dns layer to retrieve Authority Count field"),
        )
    }

    /// The declared additional count (ARCOUNT).
    #[inline]
    pub fn additional_count(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 10)
                .expect("insufficient bytes in Dns layer to retrieve Additional Count field"),
        )
    }

    /// The parsed query section, empty when it is malformed.
    #[inline]
    pub fn queries(&self) -> Vec<DnsQuery> {
        self.parse_sections().queries
    }

    /// The parsed answer section, empty when it (or any section before
    /// it) is malformed.
    #[inline]
    pub fn answers(&self) -> Vec<DnsRecord> {
        self.parse_sections().answers
    }

    /// The parsed authority section, empty when it (or any section before
    /// it) is malformed.
    #[inline]
    pub fn authorities(&self) -> Vec<DnsRecord> {
        self.parse_sections().authorities
    }

    /// The parsed additional section, empty when it (or any section
    /// before it) is malformed.
    #[inline]
    pub fn additionals(&self) -> Vec<DnsRecord> {
        self.parse_sections().additionals
    }

    /// Parses all four sections in order. Each section's start offset is
    /// where the previous section's last record ended, so a failure in
    /// one section also empties every later one.
    pub fn parse_sections(&self) -> DnsSections {
        let mut sections = DnsSections::default();
        self.parse_sections_checked(&mut sections);
        sections
    }

    /// Like [`parse_sections`](DnsRef::parse_sections), but reports
    /// whether every section held exactly its declared record count and,
    /// on success, the offset one past the final record.
    fn parse_sections_checked(&self, sections: &mut DnsSections) -> Option<usize> {
        if self.data.len() < DNS_HEADER_LEN {
            return None;
        }

        let mut offset = DNS_HEADER_LEN;

        let mut queries = Vec::new();
        for _ in 0..self.query_count() {
            let (query, consumed) = self.parse_query(offset)?;
            queries.push(query);
            offset += consumed;
        }
        sections.queries = queries;

        for (count, section) in [
            (self.answer_count(), &mut sections.answers),
            (self.authority_count(), &mut sections.authorities),
            (self.additional_count(), &mut sections.additionals),
        ] {
            let mut records = Vec::new();
            for _ in 0..count {
                let (record, consumed) = self.parse_record(offset)?;
                records.push(record);
                offset += consumed;
            }
            *section = records;
        }

        Some(offset)
    }

    fn parse_query(&self, offset: usize) -> Option<(DnsQuery, usize)> {
        let (name, name_len) = DnsName::try_parse(self.data, offset)?;
        let query_type = utils::read_u16(self.data, offset + name_len, utils::Endianness::Big)?;
        let class = utils::read_u16(self.data, offset + name_len + 2, utils::Endianness::Big)?;
        Some((
            DnsQuery::new(name, DnsType(query_type), DnsClass(class)),
            name_len + 4,
        ))
    }

    fn parse_record(&self, offset: usize) -> Option<(DnsRecord, usize)> {
        let (name, name_len) = DnsName::try_parse(self.data, offset)?;
        let fixed = offset + name_len;
        let record_type = DnsType(utils::read_u16(self.data, fixed, utils::Endianness::Big)?);
        let class = DnsClass(utils::read_u16(self.data, fixed + 2, utils::Endianness::Big)?);
        let ttl = utils::read_u32(self.data, fixed + 4, utils::Endianness::Big)?;
        let rdata_len = utils::read_u16(self.data, fixed + 8, utils::Endianness::Big)? as usize;
        let data = DnsResourceData::read(self.data, record_type, fixed + 10, rdata_len)?;
        Some((
            DnsRecord::new(name, class, ttl, data),
            name_len + 10 + rdata_len,
        ))
    }
}

impl<'a> FromBytesRef<'a> for DnsRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        DnsRef { data: bytes }
    }
}

impl LayerOffset for DnsRef<'_> {
    #[inline]
    fn payload_byte_index_default(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

impl Validate for DnsRef<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        if curr_layer.len() < DNS_HEADER_LEN {
            return Err(ValidationError {
                layer: Dns::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes in Dns header (12 bytes required)",
            });
        }

        let dns = DnsRef::from_bytes_unchecked(curr_layer);
        let mut sections = DnsSections::default();
        let Some(end) = dns.parse_sections_checked(&mut sections) else {
            return Err(ValidationError {
                layer: Dns::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "a Dns section held fewer parseable records than its declared count",
            });
        };

        if end < curr_layer.len() {
            return Err(ValidationError {
                layer: Dns::name(),
                class: ValidationErrorClass::ExcessBytes(curr_layer.len() - end),
                reason: "extra bytes remain past the final Dns record",
            });
        }

        Ok(())
    }

    #[inline]
    fn validate_payload_default(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl ToLayer for DnsRef<'_> {
    type Owned = Dns;

    #[inline]
    fn to_layer(&self) -> Dns {
        Dns::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Ipv4Address;
    use crate::layers::dns::resource::DnsSoa;

    fn name(s: &str) -> DnsName {
        s.parse().unwrap()
    }

    fn a_record(owner: &str, addr: [u8; 4]) -> DnsRecord {
        DnsRecord::new(
            name(owner),
            DnsClass::INTERNET,
            3600,
            DnsResourceData::A(Ipv4Address::from_octets(addr)),
        )
    }

    fn sample_response() -> Dns {
        let mut dns = Dns::new(0x1234);
        dns.set_is_response(true);
        dns.set_is_recursion_desired(true);
        dns.set_is_recursion_available(true);
        dns.queries_mut().push(DnsQuery::new(
            name("www.example.com"),
            DnsType::A,
            DnsClass::INTERNET,
        ));
        dns.answers_mut().push(a_record("www.example.com", [93, 184, 216, 34]));
        dns.answers_mut().push(DnsRecord::new(
            name("www.example.com"),
            DnsClass::INTERNET,
            3600,
            DnsResourceData::Cname(name("example.com")),
        ));
        dns.authorities_mut().push(DnsRecord::new(
            name("example.com"),
            DnsClass::INTERNET,
            86400,
            DnsResourceData::Soa(DnsSoa {
                primary_name_server: name("ns1.example.com"),
                responsible_mailbox: name("hostmaster.example.com"),
                serial: 1,
                refresh: 7200,
                retry: 3600,
                expire: 1_209_600,
                minimum_ttl: 300,
            }),
        ));
        dns
    }

    #[test]
    fn header_fields_round_trip() {
        let dns = sample_response();
        let bytes = dns.to_bytes().unwrap();
        let parsed = DnsRef::from_bytes_unchecked(&bytes);

        assert_eq!(parsed.id(), 0x1234);
        assert!(parsed.is_response());
        assert!(!parsed.is_authoritative_answer());
        assert!(parsed.is_recursion_desired());
        assert!(parsed.is_recursion_available());
        assert_eq!(parsed.opcode(), 0);
        assert_eq!(parsed.response_code(), 0);
        assert_eq!(parsed.query_count(), 1);
        assert_eq!(parsed.answer_count(), 2);
        assert_eq!(parsed.authority_count(), 1);
        assert_eq!(parsed.additional_count(), 0);
    }

    #[test]
    fn sections_round_trip_in_both_compression_modes() {
        let mut dns = sample_response();
        for mode in [DnsNameCompressionMode::All, DnsNameCompressionMode::Nothing] {
            dns.set_compression_mode(mode);
            let bytes = dns.to_bytes().unwrap();
            assert_eq!(bytes.len(), dns.len());
            assert!(DnsRef::validate(&bytes).is_ok());

            let extracted = DnsRef::from_bytes_unchecked(&bytes).to_layer();
            assert_eq!(extracted, dns);
        }
    }

    #[test]
    fn compression_never_grows_the_message() {
        let mut dns = sample_response();
        dns.set_compression_mode(DnsNameCompressionMode::Nothing);
        let uncompressed = dns.to_bytes().unwrap();
        dns.set_compression_mode(DnsNameCompressionMode::All);
        let compressed = dns.to_bytes().unwrap();

        assert!(compressed.len() <= uncompressed.len());

        // Both serializations parse to the same message.
        let a = DnsRef::from_bytes_unchecked(&compressed).to_layer();
        let b = DnsRef::from_bytes_unchecked(&uncompressed).to_layer();
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_answer_names_save_exact_pointer_bytes() {
        let mut dns = Dns::new(1);
        dns.set_is_response(true);
        dns.answers_mut().push(a_record("one.example.com", [1, 1, 1, 1]));
        dns.answers_mut().push(a_record("one.example.com", [2, 2, 2, 2]));

        dns.set_compression_mode(DnsNameCompressionMode::Nothing);
        let uncompressed = dns.to_bytes().unwrap();
        dns.set_compression_mode(DnsNameCompressionMode::All);
        let compressed = dns.to_bytes().unwrap();

        // The second owner name collapses from its 17 uncompressed bytes
        // to a 2-byte pointer.
        assert_eq!(uncompressed.len() - compressed.len(), 15);

        let extracted = DnsRef::from_bytes_unchecked(&compressed).to_layer();
        assert_eq!(extracted.answers().len(), 2);
        assert_eq!(extracted.answers()[0].name, name("one.example.com"));
        assert_eq!(extracted.answers()[1].name, name("one.example.com"));
    }

    #[test]
    fn under_filled_section_marks_datagram_invalid() {
        let dns = sample_response();
        let mut bytes = dns.to_bytes().unwrap();
        // Claim one more answer than the message holds. The answer
        // section swallows the authority record, and the authority
        // section then comes up short of its declared count.
        bytes[7] += 1;

        let err = DnsRef::validate(&bytes).unwrap_err();
        assert_eq!(err.class, ValidationErrorClass::InvalidValue);

        let parsed = DnsRef::from_bytes_unchecked(&bytes);
        assert_eq!(parsed.answers().len(), 3);
        assert!(parsed.authorities().is_empty());
    }

    #[test]
    fn truncation_never_panics() {
        let dns = sample_response();
        let bytes = dns.to_bytes().unwrap();
        for cut in 0..bytes.len() {
            let truncated = &bytes[..cut];
            let parsed = DnsRef::from_bytes_unchecked(truncated);
            let _ = parsed.parse_sections();
            assert!(DnsRef::validate(truncated).is_err());
        }
    }

    #[test]
    fn queries_chain_into_answer_offsets() {
        let dns = sample_response();
        let bytes = dns.to_bytes().unwrap();
        let parsed = DnsRef::from_bytes_unchecked(&bytes);

        let sections = parsed.parse_sections();
        assert_eq!(sections.queries.len(), 1);
        assert_eq!(sections.answers.len(), 2);
        assert_eq!(sections.authorities.len(), 1);
        assert_eq!(
            sections.answers[1].data,
            DnsResourceData::Cname(name("example.com"))
        );
    }
}
