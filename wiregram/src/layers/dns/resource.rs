// SPDX-License-Identifier: MIT OR Apache-2.0

//! DNS resource records and their typed payloads.
//!
//! [`DnsResourceData`] is the closed family of RDATA payload decoders,
//! keyed by [`DnsType`]; [`DnsResourceData::read`] is the dispatch table.
//! Unrecognized types fall back to [`DnsResourceData::Unknown`], which
//! preserves the raw bytes. Payload types defined by RFC 1035 participate
//! in the enclosing message's name compression when written; later types
//! write their embedded names in full.

use crate::addr::{Ipv4Address, Ipv6Address};
use crate::error::SerializationError;

use super::name::{DnsName, DnsNameCompression};

/// A DNS record type tag (the RR TYPE field).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DnsType(pub u16);

impl DnsType {
    pub const A: DnsType = DnsType(1);
    pub const NS: DnsType = DnsType(2);
    pub const MD: DnsType = DnsType(3);
    pub const MF: DnsType = DnsType(4);
    pub const CNAME: DnsType = DnsType(5);
    pub const SOA: DnsType = DnsType(6);
    pub const MB: DnsType = DnsType(7);
    pub const MG: DnsType = DnsType(8);
    pub const MR: DnsType = DnsType(9);
    pub const NULL: DnsType = DnsType(10);
    pub const WKS: DnsType = DnsType(11);
    pub const PTR: DnsType = DnsType(12);
    pub const HINFO: DnsType = DnsType(13);
    pub const MINFO: DnsType = DnsType(14);
    pub const MX: DnsType = DnsType(15);
    pub const TXT: DnsType = DnsType(16);
    pub const RP: DnsType = DnsType(17);
    pub const AFSDB: DnsType = DnsType(18);
    pub const X25: DnsType = DnsType(19);
    pub const ISDN: DnsType = DnsType(20);
    pub const RT: DnsType = DnsType(21);
    pub const SIG: DnsType = DnsType(24);
    pub const KEY: DnsType = DnsType(25);
    pub const AAAA: DnsType = DnsType(28);
    pub const SRV: DnsType = DnsType(33);
    pub const KX: DnsType = DnsType(36);
    pub const OPT: DnsType = DnsType(41);
    pub const DS: DnsType = DnsType(43);
    pub const NSEC: DnsType = DnsType(47);
    /// Query-only: any type.
    pub const ANY: DnsType = DnsType(255);
}

/// A DNS record class (the RR CLASS field).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DnsClass(pub u16);

impl DnsClass {
    pub const INTERNET: DnsClass = DnsClass(1);
    pub const CHAOS: DnsClass = DnsClass(3);
    pub const HESIOD: DnsClass = DnsClass(4);
    pub const NONE: DnsClass = DnsClass(254);
    pub const ANY: DnsClass = DnsClass(255);
}

/// A query record: a name, a queried type, and a class. Query records
/// never carry a TTL or payload, by construction.
#[derive(Clone, Debug, PartialEq)]
pub struct DnsQuery {
    pub name: DnsName,
    pub query_type: DnsType,
    pub class: DnsClass,
}

impl DnsQuery {
    pub fn new(name: DnsName, query_type: DnsType, class: DnsClass) -> Self {
        DnsQuery {
            name,
            query_type,
            class,
        }
    }
}

/// A data-bearing resource record, as found in the answer, authority and
/// additional sections: a name, class and TTL plus a typed payload.
///
/// The record's TYPE field is derived from the payload, so the two can
/// never disagree.
#[derive(Clone, Debug, PartialEq)]
pub struct DnsRecord {
    pub name: DnsName,
    pub class: DnsClass,
    pub ttl: u32,
    pub data: DnsResourceData,
}

impl DnsRecord {
    pub fn new(name: DnsName, class: DnsClass, ttl: u32, data: DnsResourceData) -> Self {
        DnsRecord {
            name,
            class,
            ttl,
            data,
        }
    }

    /// The wire TYPE tag of the record.
    #[inline]
    pub fn record_type(&self) -> DnsType {
        self.data.record_type()
    }
}

/// The start-of-authority payload (RFC 1035 §3.3.13).
#[derive(Clone, Debug, PartialEq)]
pub struct DnsSoa {
    pub primary_name_server: DnsName,
    pub responsible_mailbox: DnsName,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum_ttl: u32,
}

/// The signature payload shared by SIG (RFC 2535) records.
#[derive(Clone, Debug, PartialEq)]
pub struct DnsSig {
    pub type_covered: DnsType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer: DnsName,
    pub signature: Vec<u8>,
}

/// One EDNS0 option of an OPT pseudo-record (RFC 6891).
#[derive(Clone, Debug, PartialEq)]
pub struct DnsOptOption {
    pub code: u16,
    pub data: Vec<u8>,
}

/// The typed RDATA payload of a resource record.
#[derive(Clone, Debug, PartialEq)]
pub enum DnsResourceData {
    /// A host address (A).
    A(Ipv4Address),
    /// An authoritative name server (NS).
    Ns(DnsName),
    /// A mail destination, obsolete (MD).
    Md(DnsName),
    /// A mail forwarder, obsolete (MF).
    Mf(DnsName),
    /// The canonical name for an alias (CNAME).
    Cname(DnsName),
    /// Start of a zone of authority (SOA).
    Soa(DnsSoa),
    /// A mailbox domain name (MB).
    Mb(DnsName),
    /// A mail group member (MG).
    Mg(DnsName),
    /// A mail rename domain name (MR).
    Mr(DnsName),
    /// A domain name pointer (PTR).
    Ptr(DnsName),
    /// Host information (HINFO).
    Hinfo { cpu: Vec<u8>, os: Vec<u8> },
    /// Mailbox or mail list information (MINFO).
    Minfo {
        mailbox: DnsName,
        error_mailbox: DnsName,
    },
    /// Mail exchange (MX).
    Mx { preference: u16, exchange: DnsName },
    /// Text strings (TXT).
    Txt(Vec<Vec<u8>>),
    /// Responsible person (RP, RFC 1183).
    Rp {
        mailbox: DnsName,
        txt_domain: DnsName,
    },
    /// AFS database location (AFSDB, RFC 1183).
    Afsdb { subtype: u16, hostname: DnsName },
    /// X.25 PSDN address (RFC 1183).
    X25(Vec<u8>),
    /// ISDN address (RFC 1183).
    Isdn {
        address: Vec<u8>,
        subaddress: Option<Vec<u8>>,
    },
    /// Route through (RT, RFC 1183).
    Rt {
        preference: u16,
        intermediate: DnsName,
    },
    /// A security signature (SIG, RFC 2535).
    Sig(DnsSig),
    /// A security key (KEY, RFC 2535).
    Key {
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: Vec<u8>,
    },
    /// An IPv6 host address (AAAA, RFC 3596).
    Aaaa(Ipv6Address),
    /// Server selection (SRV, RFC 2782).
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: DnsName,
    },
    /// Key exchanger (KX, RFC 2230).
    Kx { preference: u16, exchanger: DnsName },
    /// EDNS0 options (OPT pseudo-record, RFC 6891).
    Opt(Vec<DnsOptOption>),
    /// Delegation signer (DS, RFC 4034).
    Ds {
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: Vec<u8>,
    },
    /// Next secure record (NSEC, RFC 4034). The type bitmaps are kept in
    /// their wire form.
    Nsec {
        next_domain: DnsName,
        type_bitmaps: Vec<u8>,
    },
    /// The raw payload of an unrecognized record type.
    Unknown { record_type: DnsType, data: Vec<u8> },
}

/// Reads a `<character-string>`: a length byte followed by that many
/// bytes.
fn read_character_string(data: &[u8], offset: &mut usize) -> Option<Vec<u8>> {
    let length = *data.get(*offset)? as usize;
    let string = data.get(*offset + 1..*offset + 1 + length)?;
    *offset += 1 + length;
    Some(string.to_vec())
}

fn write_character_string(bytes: &mut Vec<u8>, string: &[u8]) -> Result<(), SerializationError> {
    let length: u8 = string
        .len()
        .try_into()
        .map_err(|_| SerializationError::length_encoding("Dns"))?;
    bytes.push(length);
    bytes.extend_from_slice(string);
    Ok(())
}

impl DnsResourceData {
    /// The wire TYPE tag this payload is carried under.
    pub fn record_type(&self) -> DnsType {
        match self {
            DnsResourceData::A(_) => DnsType::A,
            DnsResourceData::Ns(_) => DnsType::NS,
            DnsResourceData::Md(_) => DnsType::MD,
            DnsResourceData::Mf(_) => DnsType::MF,
            DnsResourceData::Cname(_) => DnsType::CNAME,
            DnsResourceData::Soa(_) => DnsType::SOA,
            DnsResourceData::Mb(_) => DnsType::MB,
            DnsResourceData::Mg(_) => DnsType::MG,
            DnsResourceData::Mr(_) => DnsType::MR,
            DnsResourceData::Ptr(_) => DnsType::PTR,
            DnsResourceData::Hinfo { .. } => DnsType::HINFO,
            DnsResourceData::Minfo { .. } => DnsType::MINFO,
            DnsResourceData::Mx { .. } => DnsType::MX,
            DnsResourceData::Txt(_) => DnsType::TXT,
            DnsResourceData::Rp { .. } => DnsType::RP,
            DnsResourceData::Afsdb { .. } => DnsType::AFSDB,
            DnsResourceData::X25(_) => DnsType::X25,
            DnsResourceData::Isdn { .. } => DnsType::ISDN,
            DnsResourceData::Rt { .. } => DnsType::RT,
            DnsResourceData::Sig(_) => DnsType::SIG,
            DnsResourceData::Key { .. } => DnsType::KEY,
            DnsResourceData::Aaaa(_) => DnsType::AAAA,
            DnsResourceData::Srv { .. } => DnsType::SRV,
            DnsResourceData::Kx { .. } => DnsType::KX,
            DnsResourceData::Opt(_) => DnsType::OPT,
            DnsResourceData::Ds { .. } => DnsType::DS,
            DnsResourceData::Nsec { .. } => DnsType::NSEC,
            DnsResourceData::Unknown { record_type, .. } => *record_type,
        }
    }

    /// Decodes the RDATA of a record of type `record_type` spanning
    /// `message[offset..offset + length]`.
    ///
    /// `message` is the whole DNS message so embedded compression
    /// pointers can resolve against everything before the record.
    /// Returns `None` when the payload is malformed for its type or does
    /// not consume exactly `length` bytes.
    pub(crate) fn read(
        message: &[u8],
        record_type: DnsType,
        offset: usize,
        length: usize,
    ) -> Option<DnsResourceData> {
        let data = message.get(offset..offset + length)?;

        let parse_name = |at: usize| -> Option<(DnsName, usize)> {
            let (name, consumed) = DnsName::try_parse(message, offset + at)?;
            if at + consumed > length {
                return None;
            }
            Some((name, consumed))
        };
        let parse_single_name = || -> Option<DnsName> {
            let (name, consumed) = parse_name(0)?;
            (consumed == length).then_some(name)
        };

        let parsed = match record_type {
            DnsType::A => {
                if length != 4 {
                    return None;
                }
                DnsResourceData::A(Ipv4Address::from_octets(data.try_into().unwrap()))
            }
            DnsType::NS => DnsResourceData::Ns(parse_single_name()?),
            DnsType::MD => DnsResourceData::Md(parse_single_name()?),
            DnsType::MF => DnsResourceData::Mf(parse_single_name()?),
            DnsType::CNAME => DnsResourceData::Cname(parse_single_name()?),
            DnsType::SOA => {
                let (primary_name_server, first) = parse_name(0)?;
                let (responsible_mailbox, second) = parse_name(first)?;
                if first + second + 20 != length {
                    return None;
                }
                let fixed = &data[first + second..];
                DnsResourceData::Soa(DnsSoa {
                    primary_name_server,
                    responsible_mailbox,
                    serial: u32::from_be_bytes(fixed[0..4].try_into().unwrap()),
                    refresh: u32::from_be_bytes(fixed[4..8].try_into().unwrap()),
                    retry: u32::from_be_bytes(fixed[8..12].try_into().unwrap()),
                    expire: u32::from_be_bytes(fixed[12..16].try_into().unwrap()),
                    minimum_ttl: u32::from_be_bytes(fixed[16..20].try_into().unwrap()),
                })
            }
            DnsType::MB => DnsResourceData::Mb(parse_single_name()?),
            DnsType::MG => DnsResourceData::Mg(parse_single_name()?),
            DnsType::MR => DnsResourceData::Mr(parse_single_name()?),
            DnsType::PTR => DnsResourceData::Ptr(parse_single_name()?),
            DnsType::HINFO => {
                let mut at = 0;
                let cpu = read_character_string(data, &mut at)?;
                let os = read_character_string(data, &mut at)?;
                if at != length {
                    return None;
                }
                DnsResourceData::Hinfo { cpu, os }
            }
            DnsType::MINFO => {
                let (mailbox, first) = parse_name(0)?;
                let (error_mailbox, second) = parse_name(first)?;
                if first + second != length {
                    return None;
                }
                DnsResourceData::Minfo {
                    mailbox,
                    error_mailbox,
                }
            }
            DnsType::MX => {
                let preference = u16::from_be_bytes(data.get(0..2)?.try_into().unwrap());
                let (exchange, consumed) = parse_name(2)?;
                if 2 + consumed != length {
                    return None;
                }
                DnsResourceData::Mx {
                    preference,
                    exchange,
                }
            }
            DnsType::TXT => {
                let mut at = 0;
                let mut strings = Vec::new();
                while at < length {
                    strings.push(read_character_string(data, &mut at)?);
                }
                DnsResourceData::Txt(strings)
            }
            DnsType::RP => {
                let (mailbox, first) = parse_name(0)?;
                let (txt_domain, second) = parse_name(first)?;
                if first + second != length {
                    return None;
                }
                DnsResourceData::Rp {
                    mailbox,
                    txt_domain,
                }
            }
            DnsType::AFSDB => {
                let subtype = u16::from_be_bytes(data.get(0..2)?.try_into().unwrap());
                let (hostname, consumed) = parse_name(2)?;
                if 2 + consumed != length {
                    return None;
                }
                DnsResourceData::Afsdb { subtype, hostname }
            }
            DnsType::X25 => {
                let mut at = 0;
                let address = read_character_string(data, &mut at)?;
                if at != length {
                    return None;
                }
                DnsResourceData::X25(address)
            }
            DnsType::ISDN => {
                let mut at = 0;
                let address = read_character_string(data, &mut at)?;
                let subaddress = if at < length {
                    Some(read_character_string(data, &mut at)?)
                } else {
                    None
                };
                if at != length {
                    return None;
                }
                DnsResourceData::Isdn {
                    address,
                    subaddress,
                }
            }
            DnsType::RT => {
                let preference = u16::from_be_bytes(data.get(0..2)?.try_into().unwrap());
                let (intermediate, consumed) = parse_name(2)?;
                if 2 + consumed != length {
                    return None;
                }
                DnsResourceData::Rt {
                    preference,
                    intermediate,
                }
            }
            DnsType::SIG => {
                if length < 18 {
                    return None;
                }
                let (signer, consumed) = parse_name(18)?;
                let signature = data.get(18 + consumed..)?.to_vec();
                DnsResourceData::Sig(DnsSig {
                    type_covered: DnsType(u16::from_be_bytes(data[0..2].try_into().unwrap())),
                    algorithm: data[2],
                    labels: data[3],
                    original_ttl: u32::from_be_bytes(data[4..8].try_into().unwrap()),
                    expiration: u32::from_be_bytes(data[8..12].try_into().unwrap()),
                    inception: u32::from_be_bytes(data[12..16].try_into().unwrap()),
                    key_tag: u16::from_be_bytes(data[16..18].try_into().unwrap()),
                    signer,
                    signature,
                })
            }
            DnsType::KEY => {
                if length < 4 {
                    return None;
                }
                DnsResourceData::Key {
                    flags: u16::from_be_bytes(data[0..2].try_into().unwrap()),
                    protocol: data[2],
                    algorithm: data[3],
                    public_key: data[4..].to_vec(),
                }
            }
            DnsType::AAAA => {
                if length != 16 {
                    return None;
                }
                DnsResourceData::Aaaa(Ipv6Address(data.try_into().unwrap()))
            }
            DnsType::SRV => {
                if length < 6 {
                    return None;
                }
                let (target, consumed) = parse_name(6)?;
                if 6 + consumed != length {
                    return None;
                }
                DnsResourceData::Srv {
                    priority: u16::from_be_bytes(data[0..2].try_into().unwrap()),
                    weight: u16::from_be_bytes(data[2..4].try_into().unwrap()),
                    port: u16::from_be_bytes(data[4..6].try_into().unwrap()),
                    target,
                }
            }
            DnsType::KX => {
                let preference = u16::from_be_bytes(data.get(0..2)?.try_into().unwrap());
                let (exchanger, consumed) = parse_name(2)?;
                if 2 + consumed != length {
                    return None;
                }
                DnsResourceData::Kx {
                    preference,
                    exchanger,
                }
            }
            DnsType::OPT => {
                let mut at = 0;
                let mut options = Vec::new();
                while at < length {
                    let code = u16::from_be_bytes(data.get(at..at + 2)?.try_into().unwrap());
                    let option_len =
                        u16::from_be_bytes(data.get(at + 2..at + 4)?.try_into().unwrap()) as usize;
                    let option_data = data.get(at + 4..at + 4 + option_len)?.to_vec();
                    at += 4 + option_len;
                    options.push(DnsOptOption {
                        code,
                        data: option_data,
                    });
                }
                DnsResourceData::Opt(options)
            }
            DnsType::DS => {
                if length < 4 {
                    return None;
                }
                DnsResourceData::Ds {
                    key_tag: u16::from_be_bytes(data[0..2].try_into().unwrap()),
                    algorithm: data[2],
                    digest_type: data[3],
                    digest: data[4..].to_vec(),
                }
            }
            DnsType::NSEC => {
                let (next_domain, consumed) = parse_name(0)?;
                let type_bitmaps = data.get(consumed..)?.to_vec();
                DnsResourceData::Nsec {
                    next_domain,
                    type_bitmaps,
                }
            }
            _ => DnsResourceData::Unknown {
                record_type,
                data: data.to_vec(),
            },
        };

        Some(parsed)
    }

    /// Appends the 16-bit RDLENGTH field followed by the encoded RDATA.
    ///
    /// The data is written first and the length backfilled, since
    /// compressed names make the length knowable only after the fact.
    /// `dns_start` is the index in `bytes` where the DNS message begins;
    /// compression offsets are relative to it.
    pub(crate) fn write(
        &self,
        bytes: &mut Vec<u8>,
        dns_start: usize,
        compression: &mut DnsNameCompression,
    ) -> Result<(), SerializationError> {
        let length_at = bytes.len();
        bytes.extend([0, 0]);
        let data_start = bytes.len();

        let mut write_compressed_name = |bytes: &mut Vec<u8>, name: &DnsName| {
            let offset_in_message = bytes.len() - dns_start;
            name.write(bytes, offset_in_message, compression);
        };

        match self {
            DnsResourceData::A(addr) => bytes.extend(addr.octets()),
            DnsResourceData::Ns(name)
            | DnsResourceData::Md(name)
            | DnsResourceData::Mf(name)
            | DnsResourceData::Cname(name)
            | DnsResourceData::Mb(name)
            | DnsResourceData::Mg(name)
            | DnsResourceData::Mr(name)
            | DnsResourceData::Ptr(name) => write_compressed_name(bytes, name),
            DnsResourceData::Soa(soa) => {
                write_compressed_name(bytes, &soa.primary_name_server);
                write_compressed_name(bytes, &soa.responsible_mailbox);
                bytes.extend(soa.serial.to_be_bytes());
                bytes.extend(soa.refresh.to_be_bytes());
                bytes.extend(soa.retry.to_be_bytes());
                bytes.extend(soa.expire.to_be_bytes());
                bytes.extend(soa.minimum_ttl.to_be_bytes());
            }
            DnsResourceData::Hinfo { cpu, os } => {
                write_character_string(bytes, cpu)?;
                write_character_string(bytes, os)?;
            }
            DnsResourceData::Minfo {
                mailbox,
                error_mailbox,
            } => {
                write_compressed_name(bytes, mailbox);
                write_compressed_name(bytes, error_mailbox);
            }
            DnsResourceData::Mx {
                preference,
                exchange,
            } => {
                bytes.extend(preference.to_be_bytes());
                write_compressed_name(bytes, exchange);
            }
            DnsResourceData::Txt(strings) => {
                for string in strings {
                    write_character_string(bytes, string)?;
                }
            }
            DnsResourceData::Rp {
                mailbox,
                txt_domain,
            } => {
                write_compressed_name(bytes, mailbox);
                write_compressed_name(bytes, txt_domain);
            }
            DnsResourceData::Afsdb { subtype, hostname } => {
                bytes.extend(subtype.to_be_bytes());
                write_compressed_name(bytes, hostname);
            }
            DnsResourceData::X25(address) => write_character_string(bytes, address)?,
            DnsResourceData::Isdn {
                address,
                subaddress,
            } => {
                write_character_string(bytes, address)?;
                if let Some(subaddress) = subaddress {
                    write_character_string(bytes, subaddress)?;
                }
            }
            DnsResourceData::Rt {
                preference,
                intermediate,
            } => {
                bytes.extend(preference.to_be_bytes());
                write_compressed_name(bytes, intermediate);
            }
            DnsResourceData::Sig(sig) => {
                bytes.extend(sig.type_covered.0.to_be_bytes());
                bytes.push(sig.algorithm);
                bytes.push(sig.labels);
                bytes.extend(sig.original_ttl.to_be_bytes());
                bytes.extend(sig.expiration.to_be_bytes());
                bytes.extend(sig.inception.to_be_bytes());
                bytes.extend(sig.key_tag.to_be_bytes());
                sig.signer.write_uncompressed(bytes);
                bytes.extend_from_slice(&sig.signature);
            }
            DnsResourceData::Key {
                flags,
                protocol,
                algorithm,
                public_key,
            } => {
                bytes.extend(flags.to_be_bytes());
                bytes.push(*protocol);
                bytes.push(*algorithm);
                bytes.extend_from_slice(public_key);
            }
            DnsResourceData::Aaaa(addr) => bytes.extend(addr.octets()),
            DnsResourceData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                bytes.extend(priority.to_be_bytes());
                bytes.extend(weight.to_be_bytes());
                bytes.extend(port.to_be_bytes());
                target.write_uncompressed(bytes);
            }
            DnsResourceData::Kx {
                preference,
                exchanger,
            } => {
                bytes.extend(preference.to_be_bytes());
                write_compressed_name(bytes, exchanger);
            }
            DnsResourceData::Opt(options) => {
                for option in options {
                    let option_len: u16 = option
                        .data
                        .len()
                        .try_into()
                        .map_err(|_| SerializationError::length_encoding("Dns"))?;
                    bytes.extend(option.code.to_be_bytes());
                    bytes.extend(option_len.to_be_bytes());
                    bytes.extend_from_slice(&option.data);
                }
            }
            DnsResourceData::Ds {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => {
                bytes.extend(key_tag.to_be_bytes());
                bytes.push(*algorithm);
                bytes.push(*digest_type);
                bytes.extend_from_slice(digest);
            }
            DnsResourceData::Nsec {
                next_domain,
                type_bitmaps,
            } => {
                next_domain.write_uncompressed(bytes);
                bytes.extend_from_slice(type_bitmaps);
            }
            DnsResourceData::Unknown { data, .. } => bytes.extend_from_slice(data),
        }

        let data_len: u16 = (bytes.len() - data_start)
            .try_into()
            .map_err(|_| SerializationError::length_encoding("Dns"))?;
        bytes[length_at..length_at + 2].copy_from_slice(&data_len.to_be_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::dns::name::DnsNameCompressionMode;

    fn name(s: &str) -> DnsName {
        s.parse().unwrap()
    }

    fn round_trip(data: DnsResourceData) {
        let mut compression = DnsNameCompression::new(DnsNameCompressionMode::All);
        let mut bytes = Vec::new();
        data.write(&mut bytes, 0, &mut compression).unwrap();

        let length = u16::from_be_bytes(bytes[0..2].try_into().unwrap()) as usize;
        assert_eq!(length, bytes.len() - 2);

        let parsed = DnsResourceData::read(&bytes, data.record_type(), 2, length).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn fixed_payloads_round_trip() {
        round_trip(DnsResourceData::A(Ipv4Address::from_octets([1, 2, 3, 4])));
        round_trip(DnsResourceData::Aaaa(Ipv6Address([7; 16])));
        round_trip(DnsResourceData::Hinfo {
            cpu: b"VAX".to_vec(),
            os: b"UNIX".to_vec(),
        });
        round_trip(DnsResourceData::Txt(vec![
            b"hello".to_vec(),
            b"world".to_vec(),
        ]));
        round_trip(DnsResourceData::Ds {
            key_tag: 60485,
            algorithm: 5,
            digest_type: 1,
            digest: vec![0xAB; 20],
        });
    }

    #[test]
    fn name_bearing_payloads_round_trip() {
        round_trip(DnsResourceData::Cname(name("alias.example.com")));
        round_trip(DnsResourceData::Mx {
            preference: 10,
            exchange: name("mail.example.com"),
        });
        round_trip(DnsResourceData::Soa(DnsSoa {
            primary_name_server: name("ns1.example.com"),
            responsible_mailbox: name("hostmaster.example.com"),
            serial: 2024_01_01,
            refresh: 7200,
            retry: 3600,
            expire: 1_209_600,
            minimum_ttl: 300,
        }));
        round_trip(DnsResourceData::Srv {
            priority: 0,
            weight: 5,
            port: 5060,
            target: name("sip.example.com"),
        });
        round_trip(DnsResourceData::Sig(DnsSig {
            type_covered: DnsType::SOA,
            algorithm: 5,
            labels: 2,
            original_ttl: 3600,
            expiration: 1_700_000_000,
            inception: 1_690_000_000,
            key_tag: 12345,
            signer: name("example.com"),
            signature: vec![9; 32],
        }));
    }

    #[test]
    fn unknown_type_preserves_raw_bytes() {
        round_trip(DnsResourceData::Unknown {
            record_type: DnsType(0xFF00),
            data: vec![1, 2, 3, 4, 5],
        });
    }

    #[test]
    fn opt_options_round_trip() {
        round_trip(DnsResourceData::Opt(vec![
            DnsOptOption {
                code: 10, // cookie
                data: vec![1, 2, 3, 4, 5, 6, 7, 8],
            },
            DnsOptOption {
                code: 8, // client subnet
                data: vec![0, 1, 24, 0, 192, 0, 2],
            },
        ]));
    }

    #[test]
    fn rdata_length_mismatch_is_rejected() {
        // A record with 5 bytes of RDATA.
        let message = [0, 0, 0, 0, 0x01, 0x02, 0x03, 0x04, 0x05];
        assert!(DnsResourceData::read(&message, DnsType::A, 4, 5).is_none());
        // MX whose name overruns the declared length.
        let message = [0x00, 0x0A, 0x03, b'f', b'o', b'o'];
        assert!(DnsResourceData::read(&message, DnsType::MX, 0, 6).is_none());
    }
}
