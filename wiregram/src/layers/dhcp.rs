// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Dynamic Host Configuration Protocol (DHCP), RFC 2131: the fixed
//! BOOTP-derived header, the magic cookie, and the trailing options list.
//!
//! ## Packet Layout (fixed portion)
//! ```txt
//!    .    Octet 0    .    Octet 1    .    Octet 2    .    Octet 3    .
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |       Op      |     HType     |      HLen     |      Hops     |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |                              XID                              |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  8 |             Secs              |             Flags             |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 12 | CIAddr | 16 YIAddr | 20 SIAddr | 24 GIAddr | 28 CHAddr (16)   |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! 44 | SName (64) | 108 File (128) | 236 Magic | 240 Options...      |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::addr::Ipv4Address;
use crate::error::*;
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

/// The fixed header length, magic cookie excluded.
pub const DHCP_FIXED_LEN: usize = 236;

/// The magic cookie introducing the options region.
pub const DHCP_MAGIC_COOKIE: u32 = 0x6382_5363;

pub const DHCP_OPT_PAD: u8 = 0;
pub const DHCP_OPT_MESSAGE_TYPE: u8 = 53;
pub const DHCP_OPT_END: u8 = 255;

pub const DHCP_OP_REQUEST: u8 = 1;
pub const DHCP_OP_REPLY: u8 = 2;

/// One DHCP option: a code and its value bytes. `Pad` and `End` are
/// handled by the list codec and never appear as entries.
#[derive(Clone, Debug, PartialEq)]
pub struct DhcpOption {
    pub code: u8,
    pub data: Vec<u8>,
}

impl DhcpOption {
    /// The message-type option (option 53).
    pub fn message_type(message_type: u8) -> Self {
        DhcpOption {
            code: DHCP_OPT_MESSAGE_TYPE,
            data: vec![message_type],
        }
    }
}

/// A DHCP message.
#[derive(Clone, Debug, PartialEq)]
pub struct Dhcp {
    op: u8,
    hardware_type: u8,
    hardware_len: u8,
    hops: u8,
    xid: u32,
    secs: u16,
    flags: u16,
    client_addr: Ipv4Address,
    your_addr: Ipv4Address,
    server_addr: Ipv4Address,
    gateway_addr: Ipv4Address,
    client_hardware_addr: [u8; 16],
    server_name: [u8; 64],
    boot_file: [u8; 128],
    options: Vec<DhcpOption>,
}

impl Dhcp {
    /// Creates a request with the given transaction id; addresses and
    /// options start empty.
    pub fn new(op: u8, xid: u32) -> Self {
        Dhcp {
            op,
            hardware_type: 1, // Ethernet
            hardware_len: 6,
            hops: 0,
            xid,
            secs: 0,
            flags: 0,
            client_addr: Ipv4Address::ZERO,
            your_addr: Ipv4Address::ZERO,
            server_addr: Ipv4Address::ZERO,
            gateway_addr: Ipv4Address::ZERO,
            client_hardware_addr: [0; 16],
            server_name: [0; 64],
            boot_file: [0; 128],
            options: Vec::new(),
        }
    }

    #[inline]
    pub fn op(&self) -> u8 {
        self.op
    }

    #[inline]
    pub fn xid(&self) -> u32 {
        self.xid
    }

    #[inline]
    pub fn set_xid(&mut self, xid: u32) {
        self.xid = xid;
    }

    #[inline]
    pub fn secs(&self) -> u16 {
        self.secs
    }

    #[inline]
    pub fn set_secs(&mut self, secs: u16) {
        self.secs = secs;
    }

    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags
    }

    #[inline]
    pub fn set_flags(&mut self, flags: u16) {
        self.flags = flags;
    }

    #[inline]
    pub fn client_addr(&self) -> Ipv4Address {
        self.client_addr
    }

    #[inline]
    pub fn set_client_addr(&mut self, addr: Ipv4Address) {
        self.client_addr = addr;
    }

    #[inline]
    pub fn your_addr(&self) -> Ipv4Address {
        self.your_addr
    }

    #[inline]
    pub fn set_your_addr(&mut self, addr: Ipv4Address) {
        self.your_addr = addr;
    }

    #[inline]
    pub fn server_addr(&self) -> Ipv4Address {
        self.server_addr
    }

    #[inline]
    pub fn set_server_addr(&mut self, addr: Ipv4Address) {
        self.server_addr = addr;
    }

    #[inline]
    pub fn gateway_addr(&self) -> Ipv4Address {
        self.gateway_addr
    }

    #[inline]
    pub fn set_gateway_addr(&mut self, addr: Ipv4Address) {
        self.gateway_addr = addr;
    }

    /// Sets the client hardware address from a MAC-sized byte string,
    /// zero-padding the 16-byte field.
    pub fn set_client_hardware_addr(&mut self, addr: &[u8]) {
        self.client_hardware_addr = [0; 16];
        let len = core::cmp::min(addr.len(), 16);
        self.client_hardware_addr[..len].copy_from_slice(&addr[..len]);
        self.hardware_len = len as u8;
    }

    #[inline]
    pub fn client_hardware_addr(&self) -> &[u8] {
        &self.client_hardware_addr[..core::cmp::min(self.hardware_len as usize, 16)]
    }

    #[inline]
    pub fn options(&self) -> &[DhcpOption] {
        &self.options
    }

    #[inline]
    pub fn options_mut(&mut self) -> &mut Vec<DhcpOption> {
        &mut self.options
    }

    /// The value of the message-type option, when present.
    pub fn message_type(&self) -> Option<u8> {
        self.options
            .iter()
            .find(|o| o.code == DHCP_OPT_MESSAGE_TYPE)
            .and_then(|o| o.data.first())
            .copied()
    }
}

layer_identity!(Dhcp, DhcpRef, "Dhcp");

impl LayerLength for Dhcp {
    fn len(&self) -> usize {
        DHCP_FIXED_LEN
            + 4
            + self
                .options
                .iter()
                .map(|o| 2 + o.data.len())
                .sum::<usize>()
            + 1 // End option
    }
}

impl LayerObject for Dhcp {
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
        panic!("set_payload_unchecked() called on Dhcp layer, which cannot hold a payload")
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

impl Layer for Dhcp {}

impl ToBytes for Dhcp {
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        bytes.push(self.op);
        bytes.push(self.hardware_type);
        bytes.push(self.hardware_len);
        bytes.push(self.hops);
        bytes.extend(self.xid.to_be_bytes());
        bytes.extend(self.secs.to_be_bytes());
        bytes.extend(self.flags.to_be_bytes());
        bytes.extend(self.client_addr.octets());
        bytes.extend(self.your_addr.octets());
        bytes.extend(self.server_addr.octets());
        bytes.extend(self.gateway_addr.octets());
        bytes.extend(self.client_hardware_addr);
        bytes.extend(self.server_name);
        bytes.extend(self.boot_file);
        bytes.extend(DHCP_MAGIC_COOKIE.to_be_bytes());
        for option in &self.options {
            let length: u8 = option
                .data
                .len()
                .try_into()
                .map_err(|_| SerializationError::length_encoding(Dhcp::name()))?;
            bytes.push(option.code);
            bytes.push(length);
            bytes.extend_from_slice(&option.data);
        }
        bytes.push(DHCP_OPT_END);
        Ok(())
    }
}

impl FromBytesCurrent for Dhcp {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let dhcp = DhcpRef::from_bytes_unchecked(bytes);
        let mut layer = Dhcp::new(dhcp.op(), dhcp.xid());
        layer.hardware_type = dhcp.hardware_type();
        layer.hardware_len = dhcp.hardware_len();
        layer.hops = dhcp.hops();
        layer.secs = dhcp.secs();
        layer.flags = dhcp.flags();
        layer.client_addr = dhcp.client_addr();
        layer.your_addr = dhcp.your_addr();
        layer.server_addr = dhcp.server_addr();
        layer.gateway_addr = dhcp.gateway_addr();
        if let Some(chaddr) = utils::get_array::<16>(bytes, 28) {
            layer.client_hardware_addr = *chaddr;
        }
        if let Some(sname) = utils::get_array::<64>(bytes, 44) {
            layer.server_name = *sname;
        }
        if let Some(file) = utils::get_array::<128>(bytes, 108) {
            layer.boot_file = *file;
        }
        layer.options = dhcp.options().unwrap_or_default();
        layer
    }

    #[inline]
    fn payload_from_bytes_unchecked_default(&mut self, _bytes: &[u8]) {}
}

/// A view of a DHCP message.
#[derive(Clone, Copy, Debug)]
pub struct DhcpRef<'a> {
    data: &'a [u8],
}

impl<'a> DhcpRef<'a> {
    #[inline]
    pub fn op(&self) -> u8 {
        *self
            .data
            .first()
            .expect("insufficient bytes in Dhcp layer to retrieve Op field")
    }

    #[inline]
    pub fn hardware_type(&self) -> u8 {
        *self
            .data
            .get(1)
            .expect("insufficient bytes in Dhcp layer to retrieve Hardware Type field")
    }

    #[inline]
    pub fn hardware_len(&self) -> u8 {
        *self
            .data
            .get(2)
            .expect("insufficient bytes in Dhcp layer to retrieve Hardware Length field")
    }

    #[inline]
    pub fn hops(&self) -> u8 {
        *self
            .data
            .get(3)
            .expect("insufficient bytes in Dhcp layer to retrieve Hops field")
    }

    #[inline]
    pub fn xid(&self) -> u32 {
        u32::from_be_bytes(
            utils::to_array(self.data, 4)
                .expect("insufficient bytes in Dhcp layer to retrieve XID field"),
        )
    }

    #[inline]
    pub fn secs(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 8)
                .expect("insufficient bytes in Dhcp layer to retrieve Secs field"),
        )
    }

    #[inline]
    pub fn flags(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(self.data, 10)
                .expect("insufficient bytes in Dhcp layer to retrieve Flags field"),
        )
    }

    #[inline]
    pub fn client_addr(&self) -> Ipv4Address {
        Ipv4Address::from_octets(
            utils::to_array(self.data, 12)
                .expect("insufficient bytes in Dhcp layer to retrieve Client Address field"),
        )
    }

    #[inline]
    pub fn your_addr(&self) -> Ipv4Address {
        Ipv4Address::from_octets(
            utils::to_array(self.data, 16)
                .expect("insufficient bytes in Dhcp layer to retrieve Your Address field"),
        )
    }

    #[inline]
    pub fn server_addr(&self) -> Ipv4Address {
        Ipv4Address::from_octets(
            utils::to_array(self.data, 20)
                .expect("insufficient bytes in Dhcp layer to retrieve Server Address field"),
        )
    }

    #[inline]
    pub fn gateway_addr(&self) -> Ipv4Address {
        Ipv4Address::from_octets(
            utils::to_array(self.data, 24)
                .expect("insufficient bytes in Dhcp layer to retrieve Gateway Address field"),
        )
    }

    /// The client hardware address, trimmed to the declared length.
    pub fn client_hardware_addr(&self) -> Option<&'a [u8]> {
        let len = core::cmp::min(*self.data.get(2)? as usize, 16);
        self.data.get(28..28 + len)
    }

    /// Whether the options region opens with the DHCP magic cookie.
    pub fn has_magic_cookie(&self) -> bool {
        utils::read_u32(self.data, DHCP_FIXED_LEN, utils::Endianness::Big)
            == Some(DHCP_MAGIC_COOKIE)
    }

    /// Decodes the options region. `None` marks a missing magic cookie or
    /// a structurally malformed entry.
    pub fn options(&self) -> Option<Vec<DhcpOption>> {
        if !self.has_magic_cookie() {
            return None;
        }

        let mut options = Vec::new();
        let mut region = self.data.get(DHCP_FIXED_LEN + 4..)?;
        loop {
            let (&code, rest) = region.split_first()?;
            match code {
                DHCP_OPT_PAD => region = rest,
                DHCP_OPT_END => return Some(options),
                _ => {
                    let (&length, rest) = rest.split_first()?;
                    let data = rest.get(..length as usize)?;
                    options.push(DhcpOption {
                        code,
                        data: data.to_vec(),
                    });
                    region = &rest[length as usize..];
                }
            }
        }
    }

    /// The value of the message-type option, when present.
    pub fn message_type(&self) -> Option<u8> {
        self.options()?
            .iter()
            .find(|o| o.code == DHCP_OPT_MESSAGE_TYPE)
            .and_then(|o| o.data.first())
            .copied()
    }
}

impl<'a> FromBytesRef<'a> for DhcpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        DhcpRef { data: bytes }
    }
}

impl LayerOffset for DhcpRef<'_> {
    #[inline]
    fn payload_byte_index_default(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

impl Validate for DhcpRef<'_> {
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError> {
        if curr_layer.len() < DHCP_FIXED_LEN + 4 {
            return Err(ValidationError {
                layer: Dhcp::name(),
                class: ValidationErrorClass::InsufficientBytes,
                reason: "insufficient bytes for the fixed Dhcp header and magic cookie",
            });
        }

        let dhcp = DhcpRef::from_bytes_unchecked(curr_layer);
        if !dhcp.has_magic_cookie() {
            return Err(ValidationError {
                layer: Dhcp::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "Dhcp options region does not begin with the magic cookie",
            });
        }

        if dhcp.options().is_none() {
            return Err(ValidationError {
                layer: Dhcp::name(),
                class: ValidationErrorClass::InvalidValue,
                reason: "malformed entry in Dhcp options",
            });
        }

        Ok(())
    }

    #[inline]
    fn validate_payload_default(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl ToLayer for DhcpRef<'_> {
    type Owned = Dhcp;

    #[inline]
    fn to_layer(&self) -> Dhcp {
        Dhcp::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_round_trip() {
        let mut dhcp = Dhcp::new(DHCP_OP_REQUEST, 0x3903F326);
        dhcp.set_client_hardware_addr(&[0x00, 0x0B, 0x82, 0x01, 0xFC, 0x42]);
        dhcp.options_mut().push(DhcpOption::message_type(1));
        dhcp.options_mut().push(DhcpOption {
            code: 50, // requested IP address
            data: vec![192, 168, 1, 100],
        });

        let bytes = dhcp.to_bytes().unwrap();
        assert_eq!(bytes.len(), dhcp.len());
        assert!(DhcpRef::validate(&bytes).is_ok());

        let parsed = DhcpRef::from_bytes_unchecked(&bytes);
        assert!(parsed.has_magic_cookie());
        assert_eq!(parsed.message_type(), Some(1));
        assert_eq!(
            parsed.client_hardware_addr().unwrap(),
            &[0x00, 0x0B, 0x82, 0x01, 0xFC, 0x42]
        );
        assert_eq!(parsed.to_layer(), dhcp);
    }

    #[test]
    fn missing_cookie_is_invalid() {
        let dhcp = Dhcp::new(DHCP_OP_REPLY, 7);
        let mut bytes = dhcp.to_bytes().unwrap();
        bytes[DHCP_FIXED_LEN] = 0;
        let err = DhcpRef::validate(&bytes).unwrap_err();
        assert_eq!(err.class, ValidationErrorClass::InvalidValue);
    }

    #[test]
    fn truncated_option_is_invalid() {
        let mut dhcp = Dhcp::new(DHCP_OP_REQUEST, 9);
        dhcp.options_mut().push(DhcpOption {
            code: 12,
            data: b"host".to_vec(),
        });
        let bytes = dhcp.to_bytes().unwrap();
        // Drop the End option and the last value byte.
        assert!(DhcpRef::validate(&bytes[..bytes.len() - 2]).is_err());
    }
}
