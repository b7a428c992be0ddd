// SPDX-License-Identifier: MIT OR Apache-2.0

//! The collection of protocol layers implemented by this library.
//!
//! Most communication protocols make use of multiple encapsulated layers
//! of data, where each layer performs a distinct purpose in relaying
//! information from one peer to another. Each layer can be generalized
//! into a header and payload, where the header contains data specific to
//! the operation of that layer and the payload contains the next layer.
//!
//! The submodule is organized so that tightly related layers live within
//! their own modules: [`l2`] holds Ethernet, [`ip`] holds IPv4/IPv6 and
//! the IPv4 options sublanguage, [`dns`] holds the DNS message codec, and
//! so on. The [`traits`] module contains the traits implemented across
//! all layers; [`dev_traits`] holds the plumbing needed only when
//! implementing a new layer.

pub mod arp;
pub mod dev_traits;
pub mod dhcp;
pub mod dns;
pub mod gre;
pub mod http;
pub mod icmp;
pub mod igmp;
pub mod ip;
pub mod l2;
pub mod tcp;
pub mod traits;
pub mod udp;

use crate::error::*;

use self::dev_traits::*;
use self::traits::*;

/// A raw layer composed of unstructured bytes.
///
/// This type is used when an inner layer cannot be inferred from the
/// enclosing protocol's fields, or when payload data is literally meant to
/// be interpreted as an opaque array of bytes. A [`Raw`] layer does not
/// necessarily indicate the presence of only one protocol in its contained
/// bytes; there may be encapsulated sublayers within a `Raw` payload that
/// this library does not infer.
#[derive(Clone, Debug, Default)]
pub struct Raw {
    data: Vec<u8>,
}

impl Raw {
    #[inline]
    pub fn new(data: Vec<u8>) -> Self {
        Raw { data }
    }

    /// The entire contents of the `Raw` layer.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

impl PartialEq for Raw {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

layer_identity!(Raw, RawRef, "Raw");

impl LayerLength for Raw {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
}

impl LayerObject for Raw {
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
        panic!("set_payload_unchecked() called on Raw layer, which cannot hold a payload")
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

impl Layer for Raw {}

impl ToBytes for Raw {
    #[inline]
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        bytes.extend(&self.data);
        Ok(())
    }
}

impl FromBytesCurrent for Raw {
    #[inline]
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        Raw {
            data: Vec::from(bytes),
        }
    }

    #[inline]
    fn payload_from_bytes_unchecked_default(&mut self, _bytes: &[u8]) {}
}

/// A view of a raw layer composed of unstructured bytes.
#[derive(Clone, Copy, Debug)]
pub struct RawRef<'a> {
    data: &'a [u8],
}

impl RawRef<'_> {
    /// The entire contents of the `Raw` layer.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data
    }
}

impl<'a> FromBytesRef<'a> for RawRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        RawRef { data: bytes }
    }
}

impl LayerOffset for RawRef<'_> {
    #[inline]
    fn payload_byte_index_default(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

impl Validate for RawRef<'_> {
    #[inline]
    fn validate_current_layer(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }

    #[inline]
    fn validate_payload_default(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl ToLayer for RawRef<'_> {
    type Owned = Raw;

    #[inline]
    fn to_layer(&self) -> Raw {
        Raw {
            data: Vec::from(self.data),
        }
    }
}
