// SPDX-License-Identifier: MIT OR Apache-2.0

//! Re-exports of the traits and core types needed for everyday packet
//! building and inspection.

pub use crate::addr::{Ipv4Address, Ipv6Address, MacAddress};
pub use crate::error::{BuildError, SerializationError, ValidationError, ValidationErrorClass};
pub use crate::layer_stack;
pub use crate::layers::dev_traits::{LayerId, LayerIdentifier, LayerName, LayerOffset};
pub use crate::layers::traits::{
    FromBytes, FromBytesRef, Layer, LayerLength, LayerObject, LayerRef, ToBytes, ToLayer, Validate,
};
pub use crate::packet::{DataLinkKind, Packet, PacketBuilder};
