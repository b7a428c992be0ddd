// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whole-packet assembly and inspection.
//!
//! A [`Packet`] owns one contiguous buffer of wire bytes plus the capture
//! metadata that cannot be derived from them (timestamp and data-link
//! kind). Parsing never fails outright: any byte slice becomes a `Packet`,
//! and [`Packet::is_valid`] reports separately whether the bytes form a
//! coherent protocol stack.
//!
//! [`PacketBuilder`] goes the other way: an ordered stack of owned layers
//! is chained, serialized top-down, and checksummed into a finished
//! `Packet`.

use std::time::SystemTime;

use once_cell::sync::OnceCell;

use crate::error::BuildError;
use crate::layers::ip::Ipv4Ref;
use crate::layers::l2::EtherRef;
use crate::layers::traits::*;

/// The link-layer framing of a packet's first layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataLinkKind {
    /// Ethernet II framing.
    Ethernet,
    /// Raw IPv4 capture (no link-layer header).
    Ipv4,
}

/// A single captured or constructed packet: one buffer of wire bytes, a
/// capture timestamp, and the data-link kind of its first layer.
///
/// The buffer is never mutated after construction, so a `Packet` can be
/// shared freely across threads for read-only inspection; the memoized
/// validity flag is guarded by a one-time-init cell.
#[derive(Debug)]
pub struct Packet {
    data: Vec<u8>,
    timestamp: SystemTime,
    datalink: DataLinkKind,
    valid: OnceCell<bool>,
}

impl Packet {
    /// Wraps captured bytes into a packet. This never fails; bytes that do
    /// not form a coherent protocol stack yield a packet whose
    /// [`is_valid`](Packet::is_valid) is `false`.
    pub fn from_bytes(
        bytes: impl Into<Vec<u8>>,
        timestamp: SystemTime,
        datalink: DataLinkKind,
    ) -> Self {
        Packet {
            data: bytes.into(),
            timestamp,
            datalink,
            valid: OnceCell::new(),
        }
    }

    /// The raw wire bytes of the packet.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The total length of the packet in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    #[inline]
    pub fn datalink(&self) -> DataLinkKind {
        self.datalink
    }

    /// Whether the packet's bytes form a coherent protocol stack:
    /// sufficient bytes for every recognized header, correct checksums,
    /// and recursively valid payloads. Unrecognized payload protocols are
    /// treated as vacuously valid since no further interpretation is
    /// attempted.
    ///
    /// Computed once and memoized.
    pub fn is_valid(&self) -> bool {
        *self.valid.get_or_init(|| {
            let result = match self.datalink {
                DataLinkKind::Ethernet => EtherRef::validate(&self.data),
                DataLinkKind::Ipv4 => Ipv4Ref::validate(&self.data),
            };
            match result {
                Ok(()) => true,
                // Link-layer padding after the payload proper is routine
                // (minimum Ethernet frame size); it does not make the
                // packet incoherent.
                Err(e) => matches!(e.class, crate::error::ValidationErrorClass::ExcessBytes(_)),
            }
        })
    }

    /// A typed view of the packet's Ethernet layer, when the packet is an
    /// Ethernet capture.
    #[inline]
    pub fn ether(&self) -> Option<EtherRef<'_>> {
        match self.datalink {
            DataLinkKind::Ethernet => Some(EtherRef::from_bytes_unchecked(&self.data)),
            _ => None,
        }
    }

    /// Retrieves a view of the first layer of type `T` within the packet,
    /// if the packet's protocol stack contains one.
    pub fn get_layer<'a, T: LayerRef<'a>>(&'a self) -> Option<T> {
        match self.datalink {
            DataLinkKind::Ethernet => {
                EtherRef::from_bytes_unchecked(&self.data).get_layer::<T>()
            }
            DataLinkKind::Ipv4 => Ipv4Ref::from_bytes_unchecked(&self.data).get_layer::<T>(),
        }
    }
}

/// Builds a [`Packet`] from an ordered stack of owned layers.
///
/// Layer 1 must be link-layer capable; each subsequent layer becomes the
/// payload of the one before it. All failure modes are deterministic
/// caller mistakes reported as [`BuildError`].
pub struct PacketBuilder;

impl PacketBuilder {
    /// Chains `layers` outermost-first, serializes them with automatic
    /// length/protocol/checksum derivation, and wraps the result with the
    /// first layer's data-link kind.
    pub fn build(
        timestamp: SystemTime,
        layers: Vec<Box<dyn LayerObject>>,
    ) -> Result<Packet, BuildError> {
        let mut chained: Option<Box<dyn LayerObject>> = None;
        for mut layer in layers.into_iter().rev() {
            if let Some(payload) = chained.take() {
                let lower = payload.layer_name();
                layer.add_payload(payload).map_err(|_| BuildError::IncompatiblePayload {
                    upper: layer.layer_name(),
                    lower,
                })?;
            }
            chained = Some(layer);
        }

        let first = chained.ok_or(BuildError::EmptyLayerStack)?;
        let datalink = first
            .data_link()
            .ok_or(BuildError::InvalidFirstLayer(first.layer_name()))?;

        let data = first.to_bytes()?;
        Ok(Packet {
            data,
            timestamp,
            datalink,
            valid: OnceCell::new(),
        })
    }
}

/// Boxes a sequence of layers into the `Vec<Box<dyn LayerObject>>` stack
/// accepted by [`PacketBuilder::build`].
#[macro_export]
macro_rules! layer_stack {
    ($($layer:expr),+ $(,)?) => {
        vec![$(Box::new($layer) as Box<dyn $crate::layers::traits::LayerObject>),+]
    };
}
