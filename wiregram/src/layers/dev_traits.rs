// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traits that are only needed when implementing a new layer type.
//!
//! Users composing or inspecting packets normally only interact with the
//! traits in [`super::traits`]; everything here is plumbing shared between
//! the owned layer types and their `*Ref` views.

use core::any;

use crate::error::ValidationError;

use super::traits::Validate;

/// An identifier unique to a protocol layer.
///
/// A layer's owned type and its `*Ref` view report the same `LayerId`, so
/// the identifier can be used to match layers across the two
/// representations.
pub type LayerId = any::TypeId;

/// An extension to [`any::Any`]; adds methods for retrieving a `dyn Any`
/// reference or mutable reference.
pub trait AsAny: any::Any {
    /// Return a `dyn Any` reference to `self`.
    fn as_any(&self) -> &dyn any::Any;

    /// Return a mutable `dyn Any` reference to `self`.
    fn as_any_mut(&mut self) -> &mut dyn any::Any;
}

impl<T: any::Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn any::Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn any::Any {
        self
    }
}

/// Allows the name of a protocol layer to be retrieved as a string.
///
/// For `*Ref` types, this returns the name of the layer without 'Ref'
/// appended (i.e. the same as their associated owned type).
pub trait LayerName {
    /// The name of the layer.
    fn name() -> &'static str;
}

/// Assigns a unique identifier to the layer.
///
/// Each protocol layer has the same [`LayerId`] across its owned and `Ref`
/// types: if there were a protocol layer called `Example`, then
/// `Example::layer_id() == ExampleRef::layer_id()`.
pub trait LayerIdentifier: Sized {
    /// A unique identifier for the layer type.
    fn layer_id() -> LayerId;
}

/// Locates the byte index of a sublayer within a serialized layer.
pub trait LayerOffset {
    /// Gets the index of the first byte of the layer specified by
    /// `layer_type`, if such a layer exists within the payload bytes.
    /// This will not check the current layer against `layer_type`.
    fn payload_byte_index_default(bytes: &[u8], layer_type: LayerId) -> Option<usize>;
}

/// Implements the identity and conversion glue shared by every layer
/// pair: names, layer ids, `Validate` delegation from the owned type to
/// its view, slice extraction, and `From<Ref>` extraction into the owned
/// type. Expects the view struct to hold its slice in a field named
/// `data` and an existing `ToLayer` impl on the view.
macro_rules! layer_identity {
    ($owned:ident, $ref_ty:ident, $name:literal) => {
        impl $crate::layers::dev_traits::LayerName for $owned {
            #[inline]
            fn name() -> &'static str {
                $name
            }
        }

        impl $crate::layers::dev_traits::LayerIdentifier for $owned {
            #[inline]
            fn layer_id() -> $crate::layers::dev_traits::LayerId {
                core::any::TypeId::of::<$owned>()
            }
        }

        impl $crate::layers::dev_traits::LayerName for $ref_ty<'_> {
            #[inline]
            fn name() -> &'static str {
                $name
            }
        }

        impl $crate::layers::dev_traits::LayerIdentifier for $ref_ty<'_> {
            #[inline]
            fn layer_id() -> $crate::layers::dev_traits::LayerId {
                <$owned as $crate::layers::dev_traits::LayerIdentifier>::layer_id()
            }
        }

        impl<'a> From<$ref_ty<'a>> for &'a [u8] {
            #[inline]
            fn from(value: $ref_ty<'a>) -> Self {
                value.data
            }
        }

        impl $crate::layers::traits::Validate for $owned {
            #[inline]
            fn validate_current_layer(
                curr_layer: &[u8],
            ) -> Result<(), $crate::error::ValidationError> {
                <$ref_ty as $crate::layers::traits::Validate>::validate_current_layer(curr_layer)
            }

            #[inline]
            fn validate_payload_default(
                curr_layer: &[u8],
            ) -> Result<(), $crate::error::ValidationError> {
                <$ref_ty as $crate::layers::traits::Validate>::validate_payload_default(curr_layer)
            }
        }

        impl<'a> $crate::layers::traits::LayerRef<'a> for $ref_ty<'a> {}

        impl From<$ref_ty<'_>> for $owned {
            #[inline]
            fn from(value: $ref_ty<'_>) -> Self {
                $crate::layers::traits::ToLayer::to_layer(&value)
            }
        }
    };
}

pub(crate) use layer_identity;

/// A trait for converting a byte slice into an owned layer type without
/// setting a payload, even if one exists.
pub trait FromBytesCurrent: Sized + Validate {
    /// Attempts to create a new layer from the given bytes without setting
    /// a payload for the layer, even if one exists.
    fn from_bytes_current_layer(bytes: &[u8]) -> Result<Self, ValidationError> {
        Self::validate_current_layer(bytes)?;
        Ok(Self::from_bytes_current_layer_unchecked(bytes))
    }

    /// Creates a new layer from the given bytes without setting a payload
    /// for the layer, even if one exists.
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self;

    /// Sets the given layer's payload to the appropriate layer type, if
    /// such a payload exists. In this context, `bytes` is the serialized
    /// representation of the current layer as well as its payload.
    fn payload_from_bytes_unchecked_default(&mut self, bytes: &[u8]);
}
