// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traits used to provide layer functionality.
//!
//! Every protocol is represented twice: an owned *layer* type holding
//! intended field values (the write side, used to build packets) and a
//! `*Ref` view type interpreting a byte slice in place (the read side,
//! produced by parsing). [`LayerObject`]/[`Layer`] cover the former,
//! [`LayerRef`] the latter, and [`ToLayer`]/[`FromBytes`] convert between
//! the two.

use core::fmt;

use crate::addr::MacAddress;
use crate::error::*;
use crate::layers::ip::Ipv4Protocol;
use crate::layers::l2::EtherType;
use crate::packet::DataLinkKind;

use super::dev_traits::*;

/// A trait for retrieving the current length (in bytes) of a protocol
/// layer and its payload.
pub trait LayerLength {
    /// The length (in bytes) of the layer, including its entire payload.
    fn len(&self) -> usize;
}

/// A trait for serializing an owned layer into its binary representation.
pub trait ToBytes {
    /// Appends the layer's byte representation to the given byte vector,
    /// computing any checksum fields that were left unset.
    ///
    /// `prev` carries the [`LayerId`] and starting byte index of the layer
    /// enclosing this one, so that transport checksums can reach back into
    /// the already-written IP pseudo-header. The layer writes its own
    /// header, recurses into its payload, and then patches any of its own
    /// fields that depend on the fully-written payload.
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError>;

    /// Serializes the given layer into bytes stored in a vector.
    #[inline]
    fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut bytes = Vec::new();
        self.to_bytes_checksummed(&mut bytes, None)?;
        Ok(bytes)
    }
}

/// An object-safe trait covering every owned layer type.
pub trait LayerObject: AsAny + fmt::Debug + LayerLength + ToBytes {
    /// The name of the layer, identical to [`LayerName::name()`] of the
    /// concrete type.
    fn layer_name(&self) -> &'static str;

    /// The data-link kind this layer provides when it opens a packet, or
    /// `None` if the layer cannot be the first layer of a packet.
    #[inline]
    fn data_link(&self) -> Option<DataLinkKind> {
        None
    }

    /// The EtherType an enclosing Ethernet layer should carry for this
    /// payload, if this layer can sit directly above Ethernet.
    #[inline]
    fn ether_payload_type(&self) -> Option<EtherType> {
        None
    }

    /// The destination an enclosing Ethernet layer defaults to when its
    /// own destination was left unset.
    #[inline]
    fn default_ether_destination(&self) -> Option<MacAddress> {
        None
    }

    /// The protocol number an enclosing IPv4/IPv6 layer should carry for
    /// this payload, if this layer can sit directly above IP.
    #[inline]
    fn ip_payload_protocol(&self) -> Option<Ipv4Protocol> {
        None
    }

    /// Determines whether `payload` can be used as a payload for the layer.
    fn can_add_payload_default(&self, payload: &dyn LayerObject) -> bool;

    /// Returns the current layer's payload, or `None` if the layer has no
    /// payload.
    fn payload(&self) -> Option<&dyn LayerObject>;

    /// Returns a mutable reference to the current layer's payload, or
    /// `None` if the layer has no payload.
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject>;

    /// Sets the payload of the current layer without checking the payload
    /// type's compatibility.
    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>);

    /// Indicates whether the current layer has a payload.
    #[inline]
    fn has_payload(&self) -> bool {
        self.payload().is_some()
    }

    /// Removes the layer's payload, returning `None` if the layer has no
    /// stored payload.
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>>;

    /// Clone the given instance into a [`Box`]ed `dyn LayerObject`.
    fn to_boxed_layer(&self) -> Box<dyn LayerObject>;

    /// Value equality across `dyn LayerObject` instances: true iff `other`
    /// is the same concrete layer type with equal fields and an equal
    /// payload chain.
    fn compare(&self, other: &dyn LayerObject) -> bool;

    /// Sets the payload of the current layer, returning an error if the
    /// payload type is incompatible with the current layer.
    fn add_payload(&mut self, payload: Box<dyn LayerObject>) -> Result<(), ValidationError> {
        if !self.can_add_payload_default(payload.as_ref()) {
            return Err(ValidationError {
                layer: self.layer_name(),
                class: ValidationErrorClass::InvalidPayloadLayer,
                reason: "requested payload layer type incompatible with the current layer",
            });
        }
        self.set_payload_unchecked(payload);
        Ok(())
    }
}

impl Clone for Box<dyn LayerObject> {
    #[inline]
    fn clone(&self) -> Self {
        self.to_boxed_layer()
    }
}

fn find_layer<'a, T: LayerObject>(mut layer: &'a dyn LayerObject) -> Option<&'a T> {
    loop {
        if let Some(found) = layer.as_any().downcast_ref::<T>() {
            return Some(found);
        }
        layer = layer.payload()?;
    }
}

// Check-then-get keeps the borrow checker happy until Polonius lands; the
// shared-borrow probe ends before the mutable downcast begins.
fn find_layer_mut<'a, T: LayerObject>(layer: &'a mut dyn LayerObject) -> Option<&'a mut T> {
    if AsAny::as_any(layer).downcast_ref::<T>().is_some() {
        return AsAny::as_any_mut(layer).downcast_mut::<T>();
    }
    find_layer_mut(layer.payload_mut()?)
}

/// Represents a distinct protocol layer that may encapsulate data and/or
/// other layers.
///
/// This is the owned layer variant: all of its internal types are owned by
/// the layer, individual data fields can be modified in a type-safe
/// manner, and a packet comprising several distinct layers can be crafted
/// by chaining layers through [`Layer::append_layer`] or
/// [`crate::packet::PacketBuilder`].
pub trait Layer: LayerObject + LayerName + Sized {
    /// Retrieves a reference to the first layer of type `T` in the chain,
    /// starting with (and including) the base layer.
    #[inline]
    fn get_layer<T: LayerObject>(&self) -> Option<&T> {
        find_layer(self as &dyn LayerObject)
    }

    /// Retrieves a mutable reference to the first layer of type `T` in the
    /// chain, starting with (and including) the base layer.
    #[inline]
    fn get_layer_mut<T: LayerObject>(&mut self) -> Option<&mut T> {
        find_layer_mut(self as &mut dyn LayerObject)
    }

    /// Appends the given layer to the innermost layer of the existing
    /// chain, returning an error if the innermost layer does not permit
    /// `other` as a payload.
    fn append_layer<T: LayerObject>(&mut self, other: T) -> Result<(), ValidationError> {
        let mut curr: &mut dyn LayerObject = self;
        while curr.has_payload() {
            curr = curr.payload_mut().unwrap();
        }
        curr.add_payload(Box::new(other))
    }
}

/// A trait for validating a byte slice against the expected structure of a
/// layer type.
pub trait Validate: Sized {
    /// Checks that `bytes` represents a valid serialization of the layer
    /// type and its payload.
    ///
    /// Validation errors are returned in a fixed order so that the caller
    /// may still inspect the contents of a partially-broken packet:
    ///
    /// 1. [`ValidationErrorClass::InsufficientBytes`] errors come first,
    ///    parent layer before sublayer. When returned, unchecked accessors
    ///    on the region may panic and `from_bytes_unchecked()` must not be
    ///    used.
    /// 2. [`ValidationErrorClass::InvalidValue`] errors follow, parent
    ///    before sublayer. The bytes can still be converted with
    ///    `from_bytes_unchecked()` without panicking.
    /// 3. [`ValidationErrorClass::ExcessBytes`] errors come last; the
    ///    packet is sound apart from trailing bytes.
    fn validate(bytes: &[u8]) -> Result<(), ValidationError> {
        let curr_valid = Self::validate_current_layer(bytes);
        if let Err(e) = curr_valid {
            if e.class == ValidationErrorClass::InsufficientBytes {
                return curr_valid;
            }
        }

        let next_valid = Self::validate_payload_default(bytes);
        match (curr_valid, next_valid) {
            // Deeper InsufficientBytes errors outrank shallower value errors.
            (_, Err(e)) if e.class == ValidationErrorClass::InsufficientBytes => next_valid,
            (Err(e), _) if e.class == ValidationErrorClass::InvalidValue => curr_valid,
            (_, Err(e)) if e.class == ValidationErrorClass::InvalidValue => next_valid,
            // Trailing payload bytes keep their ExcessBytes class; the
            // enclosing framing (e.g. a padded Ethernet frame) decides
            // what they mean.
            (_, Err(_)) => next_valid,
            (Err(_), _) => curr_valid, // ValidationErrorClass::ExcessBytes(_)
            _ => Ok(()),
        }
    }

    /// Validates the given layer without validating any of its payload
    /// layers. Has the same error ordering properties as
    /// [`validate()`](Validate::validate).
    fn validate_current_layer(curr_layer: &[u8]) -> Result<(), ValidationError>;

    /// Validates the payload of the given layer without validating the
    /// layer itself. `curr_layer` includes the current layer's bytes.
    fn validate_payload_default(curr_layer: &[u8]) -> Result<(), ValidationError>;
}

/// A trait for converting a slice of bytes into an owned layer type.
pub trait FromBytes: Sized + Validate + FromBytesCurrent {
    /// Converts a slice of bytes into an owned layer, returning an error
    /// if the bytes would not form a valid layer.
    #[inline]
    fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        Self::validate(bytes)?;
        Ok(Self::from_bytes_unchecked(bytes))
    }

    /// Converts a slice of bytes into an owned layer, decoding the payload
    /// chain along the way.
    ///
    /// # Panics
    ///
    /// May panic if a prior `validate()` of the slice returned
    /// [`ValidationErrorClass::InsufficientBytes`].
    #[inline]
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let mut layer = Self::from_bytes_current_layer_unchecked(bytes);
        layer.payload_from_bytes_unchecked_default(bytes);
        layer
    }
}

impl<T: FromBytesCurrent> FromBytes for T {}

/// A trait for converting a slice of bytes into a `*Ref` view type.
pub trait FromBytesRef<'a>: Sized + Validate {
    /// Converts a slice of bytes into a view, returning an error if the
    /// bytes would not form a valid layer.
    #[inline]
    fn from_bytes(bytes: &'a [u8]) -> Result<Self, ValidationError> {
        Self::validate(bytes)?;
        Ok(Self::from_bytes_unchecked(bytes))
    }

    /// Converts a slice of bytes into a view over them.
    ///
    /// # Panics
    ///
    /// Field accessors on the resulting view may panic if a prior
    /// `validate()` of the slice returned
    /// [`ValidationErrorClass::InsufficientBytes`].
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self;
}

/// Represents an immutable view of a protocol layer over a byte slice.
///
/// This is the read-side layer variant: it references a byte slice without
/// owning it, and is best suited for efficiently retrieving individual
/// fields or payload data from a captured packet. A view converts into its
/// owned counterpart through [`ToLayer::to_layer`].
pub trait LayerRef<'a>:
    Sized + Copy + Into<&'a [u8]> + LayerName + LayerIdentifier + LayerOffset + FromBytesRef<'a>
{
    /// Retrieves a view of the first sublayer of type `T`, if such a
    /// sublayer exists. If `T` is the same layer type as the base view,
    /// the base view itself is returned.
    fn get_layer<T: LayerRef<'a>>(&self) -> Option<T> {
        let bytes: &'a [u8] = (*self).into();
        if T::layer_id() == Self::layer_id() {
            return Some(T::from_bytes_unchecked(bytes));
        }
        let idx = Self::payload_byte_index_default(bytes, T::layer_id())?;
        bytes.get(idx..).map(T::from_bytes_unchecked)
    }

    /// Retrieves a view of the first sublayer of type `T`.
    ///
    /// # Panics
    ///
    /// If no layer of the given type exists within the sublayers, this
    /// method will panic.
    #[inline]
    fn index_layer<T: LayerRef<'a>>(&self) -> T {
        self.get_layer().unwrap_or_else(|| {
            panic!(
                "layer {} not found in instance of {} when index_layer() called",
                T::name(),
                Self::name()
            )
        })
    }
}

/// A trait for creating an owned layer from a `*Ref` view of it.
///
/// This is the read-to-write conversion: the extracted layer round-trips,
/// i.e. building a packet from the extracted layer reproduces the fields
/// the view reported (auto-derived fields excepted).
pub trait ToLayer {
    type Owned: LayerObject;

    /// Creates a new owned layer out of the given layer view.
    fn to_layer(&self) -> Self::Owned;
}
