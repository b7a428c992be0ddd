// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for packet validation and construction.
//!
//! Two regimes exist and never mix: [`ValidationError`] classifies why a
//! slice of bytes fails to form a well-known layer (parse side, always
//! recoverable into a best-effort view), while [`SerializationError`] and
//! [`BuildError`] report caller mistakes when constructing a packet from
//! layers (construction side, fatal for the call).

use core::fmt;

/// The reason a byte slice failed validation against a layer's structure.
#[derive(Copy, Clone, Debug)]
pub struct ValidationError {
    /// Name of the layer the error was found in.
    pub layer: &'static str,
    pub class: ValidationErrorClass,
    pub reason: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValidationErrorClass {
    /// The payload bytes cannot form the layer type expected at that
    /// position.
    InvalidPayloadLayer,
    /// The packet needs more bytes to be well-formed; indexing accessors on
    /// an unchecked view may panic.
    InsufficientBytes,
    /// A size field in the packet conflicts with the actual composition of
    /// its contents, or two size fields conflict.
    InvalidSize,
    /// A field in the packet holds a value its wire format does not permit.
    InvalidValue,
    /// Trailing bytes remain past the end of the packet contents.
    ExcessBytes(usize),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} layer: {}", self.layer, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// A failure to serialize a layer into bytes.
#[derive(Copy, Clone, Debug)]
pub struct SerializationError {
    /// Name of the layer that could not be serialized.
    pub layer: &'static str,
    pub class: SerializationErrorClass,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SerializationErrorClass {
    /// A length field would overflow its wire encoding.
    LengthEncoding,
    /// The layer needed information from the layer above it (e.g. a
    /// pseudo-header for a checksum) that was absent or of the wrong type.
    BadUpperLayer,
    /// A field left unset could not be derived from the payload layer.
    BadPayloadLayer,
    /// A field value is outside the range its wire format can carry.
    InvalidFieldValue,
}

impl SerializationError {
    #[inline]
    pub fn length_encoding(layer: &'static str) -> Self {
        SerializationError {
            layer,
            class: SerializationErrorClass::LengthEncoding,
        }
    }

    #[inline]
    pub fn bad_upper_layer(layer: &'static str) -> Self {
        SerializationError {
            layer,
            class: SerializationErrorClass::BadUpperLayer,
        }
    }

    #[inline]
    pub fn bad_payload_layer(layer: &'static str) -> Self {
        SerializationError {
            layer,
            class: SerializationErrorClass::BadPayloadLayer,
        }
    }

    #[inline]
    pub fn invalid_field_value(layer: &'static str) -> Self {
        SerializationError {
            layer,
            class: SerializationErrorClass::InvalidFieldValue,
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.class {
            SerializationErrorClass::LengthEncoding => "length field overflowed its encoding",
            SerializationErrorClass::BadUpperLayer => "required enclosing layer missing or unfit",
            SerializationErrorClass::BadPayloadLayer => {
                "field could not be derived from the payload layer"
            }
            SerializationErrorClass::InvalidFieldValue => "field value not encodable",
        };
        write!(f, "could not serialize {} layer: {}", self.layer, what)
    }
}

impl std::error::Error for SerializationError {}

/// A failure to assemble a [`Packet`](crate::packet::Packet) from a layer
/// stack.
///
/// Every variant is a deterministic caller mistake; fixing the input is the
/// only recovery.
#[derive(Copy, Clone, Debug)]
pub enum BuildError {
    /// No layers were supplied.
    EmptyLayerStack,
    /// The first layer cannot start a packet (it reports no data-link
    /// kind).
    InvalidFirstLayer(&'static str),
    /// A layer does not accept the following layer as its payload.
    IncompatiblePayload {
        upper: &'static str,
        lower: &'static str,
    },
    /// A layer failed to serialize.
    Serialization(SerializationError),
}

impl From<SerializationError> for BuildError {
    #[inline]
    fn from(err: SerializationError) -> Self {
        BuildError::Serialization(err)
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::EmptyLayerStack => write!(f, "no layers supplied to PacketBuilder"),
            BuildError::InvalidFirstLayer(layer) => {
                write!(f, "{layer} layer cannot be the first layer of a packet")
            }
            BuildError::IncompatiblePayload { upper, lower } => {
                write!(f, "{lower} layer is not a permitted payload of {upper}")
            }
            BuildError::Serialization(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for BuildError {}
