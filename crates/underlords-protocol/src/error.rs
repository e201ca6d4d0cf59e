//! Error types for the protocol layer.
//!
//! Everything that can go wrong while turning coordinator bytes into
//! [`Decoded`](crate::Decoded) values, or request fields into bytes.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The bytes are not a valid encoding of the expected message.
    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    /// No schema with this name is registered.
    #[error("unknown schema {0}")]
    UnknownSchema(String),

    /// The built-in schema set could not be assembled.
    #[error("invalid schema: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    /// A request named a field its schema doesn't have, or gave it a
    /// value of the wrong type.
    #[error("cannot set {schema}.{field}: {reason}")]
    InvalidField {
        schema: String,
        field: String,
        reason: String,
    },
}
