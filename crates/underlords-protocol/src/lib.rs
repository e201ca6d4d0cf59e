//! Wire protocol for the Underlords game coordinator.
//!
//! This crate defines the "language" the client and the coordinator
//! speak:
//!
//! - **Message table** ([`EMsg`], [`MessageTable`]): which opcode means
//!   what, and which schema its body uses.
//! - **Schemas** ([`schema`]): the protobuf descriptors for every known
//!   message, built in code.
//! - **Codec** ([`decode`], [`MessageBuilder`]): bytes to normalized
//!   [`Decoded`] values and request fields to bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (opcodes and raw bytes)
//! and the client (events). It doesn't know about connections or
//! handshakes; it only knows how to name, decode and encode messages.
//!
//! ```text
//! Transport (msg_type, bytes) → Protocol (Decoded) → Client (GcEvent)
//! ```

mod codec;
mod decoded;
mod error;
mod language;
pub mod schema;

pub use codec::{MessageBuilder, decode, encode};
pub use decoded::Decoded;
pub use error::ProtocolError;
pub use language::{EMsg, GcConnectionStatus, MessageName, MessageTable, MessageType};
pub use prost_reflect::Value as FieldValue;

/// Decodes `bytes` with the schema registered under `schema_name`.
pub fn decode_named(schema_name: &str, bytes: &[u8]) -> Result<Decoded, ProtocolError> {
    decode(&schema::message(schema_name)?, bytes)
}
