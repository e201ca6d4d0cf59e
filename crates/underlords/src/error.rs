//! Unified error type for the Underlords client.

use underlords_protocol::ProtocolError;
use underlords_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Request methods report rejection with a plain `bool`; this type only
/// shows up where a future has to explain why it resolved without an
/// answer, and during client setup.
#[derive(Debug, thiserror::Error)]
pub enum GcError {
    /// A transport-level error (send, connection).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (schema, encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The request was rejected before reaching the transport: bad
    /// arguments (including an unusable Steam id), or no logged-on
    /// identity.
    #[error("request was not sent")]
    NotSent,

    /// The request went out but its response listener was dropped
    /// without firing.
    #[error("no response received")]
    NoResponse,

    /// The client task has stopped.
    #[error("client has shut down")]
    ClientClosed,
}
