//! Game-coordinator transport contract for the Underlords client.
//!
//! The client layer does not talk to Steam itself. It sits on top of an
//! already logged-on Steam connection and only needs two things from it:
//!
//! - a way to push messages into the coordinator ([`GcTransport`]), and
//! - a stream of lifecycle and inbound-message notifications
//!   ([`TransportEvent`]), delivered over a Tokio channel.
//!
//! # Feature Flags
//!
//! - `memory`: [`MemoryTransport`], an in-process transport that records
//!   outbound messages and can script coordinator replies. Meant for tests
//!   and demos.

mod error;
#[cfg(feature = "memory")]
mod memory;
mod steam_id;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{MemoryTransport, SentMessage};
pub use steam_id::{AccountType, SteamId, SteamIdError, Universe, instance};

use std::fmt;

use bytes::Bytes;

/// A Steam application id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId(u32);

impl AppId {
    /// Dota Underlords.
    pub const UNDERLORDS: AppId = AppId(1046930);

    /// Creates a new `AppId` from a raw `u32`.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying `u32` value.
    pub fn into_inner(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app-{}", self.0)
    }
}

/// A coordinator message body as the transport delivers or accepts it.
///
/// Steam frames protobuf coordinator messages with a protobuf header and
/// legacy messages with a fixed binary header. The transport strips (or
/// adds) that framing, so the variant tells the layer above which
/// convention a body uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcPayload {
    /// Protobuf-encoded body. Outbound, it is sent with an empty
    /// protobuf header.
    Protobuf(Bytes),
    /// Raw little-endian body without a protobuf header.
    Raw(Bytes),
}

impl GcPayload {
    /// The body bytes, whatever the framing.
    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Protobuf(b) | Self::Raw(b) => b,
        }
    }

    pub fn is_protobuf(&self) -> bool {
        matches!(self, Self::Protobuf(_))
    }
}

/// Notifications from the Steam connection, in delivery order.
#[derive(Debug)]
pub enum TransportEvent {
    /// A coordinator message arrived for some application.
    ReceivedFromGc {
        app_id: AppId,
        msg_type: u32,
        payload: GcPayload,
    },
    /// Steam reports the given application as running.
    AppLaunched(AppId),
    /// Steam reports the given application as closed.
    AppQuit(AppId),
    /// The Steam connection dropped.
    Disconnected,
    /// The Steam connection failed fatally.
    Error(TransportError),
}

/// Sends coordinator messages over an authenticated Steam connection.
///
/// Implementations are shared between the client handle and its actor
/// task, hence `Send + Sync`.
pub trait GcTransport: Send + Sync + 'static {
    /// The identity Steam is currently logged on as, if any.
    fn steam_id(&self) -> Option<SteamId>;

    /// Hands one message to the coordinator of `app_id`.
    fn send_to_gc(
        &self,
        app_id: AppId,
        msg_type: u32,
        payload: GcPayload,
    ) -> Result<(), TransportError>;
}
