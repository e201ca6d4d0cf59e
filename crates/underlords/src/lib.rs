//! # Underlords
//!
//! Client for the Dota Underlords game coordinator.
//!
//! The crate sits on top of an already logged-on Steam connection (any
//! [`GcTransport`]) and gives Underlords' coordinator messages typed
//! request/response semantics. It manages the coordinator handshake on its
//! own: once Steam reports the game as running, hellos go out with
//! exponential backoff until the coordinator welcomes us.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use underlords::prelude::*;
//!
//! let client = GcClient::builder().spawn(transport, events)?;
//! client.on(EventKind::ConnectedToGc, |_| println!("connected"));
//!
//! // later, once connected:
//! let history = client
//!     .fetch_matches(MatchesRequest::new("76561197960287930").rows(5))
//!     .await?;
//! ```

mod client;
mod error;
mod event;
mod request;
mod router;

pub use client::{ClientConfig, ClientStatus, GcClient, GcClientBuilder};
pub use error::GcError;
pub use event::{EventKind, GcEvent, Listener, ListenerId};
pub use request::{MatchRequest, MatchesRequest, ProfileRequest, SpectateRequest, SteamIdArg};
pub use underlords_protocol::{Decoded, GcConnectionStatus};
pub use underlords_session::{HandshakeConfig, SessionState};
pub use underlords_transport::{AppId, GcPayload, GcTransport, SteamId, TransportError, TransportEvent};

/// Common imports for client code.
pub mod prelude {
    pub use crate::{
        AppId, ClientConfig, Decoded, EventKind, GcClient, GcConnectionStatus, GcError, GcEvent,
        GcTransport, HandshakeConfig, MatchRequest, MatchesRequest, ProfileRequest,
        SpectateRequest, SteamId, TransportEvent,
    };
}
