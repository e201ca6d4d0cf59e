//! Inbound message routing.
//!
//! The transport hands over `(app_id, msg_type, payload)` triples. The
//! [`Router`] drops messages for other applications, looks the opcode up
//! in its dispatch table, and lets the handler decode the body into an
//! [`Inbound`] value. Opcodes without a handler are reported, never
//! treated as errors: the coordinator adds messages over time.

use std::collections::HashMap;

use bytes::{Buf, Bytes};
use underlords_protocol::{Decoded, EMsg, MessageName, MessageTable, ProtocolError, decode, schema};
use underlords_transport::{AppId, GcPayload};

use crate::GcEvent;

/// A message body as a handler sees it.
#[derive(Debug)]
pub(crate) enum Body<'a> {
    /// Protobuf bytes, passed through untouched.
    Protobuf(&'a [u8]),
    /// A raw body positioned at offset 0. Read with the `_le` getters.
    Raw(Bytes),
}

impl Body<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Protobuf(bytes) => bytes,
            Self::Raw(buf) => buf.chunk(),
        }
    }
}

/// What a handled message means to the client.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    Welcome(Decoded),
    ConnectionStatus(Decoded),
    Event(GcEvent),
}

/// The result of routing one message for our application.
#[derive(Debug)]
pub(crate) struct Routed {
    pub(crate) name: MessageName,
    pub(crate) protobuf: bool,
    pub(crate) outcome: Outcome,
}

#[derive(Debug)]
pub(crate) enum Outcome {
    Unhandled,
    Handled(Inbound),
    Failed(ProtocolError),
}

type Handler = Box<dyn Fn(Body<'_>) -> Result<Inbound, ProtocolError> + Send + Sync>;

/// Per-client dispatch table from opcode to handler.
///
/// Built once in [`Router::new`] and never changed afterwards; two
/// clients never share a table.
pub(crate) struct Router {
    app_id: AppId,
    handlers: HashMap<u32, Handler>,
}

impl Router {
    /// Builds the dispatch table for `app_id`.
    ///
    /// # Errors
    /// Fails only if a built-in schema is missing from the pool.
    pub(crate) fn new(app_id: AppId) -> Result<Self, ProtocolError> {
        let routes: [(EMsg, fn(Decoded) -> Inbound); 7] = [
            (EMsg::ClientWelcome, Inbound::Welcome),
            (EMsg::ClientConnectionStatus, Inbound::ConnectionStatus),
            (EMsg::GetProfileResponse, |d| Inbound::Event(GcEvent::PlayersProfile(d))),
            (EMsg::GetMatchHistoryResponse, |d| Inbound::Event(GcEvent::MatchList(d))),
            (EMsg::GetPostMatchStatsResponse, |d| Inbound::Event(GcEvent::Match(d))),
            (EMsg::GetFriendRanksResponse, |d| Inbound::Event(GcEvent::FriendRanks(d))),
            (EMsg::SpectateUserResponse, |d| Inbound::Event(GcEvent::SpectateUser(d))),
        ];

        let mut handlers = HashMap::with_capacity(routes.len());
        for (msg, wrap) in routes {
            handlers.insert(msg.id(), decoding(msg, wrap)?);
        }
        Ok(Self { app_id, handlers })
    }

    #[cfg(test)]
    pub(crate) fn handles(&self, msg_type: u32) -> bool {
        self.handlers.contains_key(&msg_type)
    }

    /// Routes one message. `None` means it belongs to another app.
    pub(crate) fn route(&self, app_id: AppId, msg_type: u32, payload: &GcPayload) -> Option<Routed> {
        if app_id != self.app_id {
            return None;
        }

        let name = MessageTable::global().name_of(msg_type);
        let protobuf = payload.is_protobuf();
        let outcome = match self.handlers.get(&msg_type) {
            None => Outcome::Unhandled,
            Some(handler) => {
                let body = match payload {
                    GcPayload::Protobuf(bytes) => Body::Protobuf(bytes),
                    GcPayload::Raw(bytes) => Body::Raw(bytes.clone()),
                };
                match handler(body) {
                    Ok(inbound) => Outcome::Handled(inbound),
                    Err(e) => Outcome::Failed(e),
                }
            }
        };

        Some(Routed {
            name,
            protobuf,
            outcome,
        })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("app_id", &self.app_id)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// A handler that decodes the body against `msg`'s schema and wraps it.
fn decoding(msg: EMsg, wrap: fn(Decoded) -> Inbound) -> Result<Handler, ProtocolError> {
    let name = msg
        .schema()
        .ok_or_else(|| ProtocolError::UnknownSchema(msg.name().to_string()))?;
    let descriptor = schema::message(name)?;
    Ok(Box::new(move |body: Body<'_>| {
        decode(&descriptor, body.bytes()).map(wrap)
    }))
}
