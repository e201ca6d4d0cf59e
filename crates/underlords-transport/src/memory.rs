//! In-process transport for tests and demos.
//!
//! [`MemoryTransport`] records every outbound message and feeds
//! [`TransportEvent`]s into the channel the client reads from. An optional
//! responder closure plays the coordinator: it sees each sent message and
//! returns the events the "server" would answer with.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::{AppId, GcPayload, GcTransport, SteamId, TransportError, TransportEvent};

/// One message handed to [`MemoryTransport::send_to_gc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub app_id: AppId,
    pub msg_type: u32,
    pub payload: GcPayload,
}

type Responder = Arc<dyn Fn(&SentMessage) -> Vec<TransportEvent> + Send + Sync>;

/// A transport that lives entirely in memory.
pub struct MemoryTransport {
    steam_id: Mutex<Option<SteamId>>,
    sent: Mutex<Vec<SentMessage>>,
    responder: Mutex<Option<Responder>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTransport {
    /// Creates a logged-off transport and the event stream the client
    /// should consume.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Self {
            steam_id: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
            events,
        };
        (transport, rx)
    }

    /// Sets (or clears) the logged-on identity.
    pub fn set_steam_id(&self, id: Option<SteamId>) {
        *lock(&self.steam_id) = id;
    }

    /// Installs a closure that answers outbound messages.
    ///
    /// The closure runs without any transport lock held, so it may
    /// replace itself or inspect the transport.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&SentMessage) -> Vec<TransportEvent> + Send + Sync + 'static,
    {
        *lock(&self.responder) = Some(Arc::new(responder));
    }

    /// Delivers an event to the client as if Steam had raised it.
    ///
    /// Returns `false` once the client side has gone away.
    pub fn inject(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Every message sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// Drains the sent-message log.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *lock(&self.sent))
    }

    /// Messages sent so far with the given opcode.
    pub fn sent_of_type(&self, msg_type: u32) -> Vec<SentMessage> {
        lock(&self.sent)
            .iter()
            .filter(|m| m.msg_type == msg_type)
            .cloned()
            .collect()
    }
}

impl GcTransport for MemoryTransport {
    fn steam_id(&self) -> Option<SteamId> {
        *lock(&self.steam_id)
    }

    fn send_to_gc(
        &self,
        app_id: AppId,
        msg_type: u32,
        payload: GcPayload,
    ) -> Result<(), TransportError> {
        if lock(&self.steam_id).is_none() {
            return Err(TransportError::NotLoggedOn);
        }

        let message = SentMessage {
            app_id,
            msg_type,
            payload,
        };
        tracing::trace!(%app_id, msg_type, "memory transport send");

        let responder = lock(&self.responder).clone();
        let replies = match responder {
            Some(respond) => respond(&message),
            None => Vec::new(),
        };
        lock(&self.sent).push(message);

        for reply in replies {
            if self.events.send(reply).is_err() {
                return Err(TransportError::Shutdown);
            }
        }
        Ok(())
    }
}
