//! `GcClient` builder, handle, and actor loop.
//!
//! This is the entry point for talking to the Underlords coordinator. It
//! ties the layers together: transport → router → connection → events.
//!
//! The client runs as an actor: one Tokio task owns the router, the
//! session state machine, and the listener registry. [`GcClient`] handles
//! talk to it over an unbounded channel, which is why request methods can
//! return `bool` synchronously.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use underlords_protocol::{Decoded, EMsg, GcConnectionStatus, MessageBuilder};
use underlords_session::{Action, Connection, HandshakeConfig, SessionState};
use underlords_transport::{AppId, GcPayload, GcTransport, TransportEvent};

use crate::event::{EventBus, ListenerIds, Mode};
use crate::request::{FriendRanksRequest, GcRequest};
use crate::router::{Inbound, Outcome, Router};
use crate::{
    EventKind, GcError, GcEvent, Listener, ListenerId, MatchRequest, MatchesRequest,
    ProfileRequest, SpectateRequest,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings fixed for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// The application whose coordinator we talk to.
    pub app_id: AppId,
    /// Hello retry timing.
    pub handshake: HandshakeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_id: AppId::UNDERLORDS,
            handshake: HandshakeConfig::default(),
        }
    }
}

/// Builder for a [`GcClient`].
///
/// # Example
///
/// ```rust,ignore
/// use underlords::prelude::*;
///
/// let client = GcClient::builder()
///     .handshake(HandshakeConfig::default())
///     .spawn(transport, events)?;
/// client.on(EventKind::ConnectedToGc, |_| println!("connected"));
/// ```
#[derive(Debug, Default)]
pub struct GcClientBuilder {
    config: ClientConfig,
}

impl GcClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_id(mut self, app_id: AppId) -> Self {
        self.config.app_id = app_id;
        self
    }

    pub fn handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.config.handshake = handshake;
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Starts the client task on the current Tokio runtime.
    ///
    /// `events` must be the stream of notifications from the same
    /// connection `transport` sends on.
    ///
    /// # Errors
    /// Fails if the message schemas cannot be loaded.
    pub fn spawn(
        self,
        transport: Arc<dyn GcTransport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<GcClient, GcError> {
        let app_id = self.config.app_id;
        let router = Router::new(app_id)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let actor = ClientActor {
            transport: Arc::clone(&transport),
            router,
            connection: Connection::new(app_id, self.config.handshake),
            bus: EventBus::default(),
            commands: rx,
            events,
            events_open: true,
        };
        tokio::spawn(actor.run());

        Ok(GcClient {
            app_id,
            transport,
            ids: Arc::new(ListenerIds::default()),
            commands: tx,
        })
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A snapshot of the connection, from [`GcClient::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    pub state: SessionState,
    pub in_app: bool,
    pub have_session: bool,
    /// Backoff interval currently in effect.
    pub hello_interval: Option<Duration>,
}

/// Commands sent from handles to the client actor.
enum Command {
    Send {
        msg: EMsg,
        payload: GcPayload,
        respond: Option<(ListenerId, EventKind, Listener)>,
    },
    Subscribe {
        id: ListenerId,
        kind: EventKind,
        mode: Mode,
        listener: Listener,
    },
    Unsubscribe(ListenerId),
    Status(oneshot::Sender<ClientStatus>),
    Shutdown,
}

/// Handle to a running client. Cheap to clone.
///
/// Request methods return `true` once the request has been handed to the
/// client task, and `false` (sending nothing) if the arguments are
/// invalid or the transport has no logged-on identity. The `_with`
/// variants also register a one-shot callback for the response.
#[derive(Clone)]
pub struct GcClient {
    app_id: AppId,
    transport: Arc<dyn GcTransport>,
    ids: Arc<ListenerIds>,
    commands: mpsc::UnboundedSender<Command>,
}

impl GcClient {
    pub fn builder() -> GcClientBuilder {
        GcClientBuilder::new()
    }

    pub fn app_id(&self) -> AppId {
        self.app_id
    }

    pub fn request_profile(&self, req: ProfileRequest) -> bool {
        self.request(&req, None)
    }

    pub fn request_profile_with<F>(&self, req: ProfileRequest, callback: F) -> bool
    where
        F: FnOnce(Decoded) + Send + 'static,
    {
        self.request(&req, Some(response_listener(callback)))
    }

    pub fn request_matches(&self, req: MatchesRequest) -> bool {
        self.request(&req, None)
    }

    pub fn request_matches_with<F>(&self, req: MatchesRequest, callback: F) -> bool
    where
        F: FnOnce(Decoded) + Send + 'static,
    {
        self.request(&req, Some(response_listener(callback)))
    }

    pub fn request_match(&self, req: MatchRequest) -> bool {
        self.request(&req, None)
    }

    pub fn request_match_with<F>(&self, req: MatchRequest, callback: F) -> bool
    where
        F: FnOnce(Decoded) + Send + 'static,
    {
        self.request(&req, Some(response_listener(callback)))
    }

    pub fn get_friend_ranks(&self) -> bool {
        self.request(&FriendRanksRequest, None)
    }

    pub fn get_friend_ranks_with<F>(&self, callback: F) -> bool
    where
        F: FnOnce(Decoded) + Send + 'static,
    {
        self.request(&FriendRanksRequest, Some(response_listener(callback)))
    }

    pub fn spectate_user(&self, req: SpectateRequest) -> bool {
        self.request(&req, None)
    }

    pub fn spectate_user_with<F>(&self, req: SpectateRequest, callback: F) -> bool
    where
        F: FnOnce(Decoded) + Send + 'static,
    {
        self.request(&req, Some(response_listener(callback)))
    }

    /// Sends a profile request and waits for the next profile response.
    ///
    /// Never times out on its own; wrap in `tokio::time::timeout` if needed.
    pub async fn fetch_profile(&self, req: ProfileRequest) -> Result<Decoded, GcError> {
        self.fetch(|client, cb| client.request_profile_with(req, cb)).await
    }

    pub async fn fetch_matches(&self, req: MatchesRequest) -> Result<Decoded, GcError> {
        self.fetch(|client, cb| client.request_matches_with(req, cb)).await
    }

    pub async fn fetch_match(&self, req: MatchRequest) -> Result<Decoded, GcError> {
        self.fetch(|client, cb| client.request_match_with(req, cb)).await
    }

    pub async fn fetch_friend_ranks(&self) -> Result<Decoded, GcError> {
        self.fetch(|client, cb| client.get_friend_ranks_with(cb)).await
    }

    pub async fn fetch_spectate(&self, req: SpectateRequest) -> Result<Decoded, GcError> {
        self.fetch(|client, cb| client.spectate_user_with(req, cb)).await
    }

    /// Subscribes to every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&GcEvent) + Send + 'static,
    {
        self.subscribe(kind, Mode::Every, Box::new(listener))
    }

    /// Subscribes to the next event of `kind` only.
    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnOnce(&GcEvent) + Send + 'static,
    {
        let mut listener = Some(listener);
        self.subscribe(
            kind,
            Mode::Once,
            Box::new(move |event| {
                if let Some(f) = listener.take() {
                    f(event);
                }
            }),
        )
    }

    /// Removes a subscription. Unknown ids are ignored.
    pub fn off(&self, id: ListenerId) {
        let _ = self.commands.send(Command::Unsubscribe(id));
    }

    pub async fn status(&self) -> Result<ClientStatus, GcError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Status(reply_tx))
            .map_err(|_| GcError::ClientClosed)?;
        reply_rx.await.map_err(|_| GcError::ClientClosed)
    }

    pub async fn have_session(&self) -> Result<bool, GcError> {
        Ok(self.status().await?.have_session)
    }

    /// Stops the client task. Pending listeners are dropped.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn request<R: GcRequest>(&self, req: &R, respond: Option<Listener>) -> bool {
        let Some(fields) = req.fields() else {
            return false;
        };
        let built = MessageBuilder::for_msg(R::MSG).and_then(|builder| {
            fields
                .into_iter()
                .try_fold(builder, |b, (name, value)| b.set(name, value))
        });
        let body = match built {
            Ok(builder) => builder.encode(),
            Err(e) => {
                tracing::warn!(msg = %R::MSG, error = %e, "failed to encode request");
                return false;
            }
        };

        if self.transport.steam_id().is_none() {
            tracing::debug!(msg = %R::MSG, "not logged on, request dropped");
            return false;
        }

        let respond = respond.map(|listener| (self.ids.next(), R::RESPONSE, listener));
        self.commands
            .send(Command::Send {
                msg: R::MSG,
                payload: GcPayload::Protobuf(Bytes::from(body)),
                respond,
            })
            .is_ok()
    }

    async fn fetch<F>(&self, send: F) -> Result<Decoded, GcError>
    where
        F: FnOnce(&Self, Box<dyn FnOnce(Decoded) + Send>) -> bool,
    {
        let (tx, rx) = oneshot::channel();
        let sent = send(
            self,
            Box::new(move |data| {
                let _ = tx.send(data);
            }),
        );
        if !sent {
            return Err(GcError::NotSent);
        }
        rx.await.map_err(|_| GcError::NoResponse)
    }

    fn subscribe(&self, kind: EventKind, mode: Mode, listener: Listener) -> ListenerId {
        let id = self.ids.next();
        let _ = self.commands.send(Command::Subscribe {
            id,
            kind,
            mode,
            listener,
        });
        id
    }
}

impl std::fmt::Debug for GcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcClient")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

/// Wraps a response callback as a one-shot listener.
fn response_listener<F>(callback: F) -> Listener
where
    F: FnOnce(Decoded) + Send + 'static,
{
    let mut callback = Some(callback);
    Box::new(move |event| {
        if let (Some(data), Some(f)) = (event.response(), callback.take()) {
            f(data.clone());
        }
    })
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The client task's state.
struct ClientActor {
    transport: Arc<dyn GcTransport>,
    router: Router,
    connection: Connection,
    bus: EventBus,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    events_open: bool,
}

impl ClientActor {
    /// Runs until shutdown or until every handle is dropped.
    async fn run(mut self) {
        let app_id = self.connection.app_id();
        tracing::info!(%app_id, "client actor started");

        loop {
            let deadline = self.connection.hello_deadline();
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                event = self.events.recv(), if self.events_open => match event {
                    Some(event) => self.handle_transport_event(event),
                    None => {
                        tracing::warn!(%app_id, "transport event stream closed");
                        self.events_open = false;
                        let action = self.connection.transport_lost();
                        self.apply(action);
                    }
                },
                () = sleep_until(deadline) => {
                    let action = self.connection.poll_hello(Instant::now());
                    self.apply(action);
                }
            }
        }

        tracing::info!(%app_id, "client actor stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Send {
                msg,
                payload,
                respond,
            } => {
                let registered = respond.map(|(id, kind, listener)| {
                    self.bus.subscribe(id, kind, Mode::Response, listener);
                    id
                });
                if !self.send(msg, payload) {
                    if let Some(id) = registered {
                        self.bus.unsubscribe(id);
                    }
                }
            }
            Command::Subscribe {
                id,
                kind,
                mode,
                listener,
            } => self.bus.subscribe(id, kind, mode, listener),
            Command::Unsubscribe(id) => {
                self.bus.unsubscribe(id);
            }
            Command::Status(reply) => {
                let _ = reply.send(ClientStatus {
                    state: self.connection.state(),
                    in_app: self.connection.in_app(),
                    have_session: self.connection.have_session(),
                    hello_interval: self.connection.hello_interval(),
                });
            }
            // Handled by the run loop.
            Command::Shutdown => {}
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ReceivedFromGc {
                app_id,
                msg_type,
                payload,
            } => self.handle_gc_message(app_id, msg_type, &payload),
            TransportEvent::AppLaunched(app_id) => {
                self.connection.app_launched(app_id, Instant::now());
            }
            TransportEvent::AppQuit(app_id) => {
                self.connection.app_quit(app_id);
            }
            TransportEvent::Disconnected => {
                let action = self.connection.transport_lost();
                self.apply(action);
            }
            TransportEvent::Error(e) => {
                tracing::warn!(error = %e, "transport error");
                let action = self.connection.transport_lost();
                self.apply(action);
            }
        }
    }

    fn handle_gc_message(&mut self, app_id: AppId, msg_type: u32, payload: &GcPayload) {
        let Some(routed) = self.router.route(app_id, msg_type, payload) else {
            return;
        };

        let handled = !matches!(routed.outcome, Outcome::Unhandled);
        tracing::debug!(msg = %routed.name, handled, protobuf = routed.protobuf, "gc message");
        self.debug(|| {
            format!(
                "Got {} GC message {}{}",
                if handled { "handled" } else { "unhandled" },
                routed.name,
                if routed.protobuf { " (protobuf)" } else { "" }
            )
        });

        match routed.outcome {
            Outcome::Unhandled => {}
            Outcome::Failed(e) => {
                tracing::warn!(msg = %routed.name, error = %e, "failed to decode gc message");
                self.debug(|| format!("Failed to decode GC message {}: {e}", routed.name));
            }
            Outcome::Handled(Inbound::Welcome(_)) => {
                let action = self.connection.welcome_received();
                if action.is_some() {
                    self.debug(|| "GC connection established".to_string());
                }
                self.apply(action);
            }
            Outcome::Handled(Inbound::ConnectionStatus(raw)) => self.handle_status(raw),
            Outcome::Handled(Inbound::Event(event)) => self.emit(event),
        }
    }

    fn handle_status(&mut self, raw: Decoded) {
        // An absent status decodes as null; the wire default is HAVE_SESSION.
        let status = raw
            .get("status")
            .and_then(Decoded::as_i64)
            .and_then(|n| i32::try_from(n).ok())
            .map_or(GcConnectionStatus::HaveSession, GcConnectionStatus::from_i32);

        self.emit(GcEvent::ConnectionStatus { status, raw });
        let have_session = self.connection.have_session();
        self.debug(|| {
            format!(
                "Connection status: {status}; have session: {}",
                if have_session { "yes" } else { "no" }
            )
        });

        let action = self.connection.status_received(status, Instant::now());
        self.apply(action);
    }

    fn apply(&mut self, action: Option<Action>) {
        match action {
            None => {}
            Some(Action::SendHello { next_attempt }) => {
                let body = MessageBuilder::for_msg(EMsg::ClientHello).map(|b| b.encode());
                match body {
                    Ok(body) => {
                        self.send(EMsg::ClientHello, GcPayload::Protobuf(Bytes::from(body)));
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to encode hello"),
                }
                self.debug(|| {
                    format!(
                        "Sending hello, setting timer for next attempt to {} ms",
                        next_attempt.as_millis()
                    )
                });
            }
            Some(Action::Connected) => self.emit(GcEvent::ConnectedToGc),
            Some(Action::Disconnected(status)) => self.emit(GcEvent::DisconnectedFromGc(status)),
        }
    }

    /// Hands a message to the transport. Returns whether it went out.
    fn send(&mut self, msg: EMsg, payload: GcPayload) -> bool {
        let app_id = self.connection.app_id();
        if self.transport.steam_id().is_none() {
            tracing::debug!(%msg, "not logged on, not sending");
            return false;
        }

        self.debug(|| format!("Sending GC message {msg}"));
        match self.transport.send_to_gc(app_id, msg.id(), payload) {
            Ok(()) => {
                tracing::debug!(%app_id, %msg, "sent gc message");
                true
            }
            Err(e) => {
                tracing::warn!(%app_id, %msg, error = %e, "send to gc failed");
                false
            }
        }
    }

    fn emit(&mut self, event: GcEvent) {
        tracing::trace!(kind = ?event.kind(), "emit");
        self.bus.emit(&event);
    }

    /// Emits a `Debug` event, building the text only if someone listens.
    fn debug(&mut self, text: impl FnOnce() -> String) {
        if self.bus.has_listeners(EventKind::Debug) {
            self.emit(GcEvent::Debug(text()));
        }
    }
}

/// Sleeps until `deadline`, or forever if there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
