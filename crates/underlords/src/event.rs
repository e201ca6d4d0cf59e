//! Events the client publishes, and the registry that delivers them.

use std::sync::atomic::{AtomicU64, Ordering};

use underlords_protocol::{Decoded, GcConnectionStatus};

/// Something that happened on the coordinator connection.
#[derive(Debug, Clone, PartialEq)]
pub enum GcEvent {
    /// The coordinator accepted our hello.
    ConnectedToGc,
    /// A session we held is gone. Transport loss reports `NoSession`.
    DisconnectedFromGc(GcConnectionStatus),
    /// Every `ClientConnectionStatus` the coordinator sends.
    ConnectionStatus {
        status: GcConnectionStatus,
        raw: Decoded,
    },
    PlayersProfile(Decoded),
    MatchList(Decoded),
    Match(Decoded),
    FriendRanks(Decoded),
    SpectateUser(Decoded),
    /// Diagnostic text.
    Debug(String),
}

impl GcEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ConnectedToGc => EventKind::ConnectedToGc,
            Self::DisconnectedFromGc(_) => EventKind::DisconnectedFromGc,
            Self::ConnectionStatus { .. } => EventKind::ConnectionStatus,
            Self::PlayersProfile(_) => EventKind::PlayersProfile,
            Self::MatchList(_) => EventKind::MatchList,
            Self::Match(_) => EventKind::Match,
            Self::FriendRanks(_) => EventKind::FriendRanks,
            Self::SpectateUser(_) => EventKind::SpectateUser,
            Self::Debug(_) => EventKind::Debug,
        }
    }

    /// The decoded response body, for the response events.
    pub fn response(&self) -> Option<&Decoded> {
        match self {
            Self::PlayersProfile(d)
            | Self::MatchList(d)
            | Self::Match(d)
            | Self::FriendRanks(d)
            | Self::SpectateUser(d) => Some(d),
            _ => None,
        }
    }
}

/// The name of an event, used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConnectedToGc,
    DisconnectedFromGc,
    ConnectionStatus,
    PlayersProfile,
    MatchList,
    Match,
    FriendRanks,
    SpectateUser,
    Debug,
}

/// Identifies a subscription so it can be removed with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Hands out unique [`ListenerId`]s; shared by all handles of a client.
#[derive(Debug, Default)]
pub(crate) struct ListenerIds(AtomicU64);

impl ListenerIds {
    pub(crate) fn next(&self) -> ListenerId {
        ListenerId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// A subscriber callback. Runs on the client task; keep it short.
pub type Listener = Box<dyn FnMut(&GcEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Runs on every event of its kind.
    Every,
    /// Runs on the next event of its kind, then is removed.
    Once,
    /// Waits for the answer to one request. Pending responses of a kind
    /// are answered oldest first, one per event.
    Response,
}

struct Subscription {
    id: ListenerId,
    kind: EventKind,
    mode: Mode,
    listener: Listener,
}

/// Typed publish/subscribe registry.
///
/// Delivery rules for one emitted event, in registration order:
/// - every `Every` and every `Once` subscriber of its kind runs, and the
///   `Once` ones are removed;
/// - the oldest `Response` subscriber of its kind runs and is removed.
///   Younger `Response` subscribers wait for later events.
#[derive(Default)]
pub(crate) struct EventBus {
    subscriptions: Vec<Subscription>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self, id: ListenerId, kind: EventKind, mode: Mode, listener: Listener) {
        self.subscriptions.push(Subscription {
            id,
            kind,
            mode,
            listener,
        });
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub(crate) fn has_listeners(&self, kind: EventKind) -> bool {
        self.subscriptions.iter().any(|s| s.kind == kind)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Delivers `event`. Returns how many listeners ran.
    pub(crate) fn emit(&mut self, event: &GcEvent) -> usize {
        let kind = event.kind();
        let mut ran = 0;
        let mut answered = false;
        let mut spent = Vec::new();

        for sub in self.subscriptions.iter_mut().filter(|s| s.kind == kind) {
            match sub.mode {
                Mode::Every => {}
                Mode::Once => spent.push(sub.id),
                Mode::Response if !answered => {
                    answered = true;
                    spent.push(sub.id);
                }
                Mode::Response => continue,
            }
            (sub.listener)(event);
            ran += 1;
        }

        self.subscriptions.retain(|s| !spent.contains(&s.id));
        ran
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
