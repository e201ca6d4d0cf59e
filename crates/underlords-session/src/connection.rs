//! The coordinator connection state machine.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};
use underlords_protocol::GcConnectionStatus;
use underlords_transport::AppId;

use crate::HandshakeConfig;

/// Where the connection stands.
///
/// ```text
///            app_launched                 hello deadline
///   NoApp ───────────────→ AwaitingWelcome ──────────┐
///     ↑                        │    ↑  └─────────────┘ (send hello, back off)
///     │ quit / disconnect      │    │
///     │                welcome │    │ status != HAVE_SESSION
///     │                        ↓    │
///     └─────────────────── HaveSession
/// ```
///
/// `NoSession` is the in-app state with no session and no hello pending.
/// It is only observable when a handshake cannot be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    NoApp,
    NoSession,
    AwaitingWelcome,
    HaveSession,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoApp => "no app",
            Self::NoSession => "no session",
            Self::AwaitingWelcome => "awaiting welcome",
            Self::HaveSession => "have session",
        })
    }
}

/// Something the owner of a [`Connection`] must do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a `ClientHello`. The next attempt is due after `next_attempt`.
    SendHello { next_attempt: Duration },
    /// The coordinator accepted us.
    Connected,
    /// A session we held is gone.
    Disconnected(GcConnectionStatus),
}

/// Session state for one application on one coordinator transport.
///
/// All inputs are synchronous and take the current time where timing
/// matters, so the machine can be driven from a `select!` loop or from a
/// test with a fake clock.
#[derive(Debug)]
pub struct Connection {
    app_id: AppId,
    config: HandshakeConfig,
    in_app: bool,
    have_session: bool,
    /// When the next hello is due. `Some` only while awaiting a welcome.
    hello_at: Option<Instant>,
    /// Wait used after the most recent hello of this cycle.
    interval: Option<Duration>,
}

impl Connection {
    pub fn new(app_id: AppId, config: HandshakeConfig) -> Self {
        Self {
            app_id,
            config: config.validated(),
            in_app: false,
            have_session: false,
            hello_at: None,
            interval: None,
        }
    }

    pub fn app_id(&self) -> AppId {
        self.app_id
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        match (self.in_app, self.have_session, self.hello_at) {
            (false, _, _) => SessionState::NoApp,
            (true, true, _) => SessionState::HaveSession,
            (true, false, Some(_)) => SessionState::AwaitingWelcome,
            (true, false, None) => SessionState::NoSession,
        }
    }

    pub fn in_app(&self) -> bool {
        self.in_app
    }

    pub fn have_session(&self) -> bool {
        self.have_session
    }

    /// When the caller must next call [`poll_hello`](Self::poll_hello).
    pub fn hello_deadline(&self) -> Option<Instant> {
        self.hello_at
    }

    /// The backoff interval currently in effect, if any.
    pub fn hello_interval(&self) -> Option<Duration> {
        self.interval
    }

    /// The transport reports that an app started.
    ///
    /// Returns `true` if this moved us into the app. Launches of other
    /// apps, or repeated launches, change nothing.
    pub fn app_launched(&mut self, app_id: AppId, now: Instant) -> bool {
        if self.in_app || app_id != self.app_id {
            return false;
        }
        self.in_app = true;
        debug!(%app_id, "app launched");
        if !self.have_session {
            self.begin_handshake(now);
        }
        true
    }

    /// The transport reports that an app stopped.
    ///
    /// Quitting is not a disconnect, so no [`Action`] results even if a
    /// session was held. Returns `true` if this moved us out of the app.
    pub fn app_quit(&mut self, app_id: AppId) -> bool {
        if !self.in_app || app_id != self.app_id {
            return false;
        }
        debug!(%app_id, had_session = self.have_session, "app quit");
        self.leave_app();
        true
    }

    /// The transport disconnected or failed.
    pub fn transport_lost(&mut self) -> Option<Action> {
        let had_session = self.have_session;
        self.leave_app();
        if had_session {
            info!(app_id = %self.app_id, "coordinator session lost with transport");
            Some(Action::Disconnected(GcConnectionStatus::NoSession))
        } else {
            None
        }
    }

    /// Fires the hello timer if it is due.
    ///
    /// Sends nothing, and stops the loop, once a session exists or the app
    /// is gone.
    pub fn poll_hello(&mut self, now: Instant) -> Option<Action> {
        let due = self.hello_at?;
        if now < due {
            return None;
        }
        if !self.in_app || self.have_session {
            debug!(
                in_app = self.in_app,
                have_session = self.have_session,
                "hello timer stopped"
            );
            self.hello_at = None;
            return None;
        }

        let next = self.config.next_interval(self.interval);
        self.interval = Some(next);
        self.hello_at = Some(now + next);
        debug!(next_ms = next.as_millis() as u64, "hello due");
        Some(Action::SendHello { next_attempt: next })
    }

    /// The coordinator sent `ClientWelcome`.
    ///
    /// Only a welcome that arrives while in the app without a session
    /// counts; anything else is ignored.
    pub fn welcome_received(&mut self) -> Option<Action> {
        if !self.in_app || self.have_session {
            debug!(state = %self.state(), "ignoring welcome");
            return None;
        }
        self.have_session = true;
        self.hello_at = None;
        self.interval = Some(self.config.initial_interval);
        info!(app_id = %self.app_id, "coordinator session established");
        Some(Action::Connected)
    }

    /// The coordinator reported our connection status.
    ///
    /// Losing a held session yields exactly one
    /// [`Action::Disconnected`] and restarts the handshake.
    pub fn status_received(&mut self, status: GcConnectionStatus, now: Instant) -> Option<Action> {
        if status == GcConnectionStatus::HaveSession || !self.have_session {
            return None;
        }
        info!(app_id = %self.app_id, %status, "coordinator dropped session");
        self.have_session = false;
        self.begin_handshake(now);
        Some(Action::Disconnected(status))
    }

    fn begin_handshake(&mut self, now: Instant) {
        if !self.in_app || self.hello_at.is_some() {
            debug!(
                in_app = self.in_app,
                pending = self.hello_at.is_some(),
                "not starting handshake"
            );
            return;
        }
        self.hello_at = Some(now + self.config.first_attempt);
    }

    fn leave_app(&mut self) {
        self.hello_at = None;
        self.interval = None;
        self.in_app = false;
        self.have_session = false;
    }
}
