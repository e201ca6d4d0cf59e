//! Coordinator session management for the Underlords client.
//!
//! This crate owns the lifecycle of one coordinator session:
//!
//! 1. **App presence**: whether Underlords is currently "running" on the
//!    logged-on account (the coordinator only talks to running apps).
//! 2. **Handshake**: sending `ClientHello` with exponential backoff until
//!    the coordinator answers with `ClientWelcome` ([`Connection`]).
//! 3. **Session loss**: reacting to connection status reports and
//!    transport loss, and starting over.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client Layer (above)  ← turns Actions into sends and events
//!     ↕
//! Session Layer (this crate)  ← pure state machine, time injected
//!     ↕
//! Protocol Layer (below)  ← provides GcConnectionStatus
//! ```
//!
//! [`Connection`] never performs I/O or sleeps. Callers feed it events and
//! the current time, act on the returned [`Action`], and wake it up at
//! [`Connection::hello_deadline`].

mod config;
mod connection;

pub use config::HandshakeConfig;
pub use connection::{Action, Connection, SessionState};
