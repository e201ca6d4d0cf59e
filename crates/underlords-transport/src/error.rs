/// Errors reported by a game-coordinator transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying Steam connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Handing a message to the coordinator failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// There is no logged-on Steam identity to send as.
    #[error("not logged on")]
    NotLoggedOn,

    /// The transport has shut down and will deliver no more events.
    #[error("transport shut down")]
    Shutdown,
}
