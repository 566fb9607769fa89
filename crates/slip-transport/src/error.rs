/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting a TCP socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer sent something other than a valid WebSocket upgrade.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The peer did not finish the upgrade in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimedOut(std::time::Duration),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
