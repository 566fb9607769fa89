//! Unified error type for the Slip server.

use slip_transport::TransportError;

/// Top-level error for building and running a server.
///
/// Room and protocol failures never escape the hub: they are reported to
/// the client as `room:error` frames instead.
#[derive(Debug, thiserror::Error)]
pub enum SlipError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The hub task has stopped and can no longer take commands.
    #[error("room hub is not running")]
    HubUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::HandshakeFailed("bad upgrade".into());
        let slip_err: SlipError = err.into();
        assert!(matches!(slip_err, SlipError::Transport(_)));
        assert!(slip_err.to_string().contains("bad upgrade"));
    }

    #[test]
    fn test_bind_failure_is_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let slip_err: SlipError = TransportError::AcceptFailed(io).into();
        assert!(slip_err.to_string().contains("in use"));
    }

    #[test]
    fn test_hub_unavailable_message() {
        assert_eq!(SlipError::HubUnavailable.to_string(), "room hub is not running");
    }
}
