use thiserror::Error;

use crate::protocol::ProtocolError;

/// Session error types.
///
/// These only ever end the session they occur in.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Client socket fault: reset, broken pipe and the like.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
