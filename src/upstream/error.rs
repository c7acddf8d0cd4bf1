use thiserror::Error;

/// Failure talking to the upstream provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The connection could not be established.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The provider reset the connection before closing it cleanly.
    #[error("connection reset by upstream")]
    Reset,

    /// Any other I/O failure while sending the request or reading the payload.
    #[error("transfer failed: {0}")]
    Transfer(#[from] std::io::Error),
}

impl UpstreamError {
    /// Classifies an I/O error raised after the connection was established.
    pub(crate) fn from_transfer(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                UpstreamError::Reset
            }
            _ => UpstreamError::Transfer(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_from_transfer_maps_resets() {
        for kind in [ErrorKind::ConnectionReset, ErrorKind::ConnectionAborted] {
            assert!(matches!(
                UpstreamError::from_transfer(Error::from(kind)),
                UpstreamError::Reset
            ));
        }
    }

    #[test]
    fn test_from_transfer_keeps_other_errors() {
        let err = UpstreamError::from_transfer(Error::from(ErrorKind::BrokenPipe));
        assert!(
            matches!(&err, UpstreamError::Transfer(e) if e.kind() == ErrorKind::BrokenPipe),
            "got {:?}",
            err
        );
    }
}
