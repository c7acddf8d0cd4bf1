use thiserror::Error;

/// Client framing errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The client sent more bytes than a parameter string can reasonably be.
    #[error("request too large: {size} bytes (max {max})")]
    RequestTooLarge { size: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
