use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::{Params, ProtocolError};

/// Maximum request size in bytes (4 KB).
/// A parameter string from a GNSS module is a few hundred bytes at most.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 4 * 1024;

/// Codec for the client socket.
///
/// Decodes whatever arrived in one read as a complete `Params` request (the
/// protocol has no framing, and devices send the whole string in one write),
/// and encodes the response payload verbatim.
pub struct RequestCodec {
    pub(crate) max_request_size: usize,
}

impl RequestCodec {
    /// Creates a new RequestCodec with the default maximum request size.
    pub fn new() -> Self {
        Self {
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }

    pub fn with_max_request_size(max_request_size: usize) -> Self {
        Self { max_request_size }
    }
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RequestCodec {
    type Item = Params;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        if src.len() > self.max_request_size {
            return Err(ProtocolError::RequestTooLarge {
                size: src.len(),
                max: self.max_request_size,
            });
        }

        let raw = src.split_to(src.len());
        Ok(Some(Params::decode(&String::from_utf8_lossy(&raw))))
    }
}

impl Encoder<Bytes> for RequestCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}
