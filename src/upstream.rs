//! Upstream AGPS provider client.
//!
//! The relay talks to the provider over a fresh TCP connection per fetch.
//! Fetches are gated by the geo cache, so they are rare and there is nothing to
//! gain from pooling connections.

mod error;
mod tcp;

pub use error::UpstreamError;
pub use tcp::TcpUpstream;

use bytes::Bytes;

use crate::protocol::Params;

/// Source of AGPS payloads.
///
/// The geo cache is generic over this trait so tests can substitute a
/// scripted provider for the real network client.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: refreshes run on their own tokio
/// tasks and share the provider through an `Arc`.
pub trait Upstream: Send + Sync {
    /// Sends `params` to the provider and returns the complete response.
    ///
    /// A provider that closes cleanly without sending anything yields an empty
    /// payload, not an error.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError` if the provider cannot be reached or the
    /// connection fails before the provider closes it.
    fn fetch(
        &self,
        params: &Params,
    ) -> impl std::future::Future<Output = Result<Bytes, UpstreamError>> + Send;
}
