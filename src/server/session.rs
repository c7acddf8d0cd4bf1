mod error;

pub use error::SessionError;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::cache::GeoCache;
use crate::protocol::{Params, RequestCodec};
use crate::upstream::Upstream;

/// Where a session is in its one-request lifecycle.
///
/// ```text
/// AwaitingRequest -> Resolving -> Responding -> Closed
///        \______________\_____________\_______/  (error or timeout)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingRequest,
    Resolving,
    Responding,
    Closed,
}

/// A single client connection.
///
/// The protocol is one-shot: the client sends one parameter string, the relay
/// answers with the payload of the nearest cache slot and closes. There is no
/// error frame; a failed request is answered with an empty stream.
pub struct Session<U: Upstream> {
    framed: Framed<TcpStream, RequestCodec>,
    cache: Arc<GeoCache<U>>,
    idle_timeout: Duration,
    state: SessionState,
}

impl<U: Upstream + 'static> Session<U> {
    pub fn new(
        framed: Framed<TcpStream, RequestCodec>,
        cache: Arc<GeoCache<U>>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            framed,
            cache,
            idle_timeout,
            state: SessionState::AwaitingRequest,
        }
    }

    /// Serves the connection to completion and closes it.
    ///
    /// Timeouts, invalid requests and missing data are normal terminations and
    /// return `Ok`. Only socket and framing faults are returned as errors.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let result = self.serve().await;
        debug!(state = ?self.state, "closing");
        self.state = SessionState::Closed;

        // The relay always closes first; a peer that already left is fine.
        if let Err(e) = self.framed.get_mut().shutdown().await {
            debug!("shutdown after close: {}", e);
        }
        result
    }

    async fn serve(&mut self) -> Result<(), SessionError> {
        let Some(params) = self.read_request().await? else {
            return Ok(());
        };

        self.state = SessionState::Resolving;
        let content = match timeout(self.idle_timeout, self.cache.resolve_nearest(&params)).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                warn!("{}", e);
                return Ok(());
            }
            Err(_) => {
                info!("socket timeout while resolving");
                return Ok(());
            }
        };

        if content.is_empty() {
            warn!("no data available");
            return Ok(());
        }

        self.state = SessionState::Responding;
        let size = content.len();
        self.framed.send(content).await?;
        info!(">> {} bytes", size);
        Ok(())
    }

    /// Waits for the request. Returns `None` if the client goes idle or
    /// disconnects without sending anything.
    async fn read_request(&mut self) -> Result<Option<Params>, SessionError> {
        self.state = SessionState::AwaitingRequest;
        match timeout(self.idle_timeout, self.framed.next()).await {
            Ok(Some(Ok(params))) => {
                info!("<< {}", params);
                Ok(Some(params))
            }
            Ok(Some(Err(e))) => Err(e.into()),
            Ok(None) => {
                debug!("client closed without a request");
                Ok(None)
            }
            Err(_) => {
                info!("socket timeout");
                Ok(None)
            }
        }
    }
}
