use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::{Instrument, error, info, info_span, warn};

use crate::cache::GeoCache;
use crate::config::DEFAULT_IDLE_TIMEOUT;
use crate::protocol::{DEFAULT_MAX_REQUEST_SIZE, RequestCodec};
use crate::server::session::Session;
use crate::upstream::Upstream;

/// Pause after a failed accept (e.g. EMFILE) before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// TCP server relaying AGPS requests through a shared `GeoCache`.
pub struct Server<U: Upstream> {
    listener: TcpListener,
    next_id: Arc<AtomicU64>,
    cache: Arc<GeoCache<U>>,
    idle_timeout: Duration,
    max_request_size: usize,
}

impl<U: Upstream + 'static> Server<U> {
    /// Creates a new server with a given listener and cache.
    pub fn new(listener: TcpListener, cache: Arc<GeoCache<U>>) -> Self {
        Self {
            listener,
            next_id: Arc::new(AtomicU64::new(1)),
            cache,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_max_request_size(mut self, max_request_size: usize) -> Self {
        self.max_request_size = max_request_size;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one task per session.
    ///
    /// A failing session is logged and never affects the listener or other
    /// sessions. Accept errors are logged and retried.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        // NOTE: There is no connection limit and no graceful shutdown; the
        // process is expected to run under a supervisor that restarts it.
        loop {
            let (socket, peer_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let span = info_span!("session", id, peer = %format_peer(peer_addr));
            let framed = Framed::new(socket, RequestCodec::with_max_request_size(self.max_request_size));
            let session = Session::new(framed, Arc::clone(&self.cache), self.idle_timeout);

            tokio::spawn(
                async move {
                    info!("accepted connection");
                    if let Err(e) = session.run().await {
                        warn!("{}", e);
                    }
                    info!("connection closed");
                }
                .instrument(span),
            );
        }
    }
}

/// Formats a peer as `address@port`.
fn format_peer(addr: SocketAddr) -> String {
    format!("{}@{}", addr.ip(), addr.port())
}
