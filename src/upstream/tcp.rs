use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{Upstream, UpstreamError};
use crate::protocol::Params;

/// Initial capacity of the response buffer. A full AssistNow almanac is a few KB.
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Upstream client that opens a new TCP connection for every fetch.
///
/// There is no timeout here; the client session that triggered the fetch is
/// bounded by its own idle timeout.
#[derive(Debug, Clone)]
pub struct TcpUpstream {
    host: String,
    port: u16,
}

impl TcpUpstream {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the `host:port` this client connects to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Upstream for TcpUpstream {
    async fn fetch(&self, params: &Params) -> Result<Bytes, UpstreamError> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| UpstreamError::Connect {
                addr: self.addr(),
                source,
            })?;

        let request = params.encode();
        debug!(upstream = %self.addr(), ">> {}", request);
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(UpstreamError::from_transfer)?;

        // Request-then-response: the provider signals completion by closing.
        let mut body = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
        loop {
            let n = stream
                .read_buf(&mut body)
                .await
                .map_err(UpstreamError::from_transfer)?;
            if n == 0 {
                break;
            }
        }

        debug!(upstream = %self.addr(), "<< {} bytes", body.len());
        Ok(body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Spawns a one-shot provider that records the request and replies with `reply`.
    async fn spawn_provider(reply: &'static [u8]) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(reply).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(buf[..n].to_vec()).unwrap()
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_fetch_collects_until_close() {
        let (port, provider) = spawn_provider(&[0xB5, 0x62, 0x0B, 0x31]).await;
        let upstream = TcpUpstream::new("127.0.0.1", port);

        let params = Params::decode("lat=30.45;lon=114.17;pacc=1500000");
        let body = upstream.fetch(&params).await.unwrap();

        assert_eq!(&body[..], &[0xB5, 0x62, 0x0B, 0x31]);
        assert_eq!(provider.await.unwrap(), "lat=30.45;lon=114.17;pacc=1500000");
    }

    #[tokio::test]
    async fn test_fetch_empty_response_is_ok() {
        let (port, _provider) = spawn_provider(&[]).await;
        let upstream = TcpUpstream::new("127.0.0.1", port);

        let body = upstream.fetch(&Params::decode("lat=1;lon=2")).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let upstream = TcpUpstream::new("127.0.0.1", port);
        let err = upstream
            .fetch(&Params::decode("lat=1;lon=2"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Connect { .. }), "got {:?}", err);
    }
}
