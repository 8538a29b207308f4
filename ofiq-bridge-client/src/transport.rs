//! Request/reply channel to the engine.
//!
//! A [`Connector`] hands out [`Channel`]s for an endpoint. Opening never
//! performs I/O; the ZeroMQ implementation connects lazily on the first send,
//! retrying until the engine has bound its socket or the connect bound
//! expires.

use crate::config::ClientConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::time::Instant;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// One request/reply channel. A reply must be received before the next send.
#[async_trait]
pub trait Channel: Send {
    /// Sends one complete frame.
    async fn send(&mut self, frame: Bytes) -> Result<(), ClientError>;

    /// Waits for one complete frame.
    async fn recv(&mut self) -> Result<Bytes, ClientError>;
}

/// Creates channels to an endpoint.
pub trait Connector: Send + Sync {
    type Channel: Channel;

    /// Opens a channel without any handshake; the caller assumes it is usable.
    fn open(&self, endpoint: &str) -> Self::Channel;
}

/// Connector for ZeroMQ REQ sockets.
#[derive(Debug, Clone)]
pub struct ZmqConnector {
    connect_timeout: Duration,
    retry_interval: Duration,
}

impl ZmqConnector {
    pub fn new(connect_timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            connect_timeout,
            retry_interval,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.connect_timeout(), config.connect_retry())
    }
}

impl Default for ZmqConnector {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl Connector for ZmqConnector {
    type Channel = ZmqChannel;

    fn open(&self, endpoint: &str) -> ZmqChannel {
        tracing::debug!("Opening REQ channel to {}", endpoint);
        ZmqChannel {
            endpoint: endpoint.to_string(),
            socket: None,
            connect_timeout: self.connect_timeout,
            retry_interval: self.retry_interval,
        }
    }
}

/// A ZeroMQ REQ socket that connects on first use.
///
/// Dropping the channel closes the socket at once, discarding anything
/// still queued.
pub struct ZmqChannel {
    endpoint: String,
    socket: Option<ReqSocket>,
    connect_timeout: Duration,
    retry_interval: Duration,
}

impl ZmqChannel {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn connect(&mut self) -> Result<&mut ReqSocket, ClientError> {
        if self.socket.is_none() {
            let socket = connect_with_retry(
                &self.endpoint,
                self.connect_timeout,
                self.retry_interval,
            )
            .await?;
            self.socket = Some(socket);
        }
        self.socket
            .as_mut()
            .ok_or_else(|| ClientError::Transport("socket not connected".to_string()))
    }
}

/// Connects a fresh REQ socket, retrying until `timeout` has elapsed.
///
/// The engine may still be starting up, so refused connections are expected
/// for a while after a spawn.
async fn connect_with_retry(
    endpoint: &str,
    timeout: Duration,
    retry_interval: Duration,
) -> Result<ReqSocket, ClientError> {
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let mut socket = ReqSocket::new();
        let remaining = deadline.saturating_duration_since(Instant::now());

        match tokio::time::timeout(remaining, socket.connect(endpoint)).await {
            Ok(Ok(())) => {
                tracing::debug!("Connected to {} after {} attempt(s)", endpoint, attempt);
                return Ok(socket);
            }
            Ok(Err(e)) => {
                if Instant::now() + retry_interval >= deadline {
                    tracing::debug!("Giving up on {}: {}", endpoint, e);
                    return Err(ClientError::ConnectTimeout(endpoint.to_string()));
                }
                tracing::debug!("Connect attempt {} to {} failed: {}", attempt, endpoint, e);
                tokio::time::sleep(retry_interval).await;
            }
            Err(_) => {
                tracing::debug!("Connect to {} timed out", endpoint);
                return Err(ClientError::ConnectTimeout(endpoint.to_string()));
            }
        }
    }
}

#[async_trait]
impl Channel for ZmqChannel {
    async fn send(&mut self, frame: Bytes) -> Result<(), ClientError> {
        let socket = self.connect().await?;
        socket.send(ZmqMessage::from(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Bytes, ClientError> {
        let socket = self.connect().await?;
        let message = socket.recv().await?;
        let mut parts = message.into_vec();
        // Multipart replies are concatenated into one frame.
        if parts.len() == 1 {
            return Ok(parts.remove(0));
        }
        let mut frame = BytesMut::with_capacity(parts.iter().map(Bytes::len).sum());
        for part in parts {
            frame.extend_from_slice(&part);
        }
        Ok(frame.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeromq::RepSocket;

    #[test]
    fn test_open_is_lazy() {
        let connector = ZmqConnector::default();
        let channel = connector.open("tcp://127.0.0.1:40411");
        assert_eq!(channel.endpoint(), "tcp://127.0.0.1:40411");
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_roundtrip_over_loopback() {
        let mut rep = RepSocket::new();
        let endpoint = rep.bind("tcp://127.0.0.1:0").await.unwrap().to_string();

        let server = tokio::spawn(async move {
            let request = rep.recv().await.unwrap();
            let body = request.into_vec().remove(0);
            let mut reply = body.to_vec();
            reply.reverse();
            rep.send(ZmqMessage::from(reply)).await.unwrap();
        });

        let connector = ZmqConnector::new(Duration::from_secs(5), Duration::from_millis(10));
        let mut channel = connector.open(&endpoint);
        channel.send(Bytes::from_static(&[1, 2, 3])).await.unwrap();
        assert!(channel.is_connected());
        let reply = channel.recv().await.unwrap();
        assert_eq!(reply.as_ref(), &[3, 2, 1]);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_timeout() {
        // Bind then drop to obtain a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let endpoint = format!("tcp://127.0.0.1:{}", port);

        let connector = ZmqConnector::new(Duration::from_millis(200), Duration::from_millis(20));
        let mut channel = connector.open(&endpoint);
        let err = channel.send(Bytes::from_static(&[0])).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectTimeout(_)));
        assert!(!channel.is_connected());
    }
}
