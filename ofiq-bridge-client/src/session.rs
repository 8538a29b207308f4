//! Transport session.
//!
//! A session owns at most one channel and moves through three states:
//!
//! ```text
//!   Unopened --open--> Ready --probe--> Probing --reply--> Ready
//!                                          |
//!                                          +--timeout--> Ready (fresh channel)
//! ```
//!
//! Opening is optimistic: no handshake happens, the new channel is assumed
//! usable. A probe is a PING bounded by the probe timeout; only the probe is
//! bounded, every other exchange waits for its reply indefinitely.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{Channel, Connector};
use ofiq_bridge_protocol::{Decoded, Reply, Request, HEADER_SIZE};
use std::time::Duration;

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Ready,
    Probing,
}

enum State<Ch> {
    Unopened,
    Ready(Ch),
    Probing(Ch),
}

/// A request/reply session with the engine.
pub struct Session<C: Connector> {
    connector: C,
    endpoint: String,
    probe_timeout: Duration,
    state: State<C::Channel>,
}

impl<C: Connector> Session<C> {
    pub fn new(connector: C, endpoint: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            connector,
            endpoint: endpoint.into(),
            probe_timeout,
            state: State::Unopened,
        }
    }

    pub fn from_config(connector: C, config: &ClientConfig) -> Self {
        Self::new(connector, config.endpoint.clone(), config.probe_timeout())
    }

    pub fn state(&self) -> SessionState {
        match self.state {
            State::Unopened => SessionState::Unopened,
            State::Ready(_) => SessionState::Ready,
            State::Probing(_) => SessionState::Probing,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Opens a channel if there is none. Returns `true` if this call opened it.
    ///
    /// A session left in `Probing` by an abandoned probe gets a fresh channel,
    /// since its old one still has a PING outstanding.
    pub fn open(&mut self) -> bool {
        match self.state {
            State::Ready(_) => false,
            State::Probing(_) => {
                tracing::debug!("Discarding channel left over from an interrupted probe");
                self.replace_channel();
                false
            }
            State::Unopened => {
                tracing::debug!("Opening session to {}", self.endpoint);
                self.state = State::Ready(self.connector.open(&self.endpoint));
                true
            }
        }
    }

    /// Drops the current channel without waiting for anything pending and
    /// opens a new one to the same endpoint.
    fn replace_channel(&mut self) {
        self.state = State::Unopened;
        tracing::debug!("Reopening channel to {}", self.endpoint);
        self.state = State::Ready(self.connector.open(&self.endpoint));
    }

    fn finish_probe(&mut self) {
        if let State::Probing(channel) = std::mem::replace(&mut self.state, State::Unopened) {
            self.state = State::Ready(channel);
        }
    }

    /// Sends a PING and waits up to the probe timeout for the reply.
    ///
    /// Returns `Ok(false)` when the engine did not answer in time or the
    /// channel failed; the channel has then been replaced. Protocol faults in
    /// a received reply are returned as errors.
    pub async fn probe(&mut self) -> Result<bool, ClientError> {
        self.open();
        if let State::Ready(channel) = std::mem::replace(&mut self.state, State::Unopened) {
            self.state = State::Probing(channel);
        }

        let probe_timeout = self.probe_timeout;
        let outcome = match &mut self.state {
            State::Probing(channel) => {
                tokio::time::timeout(probe_timeout, exchange_on(channel, &Request::Ping)).await
            }
            _ => return Ok(false),
        };

        match outcome {
            Ok(Ok(_)) => {
                self.finish_probe();
                tracing::debug!("Probe answered by {}", self.endpoint);
                Ok(true)
            }
            Ok(Err(e)) if e.is_transport() => {
                tracing::warn!("Probe to {} failed: {}", self.endpoint, e);
                self.replace_channel();
                Ok(false)
            }
            Ok(Err(e)) => {
                self.finish_probe();
                Err(e)
            }
            Err(_) => {
                tracing::warn!(
                    "Probe to {} timed out after {:?}",
                    self.endpoint,
                    probe_timeout
                );
                self.replace_channel();
                Ok(false)
            }
        }
    }

    /// Sends `request` and waits, without a timeout, for the matching reply.
    pub async fn exchange(&mut self, request: &Request) -> Result<Reply, ClientError> {
        self.open();
        let result = match &mut self.state {
            State::Ready(channel) => exchange_on(channel, request).await,
            _ => Err(ClientError::Transport("session is not ready".to_string())),
        };

        match result {
            Ok(decoded) => Ok(decoded.message),
            Err(e) => {
                if e.is_transport() {
                    tracing::warn!("Exchange with {} failed: {}", self.endpoint, e);
                    self.replace_channel();
                }
                Err(e)
            }
        }
    }

    /// Releases the channel. The next operation opens a new one.
    pub fn close(&mut self) {
        if !matches!(self.state, State::Unopened) {
            tracing::debug!("Closing session to {}", self.endpoint);
        }
        self.state = State::Unopened;
    }
}

/// One request/reply round trip on `channel`.
async fn exchange_on<Ch: Channel + ?Sized>(
    channel: &mut Ch,
    request: &Request,
) -> Result<Decoded<Reply>, ClientError> {
    let command = request.command();
    let frame = request.encode()?;
    tracing::debug!("Sending {:?} ({} bytes)", command, frame.len());
    channel.send(frame).await?;

    let reply = channel.recv().await?;
    tracing::debug!("Received reply to {:?} ({} bytes)", command, reply.len());
    tracing::trace!(
        "Reply header: {}",
        hex::encode(&reply[..reply.len().min(HEADER_SIZE)])
    );

    let decoded = Reply::decode_for(reply, request)?;
    if !decoded.is_complete() {
        tracing::warn!(
            "Unexpected leftover data at the end of the {:?} reply: {} bytes",
            command,
            decoded.trailing_bytes
        );
    }
    Ok(decoded)
}
