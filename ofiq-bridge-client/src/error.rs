//! Client error types.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ofiq_bridge_protocol::ProtocolError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("no OFIQ installation found above '{}' (missing {marker})", path.display())]
    InstallationNotFound { path: PathBuf, marker: &'static str },

    #[error("no engine executable found under '{}'", root.display())]
    ExecutableNotFound { root: PathBuf },

    #[error("failed to spawn engine '{}': {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether the error came from the channel rather than from message content.
    ///
    /// A failed liveness probe swallows these; everything else propagates.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::ConnectTimeout(_) | ClientError::Io(_)
        )
    }

    /// Whether the error happened while locating or starting the engine.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ClientError::InstallationNotFound { .. }
                | ClientError::ExecutableNotFound { .. }
                | ClientError::Spawn { .. }
                | ClientError::Config(_)
        )
    }
}

impl From<zeromq::ZmqError> for ClientError {
    fn from(err: zeromq::ZmqError) -> Self {
        ClientError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofiq_bridge_protocol::ProtocolError;

    #[test]
    fn test_error_classification() {
        assert!(ClientError::Transport("closed".into()).is_transport());
        assert!(ClientError::ConnectTimeout("tcp://127.0.0.1:1".into()).is_transport());
        assert!(!ClientError::Protocol(ProtocolError::ImageIdMismatch {
            sent: 1,
            received: 2
        })
        .is_transport());
        assert!(!ClientError::Protocol(ProtocolError::InexactScore(0.5)).is_transport());

        assert!(ClientError::ExecutableNotFound {
            root: PathBuf::from("/opt/ofiq")
        }
        .is_setup());
        assert!(!ClientError::Transport("x".into()).is_setup());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Protocol(ProtocolError::ImageIdMismatch {
            sent: 7,
            received: 6,
        });
        assert_eq!(
            err.to_string(),
            "protocol error: image id mismatch: sent 7, reply carries 6"
        );

        let err = ClientError::InstallationNotFound {
            path: PathBuf::from("/tmp/x"),
            marker: "data/ofiq_config.jaxn",
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x"));
        assert!(msg.contains("data/ofiq_config.jaxn"));
    }
}
