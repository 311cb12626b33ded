use std::num::ParseFloatError;
use std::time::Duration;

use thiserror::Error;

/// Failures of the byte channel to the decision process.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("decision process closed the channel")]
    Closed,
    #[error("no response from decision process within {0:?}")]
    Timeout(Duration),
}

/// Malformed traffic on an otherwise healthy channel.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("expected {expected} response values, got {got}")]
    Arity { expected: String, got: usize },
    #[error("response token {token:?} is not a number")]
    BadToken {
        token: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("response value at index {index} is not finite")]
    NonFinite { index: usize },
    #[error("episode already terminated, no further messages may be sent")]
    Terminated,
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("failed to establish decision channel: {0}")]
    Setup(String),
}

impl BridgeError {
    pub fn is_protocol(&self) -> bool {
        matches!(self, BridgeError::Protocol(_))
    }

    /// True when no later exchange in this episode can be trusted: the peer
    /// is gone, or a late reply would be read as the answer to the next tick.
    pub fn ends_exchange(&self) -> bool {
        matches!(
            self,
            BridgeError::Channel(ChannelError::Closed)
                | BridgeError::Channel(ChannelError::Timeout(_))
                | BridgeError::Protocol(ProtocolError::Terminated)
        )
    }
}
