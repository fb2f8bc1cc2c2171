//! Error handling for the block transfer host
//!
//! Failures are split so a caller can tell a broken link (transport) from a
//! broken peer (protocol) from a peer that deliberately refused (status).

use crate::transport::StatusWord;
use std::fmt;

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, HostError>;

/// Error types for every host-side operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Channel-level failure: disconnect, malformed frame, socket error
    Transport(String),
    /// Peer sent something the protocol does not allow
    Protocol(String),
    /// Peer answered with a status word other than success
    Peer { status: StatusWord, data: Vec<u8> },
    /// Peer gave up in answer to the host not finding a chunk it asked for
    ChunkNotFound {
        hash: String,
        status: StatusWord,
        data: Vec<u8>,
    },
    /// Operation ran past its wall-clock budget
    Timeout(String),
    /// Operation ran past its round budget
    RoundLimit { rounds: usize },
    /// A request could not be encoded into a frame
    Encoding(String),
    /// Derivation path string could not be parsed
    InvalidPath(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

impl HostError {
    /// True for link-level failures
    pub fn is_transport(&self) -> bool {
        matches!(self, HostError::Transport(_))
    }

    /// True when the peer broke the protocol
    pub fn is_protocol(&self) -> bool {
        matches!(self, HostError::Protocol(_))
    }

    /// Status word reported by the peer, if the failure carries one
    pub fn status(&self) -> Option<StatusWord> {
        match self {
            HostError::Peer { status, .. } | HostError::ChunkNotFound { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Transport(msg) => write!(f, "Transport error: {msg}"),
            HostError::Protocol(msg) => write!(f, "Protocol violation: {msg}"),
            HostError::Peer { status, data } => {
                if data.is_empty() {
                    write!(f, "Peer reported {status}")
                } else {
                    write!(f, "Peer reported {status} ({})", hex::encode(data))
                }
            }
            HostError::ChunkNotFound { hash, status, data } => {
                write!(f, "Peer failed with {status} after chunk {hash} was not found")?;
                if !data.is_empty() {
                    write!(f, " ({})", hex::encode(data))?;
                }
                Ok(())
            }
            HostError::Timeout(msg) => write!(f, "Timed out: {msg}"),
            HostError::RoundLimit { rounds } => {
                write!(f, "Peer did not finish within {rounds} rounds")
            }
            HostError::Encoding(msg) => write!(f, "Encoding error: {msg}"),
            HostError::InvalidPath(msg) => write!(f, "Invalid derivation path: {msg}"),
            HostError::Config(msg) => write!(f, "Configuration error: {msg}"),
            HostError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        HostError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for HostError {
    fn from(err: toml::de::Error) -> Self {
        HostError::Config(err.to_string())
    }
}

impl From<hex::FromHexError> for HostError {
    fn from(err: hex::FromHexError) -> Self {
        HostError::Encoding(format!("invalid hex: {err}"))
    }
}
