use crate::config::Settings;
use crate::core::block_protocol::{BlockProtocol, ProtocolLimits};
use crate::core::chunk::DEFAULT_CHUNK_SIZE;
use crate::core::simple::send_chunks;
use crate::error::Result;
use crate::transport::{ApduHeader, Exchange, MAX_APDU_DATA_LEN};
use std::fmt;
use std::str::FromStr;

/// How one logical operation moves its payloads to the peer
pub trait SendStrategy {
    fn send(
        &self,
        transport: &mut dyn Exchange,
        header: &ApduHeader,
        payloads: &[Vec<u8>],
    ) -> Result<Vec<u8>>;
}

/// Unaddressed in-order frames, last response wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleChunks {
    pub max_frame: usize,
}

impl Default for SimpleChunks {
    fn default() -> Self {
        Self {
            max_frame: MAX_APDU_DATA_LEN,
        }
    }
}

impl SendStrategy for SimpleChunks {
    fn send(
        &self,
        transport: &mut dyn Exchange,
        header: &ApduHeader,
        payloads: &[Vec<u8>],
    ) -> Result<Vec<u8>> {
        send_chunks(transport, header, payloads, self.max_frame)
    }
}

/// Hash-linked chunks served on demand through the block protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTransfer {
    pub chunk_size: usize,
    pub limits: ProtocolLimits,
}

impl Default for BlockTransfer {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            limits: ProtocolLimits::default(),
        }
    }
}

impl SendStrategy for BlockTransfer {
    fn send(
        &self,
        transport: &mut dyn Exchange,
        header: &ApduHeader,
        payloads: &[Vec<u8>],
    ) -> Result<Vec<u8>> {
        // Fresh store per operation, dropped with the driver
        BlockProtocol::from_payloads(*header, payloads, self.chunk_size, self.limits)?
            .run(transport)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    #[default]
    Simple,
    Blocks,
}

impl SendMode {
    pub fn from_flag(use_block_protocol: bool) -> Self {
        if use_block_protocol {
            SendMode::Blocks
        } else {
            SendMode::Simple
        }
    }

    /// Pick the strategy for one operation
    pub fn strategy(self, settings: &Settings) -> Box<dyn SendStrategy> {
        match self {
            SendMode::Simple => Box::new(SimpleChunks {
                max_frame: settings.max_frame_len,
            }),
            SendMode::Blocks => Box::new(BlockTransfer {
                chunk_size: settings.chunk_size,
                limits: settings.limits(),
            }),
        }
    }
}

impl FromStr for SendMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" | "chunks" => Ok(SendMode::Simple),
            "blocks" | "block" => Ok(SendMode::Blocks),
            _ => Err(format!("Invalid send mode: {s}. Valid options: simple, blocks")),
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendMode::Simple => write!(f, "simple"),
            SendMode::Blocks => write!(f, "blocks"),
        }
    }
}
