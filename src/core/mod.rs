//! Core block transfer functionality
//!
//! This module contains the protocol pieces that do not care how bytes reach
//! the peer: chunk linking, the chunk store, per-round messages, the block
//! protocol driver, the simple chunked sender, and the strategy that picks
//! between the last two.

pub mod block_protocol;
pub mod chunk;
pub mod manifest;
pub mod message;
pub mod simple;
pub mod store;
pub mod strategy;

pub use block_protocol::{BlockProtocol, DriverState, ProtocolLimits, Step};
pub use chunk::{
    link_payload, link_payloads, split_payload, unlink_chunk, ChunkHash, DEFAULT_CHUNK_SIZE,
    LINK_LEN,
};
pub use manifest::{ChunkManifest, ManifestEntry};
pub use message::{HostMessage, PeerMessage};
pub use simple::send_chunks;
pub use store::ChunkStore;
pub use strategy::{BlockTransfer, SendMode, SendStrategy, SimpleChunks};
