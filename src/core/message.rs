//! Per-round message bodies of the block protocol
//!
//! Every body is one tag byte followed by tag-specific bytes. The two
//! directions use separate tag vocabularies.

use crate::core::chunk::ChunkHash;
use crate::error::{HostError, Result};
use crate::utils::SHA256_LEN;

/// Host to peer tags
pub mod host_tag {
    pub const START: u8 = 0;
    pub const CHUNK_FOUND: u8 = 1;
    pub const CHUNK_NOT_FOUND: u8 = 2;
    pub const PUT_CHUNK_ACK: u8 = 3;
    pub const ACCUMULATE_ACK: u8 = 4;
}

/// Peer to host tags
pub mod peer_tag {
    pub const ACCUMULATE: u8 = 0;
    pub const FINAL: u8 = 1;
    pub const GET_CHUNK: u8 = 2;
    pub const PUT_CHUNK: u8 = 3;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    Start(Vec<ChunkHash>),
    ChunkFound(Vec<u8>),
    ChunkNotFound,
    PutChunkAck,
    AccumulateAck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    Accumulate(Vec<u8>),
    Final(Vec<u8>),
    GetChunk(ChunkHash),
    PutChunk(Vec<u8>),
}

impl HostMessage {
    pub fn tag(&self) -> u8 {
        match self {
            HostMessage::Start(_) => host_tag::START,
            HostMessage::ChunkFound(_) => host_tag::CHUNK_FOUND,
            HostMessage::ChunkNotFound => host_tag::CHUNK_NOT_FOUND,
            HostMessage::PutChunkAck => host_tag::PUT_CHUNK_ACK,
            HostMessage::AccumulateAck => host_tag::ACCUMULATE_ACK,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.tag()];
        match self {
            HostMessage::Start(roots) => {
                for root in roots {
                    out.extend_from_slice(root.as_bytes());
                }
            }
            HostMessage::ChunkFound(chunk) => out.extend_from_slice(chunk),
            HostMessage::ChunkNotFound | HostMessage::PutChunkAck | HostMessage::AccumulateAck => {}
        }
        out
    }

    pub fn decode(body: &[u8]) -> Result<Self> {
        let (tag, rest) = body
            .split_first()
            .ok_or_else(|| HostError::Protocol("empty host message".to_string()))?;

        match *tag {
            host_tag::START => {
                if rest.len() % SHA256_LEN != 0 {
                    return Err(HostError::Protocol(format!(
                        "START carries {} bytes, not a whole number of hashes",
                        rest.len()
                    )));
                }
                let roots = rest
                    .chunks(SHA256_LEN)
                    .map(ChunkHash::from_slice)
                    .collect::<Result<Vec<_>>>()?;
                Ok(HostMessage::Start(roots))
            }
            host_tag::CHUNK_FOUND => Ok(HostMessage::ChunkFound(rest.to_vec())),
            host_tag::CHUNK_NOT_FOUND => Ok(HostMessage::ChunkNotFound),
            host_tag::PUT_CHUNK_ACK => Ok(HostMessage::PutChunkAck),
            host_tag::ACCUMULATE_ACK => Ok(HostMessage::AccumulateAck),
            other => Err(HostError::Protocol(format!("unknown host tag {other}"))),
        }
    }
}

impl PeerMessage {
    pub fn tag(&self) -> u8 {
        match self {
            PeerMessage::Accumulate(_) => peer_tag::ACCUMULATE,
            PeerMessage::Final(_) => peer_tag::FINAL,
            PeerMessage::GetChunk(_) => peer_tag::GET_CHUNK,
            PeerMessage::PutChunk(_) => peer_tag::PUT_CHUNK,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.tag()];
        match self {
            PeerMessage::Accumulate(bytes)
            | PeerMessage::Final(bytes)
            | PeerMessage::PutChunk(bytes) => out.extend_from_slice(bytes),
            PeerMessage::GetChunk(hash) => out.extend_from_slice(hash.as_bytes()),
        }
        out
    }

    pub fn decode(body: &[u8]) -> Result<Self> {
        let (tag, rest) = body
            .split_first()
            .ok_or_else(|| HostError::Protocol("empty response from peer".to_string()))?;

        match *tag {
            peer_tag::ACCUMULATE => Ok(PeerMessage::Accumulate(rest.to_vec())),
            peer_tag::FINAL => Ok(PeerMessage::Final(rest.to_vec())),
            peer_tag::GET_CHUNK => Ok(PeerMessage::GetChunk(ChunkHash::from_slice(rest)?)),
            peer_tag::PUT_CHUNK => Ok(PeerMessage::PutChunk(rest.to_vec())),
            other => Err(HostError::Protocol(format!(
                "unknown instruction {other} returned from peer"
            ))),
        }
    }
}
