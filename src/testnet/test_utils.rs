//! Helpers shared by the unit and integration tests

use crate::core::{unlink_chunk, ChunkHash, ChunkStore, ProtocolLimits};
use crate::error::{HostError, Result};
use std::time::Duration;

/// Deterministic payload of `len` bytes that differs at every offset mod 251
pub fn sample_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Follow links from `root` to the sentinel and rebuild the payload
pub fn reassemble(store: &ChunkStore, root: &ChunkHash) -> Result<Vec<u8>> {
    let mut pieces: Vec<&[u8]> = Vec::new();
    let mut cursor = *root;
    while !cursor.is_zero() {
        let chunk = store
            .get(&cursor)
            .ok_or_else(|| HostError::Protocol(format!("chunk {cursor} missing from store")))?;
        let (link, piece) = unlink_chunk(chunk)?;
        pieces.push(piece);
        cursor = link;
    }
    Ok(pieces.into_iter().flatten().copied().collect())
}

/// Limits small enough for a runaway peer to trip them quickly
pub fn fast_limits(max_rounds: usize) -> ProtocolLimits {
    ProtocolLimits {
        max_rounds,
        operation_timeout: Duration::from_secs(5),
    }
}
