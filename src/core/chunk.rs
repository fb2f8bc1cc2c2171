use crate::core::ChunkStore;
use crate::error::{HostError, Result};
use crate::utils::{sha256_digest, SHA256_LEN};
use data_encoding::HEXLOWER;
use serde::{Serialize, Serializer};
use std::fmt;

/// Payload bytes carried by one linked chunk
pub const DEFAULT_CHUNK_SIZE: usize = 180;

/// Size of the predecessor link in front of every linked chunk
pub const LINK_LEN: usize = SHA256_LEN;

/// Content hash of a chunk, or the all-zero "no predecessor" sentinel
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkHash([u8; SHA256_LEN]);

impl ChunkHash {
    pub const ZERO: ChunkHash = ChunkHash([0u8; SHA256_LEN]);

    pub fn new(bytes: [u8; SHA256_LEN]) -> Self {
        Self(bytes)
    }

    /// Hash of a chunk's full on-wire encoding
    pub fn of(bytes: &[u8]) -> Self {
        Self(sha256_digest(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; SHA256_LEN] = bytes.try_into().map_err(|_| {
            HostError::Protocol(format!(
                "chunk hash must be {SHA256_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; SHA256_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }
}

impl fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkHash({})", self.to_hex())
    }
}

impl Serialize for ChunkHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Slice `payload` into pieces of at most `chunk_size` bytes, in order
pub fn split_payload(payload: &[u8], chunk_size: usize) -> Result<Vec<&[u8]>> {
    if chunk_size == 0 {
        return Err(HostError::Config("chunk size must be positive".to_string()));
    }
    Ok(payload.chunks(chunk_size).collect())
}

/// Chunk `payload` into `store` and return its root hash
///
/// Slices are linked from last to first: each stored chunk is
/// `hash(chunk of the following slice) || slice`, so the last slice carries
/// the zero sentinel and the returned root names the first slice. Walking
/// links from the root yields the slices in payload order. An empty payload
/// stores nothing and returns the sentinel.
pub fn link_payload(payload: &[u8], chunk_size: usize, store: &mut ChunkStore) -> Result<ChunkHash> {
    let slices = split_payload(payload, chunk_size)?;
    let mut last_hash = ChunkHash::ZERO;

    for slice in slices.iter().rev() {
        let mut linked = Vec::with_capacity(LINK_LEN + slice.len());
        linked.extend_from_slice(last_hash.as_bytes());
        linked.extend_from_slice(slice);

        let hash = ChunkHash::of(&linked);
        store.insert_linked(hash, linked);
        last_hash = hash;
    }

    Ok(last_hash)
}

/// Link every payload into `store`, returning their roots in input order
pub fn link_payloads<P: AsRef<[u8]>>(
    payloads: &[P],
    chunk_size: usize,
    store: &mut ChunkStore,
) -> Result<Vec<ChunkHash>> {
    payloads
        .iter()
        .map(|payload| link_payload(payload.as_ref(), chunk_size, store))
        .collect()
}

/// Split a linked chunk into the link to the following slice and its payload
pub fn unlink_chunk(chunk: &[u8]) -> Result<(ChunkHash, &[u8])> {
    if chunk.len() < LINK_LEN {
        return Err(HostError::Protocol(format!(
            "linked chunk of {} bytes is shorter than its link",
            chunk.len()
        )));
    }
    let (link, payload) = chunk.split_at(LINK_LEN);
    Ok((ChunkHash::from_slice(link)?, payload))
}
