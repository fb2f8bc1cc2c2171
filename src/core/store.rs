use crate::core::ChunkHash;
use data_encoding::HEXLOWER;
use log::trace;
use std::collections::HashMap;
use zeroize::Zeroize;

/// ( K -> chunk hash hex, V => raw chunk bytes )
///
/// Owned by exactly one logical operation. Chunk contents are wiped when
/// the store is dropped.
#[derive(Debug, Default)]
pub struct ChunkStore {
    inner: HashMap<String, Vec<u8>>,
}

impl ChunkStore {
    pub fn new() -> ChunkStore {
        ChunkStore {
            inner: HashMap::new(),
        }
    }

    /// Store a chunk under a hash the caller already computed
    pub fn insert_linked(&mut self, hash: ChunkHash, chunk: Vec<u8>) {
        trace!("storing chunk {hash} ({} bytes)", chunk.len());
        if let Some(mut previous) = self.inner.insert(hash.to_hex(), chunk) {
            previous.zeroize();
        }
    }

    /// Store bytes pushed by the peer under their own SHA-256
    pub fn put(&mut self, chunk: Vec<u8>) -> ChunkHash {
        let hash = ChunkHash::of(&chunk);
        self.insert_linked(hash, chunk);
        hash
    }

    pub fn get(&self, hash: &ChunkHash) -> Option<&[u8]> {
        self.inner.get(&hash.to_hex()).map(Vec::as_slice)
    }

    pub fn contains(&self, hash: &ChunkHash) -> bool {
        self.inner.contains_key(&hash.to_hex())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All stored hashes, sorted
    pub fn hashes(&self) -> Vec<ChunkHash> {
        let mut hashes: Vec<ChunkHash> = self
            .inner
            .keys()
            .filter_map(|key| HEXLOWER.decode(key.as_bytes()).ok())
            .filter_map(|bytes| ChunkHash::from_slice(&bytes).ok())
            .collect();
        hashes.sort();
        hashes
    }

    pub fn clear(&mut self) {
        for chunk in self.inner.values_mut() {
            chunk.zeroize();
        }
        self.inner.clear();
    }
}

impl Drop for ChunkStore {
    fn drop(&mut self) {
        self.clear();
    }
}
