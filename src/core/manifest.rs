use crate::core::chunk::{link_payload, unlink_chunk, ChunkHash};
use crate::core::ChunkStore;
use crate::error::{HostError, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub hash: ChunkHash,
    /// Next chunk in pull order (the following payload slice), zero for the final slice
    pub link: ChunkHash,
    pub len: usize,
}

/// Chunk layout of one payload, listed in the order the peer pulls it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkManifest {
    pub chunk_size: usize,
    pub payload_len: usize,
    pub root: ChunkHash,
    pub chunks: Vec<ManifestEntry>,
}

impl ChunkManifest {
    pub fn build(payload: &[u8], chunk_size: usize) -> Result<ChunkManifest> {
        let mut store = ChunkStore::new();
        let root = link_payload(payload, chunk_size, &mut store)?;

        let mut chunks = Vec::with_capacity(store.len());
        let mut cursor = root;
        while !cursor.is_zero() {
            let chunk = store.get(&cursor).ok_or_else(|| {
                HostError::Protocol(format!("chunk {cursor} missing after linking"))
            })?;
            let (link, piece) = unlink_chunk(chunk)?;
            chunks.push(ManifestEntry {
                hash: cursor,
                link,
                len: piece.len(),
            });
            cursor = link;
        }

        Ok(ChunkManifest {
            chunk_size,
            payload_len: payload.len(),
            root,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_walks_from_root() {
        let manifest = ChunkManifest::build(&[7u8; 400], 180).unwrap();
        assert_eq!(manifest.chunks.len(), 3);
        assert_eq!(manifest.chunks[0].hash, manifest.root);
        assert_eq!(manifest.chunks[0].link, manifest.chunks[1].hash);
        assert!(manifest.chunks[2].link.is_zero());

        let lens: Vec<usize> = manifest.chunks.iter().map(|c| c.len).collect();
        assert_eq!(lens, vec![180, 180, 40]);
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = ChunkManifest::build(&[], 180).unwrap();
        assert!(manifest.root.is_zero());
        assert!(manifest.chunks.is_empty());
    }

    #[test]
    fn test_manifest_json_uses_hex() {
        let manifest = ChunkManifest::build(b"abc", 180).unwrap();
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["root"], manifest.root.to_hex());
        assert_eq!(json["chunks"][0]["len"], 3);
    }
}
