//! Merkle commitment over a public record set
//!
//! The manifest commits to every exported record line with a Merkle root so
//! a consumer holding one `public_records.jsonl` line can check membership
//! without the rest of the file.

use crate::hash::ContentHash;
use rs_merkle::{Hasher, MerkleProof, MerkleTree};

/// Blake3 hasher adapter for rs_merkle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    type Hash = [u8; 32];

    #[inline]
    fn hash(data: &[u8]) -> Self::Hash {
        *blake3::hash(data).as_bytes()
    }
}

/// Merkle tree over per-record leaf hashes, in export order
pub struct RecordMerkle {
    inner: MerkleTree<Blake3Hasher>,
    leaves: Vec<ContentHash>,
}

impl std::fmt::Debug for RecordMerkle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordMerkle")
            .field("leaf_count", &self.leaves.len())
            .field("root", &self.root())
            .finish()
    }
}

impl RecordMerkle {
    /// Build from leaf hashes
    #[must_use]
    pub fn from_leaves(leaves: &[ContentHash]) -> Self {
        let raw: Vec<[u8; 32]> = leaves.iter().map(|h| *h.as_bytes()).collect();
        Self {
            inner: MerkleTree::from_leaves(&raw),
            leaves: leaves.to_vec(),
        }
    }

    /// Hash one exported JSONL line into a leaf
    #[must_use]
    pub fn leaf_for_line(line: &[u8]) -> ContentHash {
        ContentHash::compute_tagged("sealworld public record line v1", line)
    }

    /// Root hash; zero for an empty set
    #[must_use]
    pub fn root(&self) -> ContentHash {
        self.inner.root().map_or_else(ContentHash::default, ContentHash::new)
    }

    /// Number of leaves
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True when no record was committed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Membership proof for the leaf at `index`, `None` when out of range
    #[must_use]
    pub fn proof(&self, index: usize) -> Option<RecordProof> {
        if index >= self.leaves.len() {
            return None;
        }
        Some(RecordProof {
            inner: self.inner.proof(&[index]),
            index,
            total: self.leaves.len(),
        })
    }
}

/// Membership proof for a single exported record
pub struct RecordProof {
    inner: MerkleProof<Blake3Hasher>,
    index: usize,
    total: usize,
}

impl std::fmt::Debug for RecordProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordProof")
            .field("index", &self.index)
            .field("total", &self.total)
            .finish()
    }
}

impl RecordProof {
    /// Check that `leaf` sits at this proof's index under `root`
    #[must_use]
    pub fn verify(&self, leaf: ContentHash, root: ContentHash) -> bool {
        self.inner
            .verify(*root.as_bytes(), &[self.index], &[*leaf.as_bytes()], self.total)
    }
}
