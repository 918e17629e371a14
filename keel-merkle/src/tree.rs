use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("cannot build a Merkle tree with no leaves")]
    EmptyTree,
    #[error("leaf is not part of the tree")]
    LeafNotFound,
    #[error("duplicate score for account 0x{account} under protocol {protocol}")]
    DuplicateScore { account: String, protocol: String },
}

/// Binary Merkle tree over 32-byte leaf hashes.
///
/// Leaves are sorted and exact duplicates dropped before construction.
/// Pairing is order-independent (the smaller hash is always fed first),
/// and an unpaired trailing element is carried up unchanged. This makes
/// the scheme resistant to duplicate-leaf grinding, but it is not
/// second-preimage hardened.
///
/// Built once from a fixed leaf set; read-only afterward.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    layers: Vec<Vec<[u8; 32]>>,
    positions: HashMap<[u8; 32], usize>,
    deduplicated: usize,
}

fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = blake3::Hasher::new();
    hasher.update(lo);
    hasher.update(hi);
    *hasher.finalize().as_bytes()
}

/// Fold one node with an optional sibling. A missing sibling means the
/// node was the unpaired tail of its layer and moves up as-is.
fn combined_hash(node: [u8; 32], sibling: Option<&[u8; 32]>) -> [u8; 32] {
    match sibling {
        Some(s) => hash_pair(&node, s),
        None => node,
    }
}

impl MerkleTree {
    pub fn new(mut leaves: Vec<[u8; 32]>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }
        let before = leaves.len();
        leaves.sort_unstable();
        leaves.dedup();
        let deduplicated = before - leaves.len();

        let positions = leaves
            .iter()
            .enumerate()
            .map(|(index, leaf)| (*leaf, index))
            .collect();

        let mut layers = vec![leaves];
        while layers[layers.len() - 1].len() > 1 {
            let prev = &layers[layers.len() - 1];
            let mut next = Vec::with_capacity((prev.len() + 1) / 2);
            for pair in prev.chunks(2) {
                next.push(combined_hash(pair[0], pair.get(1)));
            }
            layers.push(next);
        }

        Ok(Self {
            layers,
            positions,
            deduplicated,
        })
    }

    pub fn root(&self) -> [u8; 32] {
        self.layers[self.layers.len() - 1][0]
    }

    /// Number of exact duplicate leaves silently dropped at construction.
    /// Exposed so a caller that considers duplicates a data-entry error
    /// can check; the tree itself does not.
    pub fn deduplicated(&self) -> usize {
        self.deduplicated
    }

    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Sibling hashes from the leaf's layer up to (excluding) the root.
    /// Levels where the node is the unpaired tail contribute no entry.
    pub fn proof_for(&self, leaf: &[u8; 32]) -> Result<Vec<[u8; 32]>, MerkleError> {
        let mut index = *self.positions.get(leaf).ok_or(MerkleError::LeafNotFound)?;
        let mut proof = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            if let Some(sibling) = layer.get(index ^ 1) {
                proof.push(*sibling);
            }
            index /= 2;
        }
        Ok(proof)
    }

    /// Fold `proof` over `leaf` with the pair combiner and compare the
    /// result against `root`.
    pub fn verify_proof(leaf: &[u8; 32], proof: &[[u8; 32]], root: &[u8; 32]) -> bool {
        let mut computed = *leaf;
        for sibling in proof {
            computed = hash_pair(&computed, sibling);
        }
        computed == *root
    }
}
