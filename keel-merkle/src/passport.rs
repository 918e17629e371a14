use std::collections::HashSet;

use keel_types::score::{PassportScore, PassportScoreProof};

use crate::tree::{MerkleError, MerkleTree};

/// Merkle tree over `(account, protocol, score)` attestations.
///
/// Owns a generic [`MerkleTree`] plus the uniqueness rule the generic
/// tree cannot express: at most one score per `(account, protocol)`
/// pair. Exact duplicate *leaves* would be silently deduplicated by the
/// inner tree, but a same-pair different-score conflict must fail loudly
/// here, before any hashing happens.
#[derive(Debug, Clone)]
pub struct PassportScoreTree {
    tree: MerkleTree,
}

impl PassportScoreTree {
    pub fn new(scores: &[PassportScore]) -> Result<Self, MerkleError> {
        let mut seen = HashSet::new();
        for score in scores {
            if !seen.insert((score.account, score.protocol.clone())) {
                return Err(MerkleError::DuplicateScore {
                    account: hex::encode(score.account),
                    protocol: score.protocol.clone(),
                });
            }
        }
        let leaves = scores.iter().map(PassportScore::node_hash).collect();
        Ok(Self {
            tree: MerkleTree::new(leaves)?,
        })
    }

    pub fn root(&self) -> [u8; 32] {
        self.tree.root()
    }

    pub fn proof_for(&self, score: &PassportScore) -> Result<PassportScoreProof, MerkleError> {
        let merkle_proof = self.tree.proof_for(&score.node_hash())?;
        Ok(PassportScoreProof {
            score: score.clone(),
            merkle_proof,
        })
    }

    pub fn verify(proof: &PassportScoreProof, root: &[u8; 32]) -> bool {
        MerkleTree::verify_proof(&proof.score.node_hash(), &proof.merkle_proof, root)
    }
}
