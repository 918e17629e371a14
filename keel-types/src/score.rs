use serde::{Deserialize, Serialize};

use crate::Address;

/// One attested `(account, protocol, score)` triple. The protocol tag
/// namespaces scores so one tree can carry several attestation kinds,
/// e.g. `keel.credit` for risk scores and `keel.creditLimit` for borrow
/// ceilings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PassportScore {
    pub account: Address,
    pub protocol: String,
    pub score: u64,
}

impl PassportScore {
    pub fn new(account: Address, protocol: &str, score: u64) -> Self {
        Self {
            account,
            protocol: protocol.to_string(),
            score,
        }
    }

    /// Canonical leaf hash: blake3 over the account, the protocol bytes
    /// and the little-endian score, in that order. Verifiers recompute
    /// this byte-for-byte; any drift breaks proof verification silently
    /// rather than signaling a format error.
    pub fn node_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.account);
        hasher.update(self.protocol.as_bytes());
        hasher.update(&self.score.to_le_bytes());
        *hasher.finalize().as_bytes()
    }
}

/// A score plus the sibling hashes from its leaf up to the root.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PassportScoreProof {
    pub score: PassportScore,
    pub merkle_proof: Vec<[u8; 32]>,
}
