pub mod passport;
pub mod tree;

pub use passport::PassportScoreTree;
pub use tree::{MerkleError, MerkleTree};
