pub mod asset;
pub mod event;
pub mod instruction;
pub mod math;
pub mod score;
pub mod state;
pub mod vault;

pub use instruction::VaultInstruction;
pub use score::{PassportScore, PassportScoreProof};
pub use state::{BorrowIndex, LedgerConfig, LedgerState};
pub use vault::{Vault, VaultStatus};

/// 32-byte account identifier.
pub type Address = [u8; 32];

pub const ZERO_ADDRESS: Address = [0u8; 32];
