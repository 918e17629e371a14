#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use keel_assessor::{Assessor, LinearMapper};
use keel_ledger::{execute_instruction, ExecutionContext};
use keel_merkle::PassportScoreTree;
use keel_oracle::StaticOracle;
use keel_types::asset::{AssetMeta, MemoryBank};
use keel_types::math::BASE;
use keel_types::score::PassportScore;
use keel_types::state::{LedgerConfig, LedgerState};
use keel_types::VaultInstruction;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    sender_byte: u8,
    target_byte: u8,
    amount: u64,
    price: u64,
    timestamp: u32,
    decimals: u8,
    selector: u8,
    use_proof: bool,
}

fuzz_target!(|data: FuzzInput| {
    let admin = [0xAA; 32];
    let accounts: [[u8; 32]; 3] = [[1; 32], [2; 32], [3; 32]];
    let sender = accounts[(data.sender_byte % 3) as usize];
    let target = accounts[(data.target_byte % 3) as usize];

    let scores: Vec<PassportScore> = accounts
        .iter()
        .enumerate()
        .map(|(i, account)| PassportScore::new(*account, "keel.credit", (i as u64 + 1) * 250))
        .collect();
    let tree = PassportScoreTree::new(&scores).unwrap();
    let assessor = Assessor::new(Box::new(LinearMapper), tree.root(), 1000).unwrap();

    let config = LedgerConfig {
        admin,
        custody: [0xCB; 32],
        fee_treasury: [0xFE; 32],
        ..Default::default()
    };
    let mut state = LedgerState::new(config, 0);
    let mut bank = MemoryBank::new();

    // Seed open positions so most instruction paths can progress.
    for (i, account) in accounts.iter().enumerate() {
        bank.credit("COLL", account, 1_000_000 * BASE);
        bank.credit("kUSD", account, 10_000 * BASE);
        let vault = state.vaults.entry(*account).or_default();
        vault.collateral_amount = 10 * BASE;
        vault.normalized_borrowed_amount = i as u128 * 1000 * BASE;
        state.total_normalized_debt += vault.normalized_borrowed_amount;
    }

    let oracle = StaticOracle::new((data.price as u128 % 5000 + 1) * BASE);
    let amount = data.amount as u128 % (100_000 * BASE);
    let asset = if data.selector % 2 == 0 {
        AssetMeta::new("kUSD", data.decimals % 24)
    } else {
        AssetMeta::new("COLL", 9)
    };
    let proof_for = |account: &[u8; 32]| {
        scores
            .iter()
            .find(|s| s.account == *account)
            .and_then(|s| tree.proof_for(s).ok())
    };
    let proof = if data.use_proof { proof_for(&sender) } else { None };

    let op = match data.selector % 7 {
        0 => VaultInstruction::Deposit {
            amount,
            score_proof: proof,
        },
        1 => VaultInstruction::Borrow {
            amount,
            score_proof: proof,
            limit_proof: None,
        },
        2 => VaultInstruction::Repay {
            amount,
            asset,
            score_proof: proof,
        },
        3 => VaultInstruction::Withdraw {
            amount,
            score_proof: proof,
        },
        4 => VaultInstruction::Liquidate {
            account: target,
            asset,
            score_proof: proof_for(&target),
        },
        5 => VaultInstruction::SetPaused {
            paused: data.use_proof,
        },
        _ => VaultInstruction::SetFees {
            liquidator_discount: data.amount as u128 % BASE,
            liquidation_fee: data.price as u128 % (BASE + 1),
        },
    };

    let mut ctx = ExecutionContext {
        state: &mut state,
        timestamp: data.timestamp as u64,
        oracle: &oracle,
        assessor: &assessor,
        assets: &mut bank,
    };
    let _ = execute_instruction(&op, &sender, &mut ctx);

    // whatever happened, the global total tracks the per-vault sum
    let sum: u128 = state
        .vaults
        .values()
        .map(|v| v.normalized_borrowed_amount)
        .sum();
    assert_eq!(state.total_normalized_debt, sum);
});
