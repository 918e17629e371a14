use super::*;
use keel_assessor::LinearMapper;
use keel_oracle::StaticOracle;
use keel_types::asset::{AssetMeta, MemoryBank};
use keel_types::math::{mul_div_down, BASE, INDEX_ONE};
use keel_types::score::PassportScore;
use keel_types::state::LedgerConfig;
use keel_types::vault::VaultStatus;

const ADMIN: Address = [0xAA; 32];
const CUSTODY: Address = [0xCB; 32];
const TREASURY: Address = [0xFE; 32];
const ALICE: Address = [1u8; 32];
const BOB: Address = [2u8; 32];

const MAX_SCORE: u64 = 1000;
const PRICE: u128 = 1000 * BASE;

fn config() -> LedgerConfig {
    LedgerConfig {
        admin: ADMIN,
        custody: CUSTODY,
        fee_treasury: TREASURY,
        ..Default::default()
    }
}

/// One ledger plus its collaborators, wired the way the simulation wires
/// them. Accounts start with plenty of collateral in the bank and no
/// vault.
struct Harness {
    state: LedgerState,
    oracle: StaticOracle,
    assessor: Assessor,
    bank: MemoryBank,
    tree: PassportScoreTree,
    now: u64,
}

fn harness(scores: &[(Address, u64)]) -> Harness {
    let mut entries: Vec<PassportScore> = scores
        .iter()
        .map(|(account, score)| PassportScore::new(*account, "keel.credit", *score))
        .collect();
    if entries.len() < 2 {
        // the assessor needs a published root even when no test account
        // carries a score; a filler leaf also gives a lone attested score
        // a sibling, since a single-leaf tree yields an empty proof that
        // the assessor rejects as MissingProof before any score check
        entries.push(PassportScore::new([0xEE; 32], "keel.credit", 1));
    }
    let tree = PassportScoreTree::new(&entries).unwrap();
    let assessor = Assessor::new(Box::new(LinearMapper), tree.root(), MAX_SCORE).unwrap();

    let mut bank = MemoryBank::new();
    for account in [ALICE, BOB] {
        bank.credit("COLL", &account, 1_000_000 * BASE);
    }

    Harness {
        state: LedgerState::new(config(), 0),
        oracle: StaticOracle::new(PRICE),
        assessor,
        bank,
        tree,
        now: 0,
    }
}

impl Harness {
    fn exec(&mut self, op: &VaultInstruction, sender: &Address) -> Result<(), LedgerError> {
        let mut ctx = ExecutionContext {
            state: &mut self.state,
            timestamp: self.now,
            oracle: &self.oracle,
            assessor: &self.assessor,
            assets: &mut self.bank,
        };
        execute_instruction(op, sender, &mut ctx)
    }

    fn proof(&self, account: Address, score: u64) -> PassportScoreProof {
        self.tree
            .proof_for(&PassportScore::new(account, "keel.credit", score))
            .unwrap()
    }

    fn deposit(&mut self, account: &Address, amount: u128) {
        self.exec(
            &VaultInstruction::Deposit {
                amount,
                score_proof: None,
            },
            account,
        )
        .unwrap();
    }

    fn borrow(&mut self, account: &Address, amount: u128) -> Result<(), LedgerError> {
        self.exec(
            &VaultInstruction::Borrow {
                amount,
                score_proof: None,
                limit_proof: None,
            },
            account,
        )
    }

    fn status(&self, account: &Address, ratio: u128) -> VaultStatus {
        self.state
            .vault(account)
            .status(
                self.state.borrow_index.value,
                self.oracle.fetch_current_price().unwrap(),
                ratio,
            )
            .unwrap()
    }
}

#[test]
fn deposit_moves_collateral_into_custody_and_credits_the_vault() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);

    assert_eq!(h.state.vault(&ALICE).collateral_amount, 10 * BASE);
    assert_eq!(h.bank.balance_of("COLL", &CUSTODY), 10 * BASE);
    assert_eq!(h.bank.balance_of("COLL", &ALICE), 1_000_000 * BASE - 10 * BASE);
    assert!(matches!(
        h.state.events.last().unwrap().kind,
        EventKind::Deposited { amount, .. } if amount == 10 * BASE
    ));
}

#[test]
fn zero_amounts_are_rejected_everywhere() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);

    let kusd = AssetMeta::new("kUSD", 9);
    let ops = [
        VaultInstruction::Deposit {
            amount: 0,
            score_proof: None,
        },
        VaultInstruction::Borrow {
            amount: 0,
            score_proof: None,
            limit_proof: None,
        },
        VaultInstruction::Repay {
            amount: 0,
            asset: kusd,
            score_proof: None,
        },
        VaultInstruction::Withdraw {
            amount: 0,
            score_proof: None,
        },
    ];
    for op in &ops {
        assert_eq!(h.exec(op, &ALICE), Err(LedgerError::ZeroAmount));
    }
}

#[test]
fn borrow_succeeds_exactly_at_the_boundary_and_fails_one_past_it() {
    // $10,000 of collateral at a 200% ratio supports exactly 5000 kUSD.
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);

    assert_eq!(
        h.borrow(&ALICE, 5000 * BASE + 1),
        Err(LedgerError::Undercollateralized)
    );
    h.borrow(&ALICE, 5000 * BASE).unwrap();

    // passes the check it was admitted under, with no price or time change
    assert_eq!(h.status(&ALICE, 2 * BASE), VaultStatus::Open);
    assert_eq!(h.bank.balance_of("kUSD", &ALICE), 5000 * BASE);
    assert_eq!(h.state.total_normalized_debt, 5000 * BASE);
}

#[test]
fn attested_score_widens_the_borrowing_capacity() {
    let mut h = harness(&[(ALICE, MAX_SCORE)]);
    h.deposit(&ALICE, 10 * BASE);

    // unattested: worst-case 200% ratio caps the borrow at 5000
    assert_eq!(
        h.borrow(&ALICE, 6000 * BASE),
        Err(LedgerError::Undercollateralized)
    );

    // a ceiling score assesses to the 100% lower bound: capacity doubles
    let proof = h.proof(ALICE, MAX_SCORE);
    h.exec(
        &VaultInstruction::Borrow {
            amount: 10_000 * BASE,
            score_proof: Some(proof),
            limit_proof: None,
        },
        &ALICE,
    )
    .unwrap();
    assert_eq!(h.bank.balance_of("kUSD", &ALICE), 10_000 * BASE);
}

#[test]
fn score_proof_for_the_wrong_owner_or_protocol_is_rejected() {
    let mut h = harness(&[(ALICE, 800), (BOB, 300)]);
    h.deposit(&ALICE, 10 * BASE);

    let bobs = h.proof(BOB, 300);
    assert_eq!(
        h.exec(
            &VaultInstruction::Borrow {
                amount: BASE,
                score_proof: Some(bobs),
                limit_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::ProofAccountMismatch)
    );

    let mut wrong_protocol = h.proof(ALICE, 800);
    wrong_protocol.score.protocol = "keel.creditLimit".to_string();
    assert!(matches!(
        h.exec(
            &VaultInstruction::Borrow {
                amount: BASE,
                score_proof: Some(wrong_protocol),
                limit_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::ProofProtocolMismatch { .. })
    ));

    // a forged score under the right identity fails Merkle verification
    let mut forged = h.proof(ALICE, 800);
    forged.score.score = 999;
    assert_eq!(
        h.exec(
            &VaultInstruction::Borrow {
                amount: BASE,
                score_proof: Some(forged),
                limit_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::Assess(AssessError::InvalidProof))
    );
}

#[test]
fn published_limit_root_gates_borrows() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 100 * BASE);

    let limits = PassportScoreTree::new(&[
        PassportScore::new(ALICE, "keel.creditLimit", 3000),
        PassportScore::new(BOB, "keel.creditLimit", 100),
    ])
    .unwrap();
    h.exec(
        &VaultInstruction::SetLimitRoot {
            root: limits.root(),
        },
        &ADMIN,
    )
    .unwrap();

    // the attested ceiling is now a hard precondition
    assert_eq!(h.borrow(&ALICE, 2000 * BASE), Err(LedgerError::LimitProofRequired));

    let limit_proof = limits
        .proof_for(&PassportScore::new(ALICE, "keel.creditLimit", 3000))
        .unwrap();
    h.exec(
        &VaultInstruction::Borrow {
            amount: 2000 * BASE,
            score_proof: None,
            limit_proof: Some(limit_proof.clone()),
        },
        &ALICE,
    )
    .unwrap();

    // 2000 borrowed + 1500 more would exceed the 3000 ceiling
    assert!(matches!(
        h.exec(
            &VaultInstruction::Borrow {
                amount: 1500 * BASE,
                score_proof: None,
                limit_proof: Some(limit_proof.clone()),
            },
            &ALICE,
        ),
        Err(LedgerError::CreditLimitExceeded { .. })
    ));

    let mut inflated = limit_proof;
    inflated.score.score = 50_000;
    assert_eq!(
        h.exec(
            &VaultInstruction::Borrow {
                amount: 1500 * BASE,
                score_proof: None,
                limit_proof: Some(inflated),
            },
            &ALICE,
        ),
        Err(LedgerError::InvalidLimitProof)
    );

    // a risk-score proof is not a limit proof
    let scores = PassportScoreTree::new(&[PassportScore::new(ALICE, "keel.credit", 900)]).unwrap();
    let wrong_kind = scores
        .proof_for(&PassportScore::new(ALICE, "keel.credit", 900))
        .unwrap();
    assert!(matches!(
        h.exec(
            &VaultInstruction::Borrow {
                amount: BASE,
                score_proof: None,
                limit_proof: Some(wrong_kind),
            },
            &ALICE,
        ),
        Err(LedgerError::ProofProtocolMismatch { .. })
    ));

    // the all-zero root unpublishes the ceiling entirely
    h.exec(&VaultInstruction::SetLimitRoot { root: [0u8; 32] }, &ADMIN)
        .unwrap();
    h.borrow(&ALICE, 1500 * BASE).unwrap();
}

#[test]
fn interest_accrual_moves_vaults_toward_liquidation_only() {
    let mut h = harness(&[]);
    h.exec(
        &VaultInstruction::SetInterestRate {
            rate_per_second: INDEX_ONE / 100,
        },
        &ADMIN,
    )
    .unwrap();
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 5000 * BASE).unwrap();
    assert_eq!(h.status(&ALICE, 2 * BASE), VaultStatus::Open);

    // one second at 1%/s: debt is 5050, the bar is 5000
    h.now = 1;
    h.deposit(&BOB, BASE);
    assert_eq!(h.state.borrow_index.value, INDEX_ONE + INDEX_ONE / 100);
    assert_eq!(
        h.state.vault(&ALICE).denormalized_debt(h.state.borrow_index.value).unwrap(),
        5050 * BASE
    );
    assert_eq!(h.status(&ALICE, 2 * BASE), VaultStatus::UnderCollateralized);

    assert!(h
        .state
        .events
        .iter()
        .any(|e| matches!(e.kind, EventKind::IndexAccrued { .. })));
}

#[test]
fn index_accrual_events_only_fire_when_the_index_advances() {
    let mut h = harness(&[]);
    // zero rate: time passes, the index stays put
    h.now = 100;
    h.deposit(&ALICE, BASE);
    assert_eq!(h.state.borrow_index.value, INDEX_ONE);
    assert!(!h
        .state
        .events
        .iter()
        .any(|e| matches!(e.kind, EventKind::IndexAccrued { .. })));
}

#[test]
fn clock_regression_is_an_error() {
    let mut h = harness(&[]);
    h.now = 100;
    h.deposit(&ALICE, BASE);

    h.now = 50;
    assert_eq!(
        h.exec(
            &VaultInstruction::Deposit {
                amount: BASE,
                score_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::ClockRegression { last: 100, now: 50 })
    );
}

#[test]
fn repay_reduces_debt_and_caps_at_the_outstanding_amount() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 5000 * BASE).unwrap();

    let kusd = AssetMeta::new("kUSD", 9);
    h.exec(
        &VaultInstruction::Repay {
            amount: 2000 * BASE,
            asset: kusd.clone(),
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();
    assert_eq!(h.state.vault(&ALICE).normalized_borrowed_amount, 3000 * BASE);
    assert_eq!(h.bank.balance_of("kUSD", &ALICE), 3000 * BASE);

    // offering more than the debt pulls only the debt
    h.exec(
        &VaultInstruction::Repay {
            amount: 3000 * BASE + 500,
            asset: kusd.clone(),
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();
    assert_eq!(h.state.vault(&ALICE).normalized_borrowed_amount, 0);
    assert_eq!(h.bank.balance_of("kUSD", &ALICE), 0);
    assert_eq!(h.state.total_normalized_debt, 0);

    assert_eq!(
        h.exec(
            &VaultInstruction::Repay {
                amount: BASE,
                asset: kusd,
                score_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::NoOutstandingDebt)
    );
}

#[test]
fn repay_validates_the_asset_before_any_state_change() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 5000 * BASE).unwrap();
    h.exec(
        &VaultInstruction::AddRepayAsset {
            ticker: "USDX".to_string(),
            decimals: 6,
        },
        &ADMIN,
    )
    .unwrap();
    h.bank.credit("USDX", &ALICE, 1_000_000_000);

    let vault_before = h.state.vault(&ALICE);
    let events_before = h.state.events.len();
    let kusd_before = h.bank.balance_of("kUSD", &ALICE);

    assert_eq!(
        h.exec(
            &VaultInstruction::Repay {
                amount: 1000 * BASE,
                asset: AssetMeta::new("GHOST", 9),
                score_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::UnknownRepayAsset("GHOST".to_string()))
    );

    // whitelisted ticker, but the token claims 18 decimals: a unit of it
    // would otherwise repay a trillion times its real value
    assert_eq!(
        h.exec(
            &VaultInstruction::Repay {
                amount: 1000 * BASE,
                asset: AssetMeta::new("USDX", 18),
                score_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::DecimalsMismatch {
            ticker: "USDX".to_string(),
            expected: 6,
            reported: 18,
        })
    );

    // nothing moved on either failure
    assert_eq!(h.state.vault(&ALICE), vault_before);
    assert_eq!(h.state.events.len(), events_before);
    assert_eq!(h.bank.balance_of("kUSD", &ALICE), kusd_before);
    assert_eq!(h.bank.balance_of("USDX", &ALICE), 1_000_000_000);
}

#[test]
fn repay_converts_foreign_decimals_via_the_pinned_value() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 1000 * BASE).unwrap();
    h.exec(
        &VaultInstruction::AddRepayAsset {
            ticker: "USDX".to_string(),
            decimals: 6,
        },
        &ADMIN,
    )
    .unwrap();
    h.bank.credit("USDX", &ALICE, 1_000_000_000);

    // 400 USDX at the pinned 6 decimals is 400 base units of value
    h.exec(
        &VaultInstruction::Repay {
            amount: 400_000_000,
            asset: AssetMeta::new("USDX", 6),
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();
    assert_eq!(h.state.vault(&ALICE).normalized_borrowed_amount, 600 * BASE);
    assert_eq!(h.bank.balance_of("USDX", &ALICE), 600_000_000);
    // non-synthetic repayment lands in custody rather than being burned
    assert_eq!(h.bank.balance_of("USDX", &CUSTODY), 400_000_000);
}

#[test]
fn withdraw_enforces_the_assessed_ratio_when_debt_remains() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 4000 * BASE).unwrap();

    // 4000 of debt at 200% needs $8000 of the $10,000 posted: 2 units are free
    assert_eq!(
        h.exec(
            &VaultInstruction::Withdraw {
                amount: 2 * BASE + 1,
                score_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::Undercollateralized)
    );
    h.exec(
        &VaultInstruction::Withdraw {
            amount: 2 * BASE,
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();
    assert_eq!(h.state.vault(&ALICE).collateral_amount, 8 * BASE);
    assert_eq!(h.status(&ALICE, 2 * BASE), VaultStatus::Open);

    assert!(matches!(
        h.exec(
            &VaultInstruction::Withdraw {
                amount: 100 * BASE,
                score_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::InsufficientCollateral { .. })
    ));
}

#[test]
fn debt_free_withdrawal_skips_the_oracle_but_not_proof_checks() {
    let mut h = harness(&[(ALICE, 500)]);
    h.deposit(&ALICE, 10 * BASE);
    // an unset oracle would fail any ratio check
    h.oracle.clear();

    let mut forged = h.proof(ALICE, 500);
    forged.score.score = 999;
    assert_eq!(
        h.exec(
            &VaultInstruction::Withdraw {
                amount: BASE,
                score_proof: Some(forged),
            },
            &ALICE,
        ),
        Err(LedgerError::Assess(AssessError::InvalidProof))
    );

    h.exec(
        &VaultInstruction::Withdraw {
            amount: 10 * BASE,
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();
    assert!(h.state.vault(&ALICE).is_empty());
    assert_eq!(h.bank.balance_of("COLL", &ALICE), 1_000_000 * BASE);
}

#[test]
fn paused_blocks_borrows_and_nothing_else() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 1000 * BASE).unwrap();

    h.exec(&VaultInstruction::SetPaused { paused: true }, &ADMIN)
        .unwrap();
    assert_eq!(h.borrow(&ALICE, BASE), Err(LedgerError::Paused));

    h.deposit(&ALICE, BASE);
    h.exec(
        &VaultInstruction::Repay {
            amount: 500 * BASE,
            asset: AssetMeta::new("kUSD", 9),
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();
    h.exec(
        &VaultInstruction::Withdraw {
            amount: BASE,
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();

    h.exec(&VaultInstruction::SetPaused { paused: false }, &ADMIN)
        .unwrap();
    h.borrow(&ALICE, BASE).unwrap();
}

#[test]
fn liquidating_a_healthy_vault_fails() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 4000 * BASE).unwrap();
    h.bank.credit("kUSD", &BOB, 10_000 * BASE);

    assert_eq!(
        h.exec(
            &VaultInstruction::Liquidate {
                account: ALICE,
                asset: AssetMeta::new("kUSD", 9),
                score_proof: None,
            },
            &BOB,
        ),
        Err(LedgerError::VaultHealthy)
    );
    assert_eq!(
        h.exec(
            &VaultInstruction::Liquidate {
                account: BOB,
                asset: AssetMeta::new("kUSD", 9),
                score_proof: None,
            },
            &ALICE,
        ),
        Err(LedgerError::VaultNotFound)
    );
}

#[test]
fn liquidation_restores_the_vault_to_the_boundary() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 5000 * BASE).unwrap();
    h.bank.credit("kUSD", &BOB, 10_000 * BASE);

    h.oracle.set(900 * BASE);
    assert_eq!(h.status(&ALICE, 2 * BASE), VaultStatus::UnderCollateralized);

    let bob_kusd_before = h.bank.balance_of("kUSD", &BOB);
    h.exec(
        &VaultInstruction::Liquidate {
            account: ALICE,
            asset: AssetMeta::new("kUSD", 9),
            score_proof: None,
        },
        &BOB,
    )
    .unwrap();

    // partially liquidated and healthy again
    assert_eq!(h.status(&ALICE, 2 * BASE), VaultStatus::Open);
    assert_eq!(h.state.bad_debt, 0);

    let surrendered = bob_kusd_before - h.bank.balance_of("kUSD", &BOB);
    let received = h.bank.balance_of("COLL", &BOB) - (1_000_000 * BASE);
    assert!(surrendered > 0);
    // the discount prices the seized collateral above the debt paid
    assert!(mul_div_down(received, 900 * BASE, BASE).unwrap() > surrendered);
    assert!(h.bank.balance_of("COLL", &TREASURY) > 0);

    let (repaid, seized, to_liq, to_treasury, closed) = h
        .state
        .events
        .iter()
        .find_map(|e| match e.kind {
            EventKind::Liquidated {
                debt_repaid,
                collateral_seized,
                collateral_to_liquidator,
                collateral_to_treasury,
                closed,
                ..
            } => Some((
                debt_repaid,
                collateral_seized,
                collateral_to_liquidator,
                collateral_to_treasury,
                closed,
            )),
            _ => None,
        })
        .unwrap();
    assert!(!closed);
    assert!(repaid < 5000 * BASE);
    assert_eq!(to_liq + to_treasury, seized);
    assert_eq!(h.bank.balance_of("COLL", &TREASURY), to_treasury);
}

#[test]
fn deep_crash_liquidation_drains_the_vault_and_writes_off_the_rest() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 5000 * BASE).unwrap();
    h.bank.credit("kUSD", &BOB, 10_000 * BASE);

    // at $400 even all the collateral at the discounted price covers 3600
    h.oracle.set(400 * BASE);
    h.exec(
        &VaultInstruction::Liquidate {
            account: ALICE,
            asset: AssetMeta::new("kUSD", 9),
            score_proof: None,
        },
        &BOB,
    )
    .unwrap();

    assert!(h.state.vault(&ALICE).is_empty());
    assert_eq!(h.status(&ALICE, 2 * BASE), VaultStatus::Empty);
    assert_eq!(h.state.bad_debt, 1400 * BASE);
    assert_eq!(h.state.total_normalized_debt, 0);
    assert_eq!(h.bank.balance_of("kUSD", &BOB), 10_000 * BASE - 3600 * BASE);

    assert!(h.state.events.iter().any(|e| matches!(
        e.kind,
        EventKind::DebtWrittenOff { account, amount } if account == ALICE && amount == 1400 * BASE
    )));
}

#[test]
fn admin_instructions_are_gated_and_validated() {
    let mut h = harness(&[]);

    assert_eq!(
        h.exec(&VaultInstruction::SetPaused { paused: true }, &ALICE),
        Err(LedgerError::NotAdmin)
    );

    assert_eq!(
        h.exec(
            &VaultInstruction::SetFees {
                liquidator_discount: BASE,
                liquidation_fee: 0,
            },
            &ADMIN,
        ),
        Err(LedgerError::InvalidFees)
    );
    h.exec(
        &VaultInstruction::SetFees {
            liquidator_discount: BASE / 5,
            liquidation_fee: BASE / 10,
        },
        &ADMIN,
    )
    .unwrap();
    assert_eq!(h.state.config.liquidator_discount, BASE / 5);
    assert!(matches!(
        h.state.events.last().unwrap().kind,
        EventKind::FeesUpdated { .. }
    ));

    assert_eq!(
        h.exec(
            &VaultInstruction::SetRatioBounds {
                low: 2 * BASE,
                high: 2 * BASE,
            },
            &ADMIN,
        ),
        Err(LedgerError::InvalidRatioBounds)
    );
    h.exec(
        &VaultInstruction::SetRatioBounds {
            low: BASE + BASE / 2,
            high: 3 * BASE,
        },
        &ADMIN,
    )
    .unwrap();
    assert_eq!(h.state.config.collateral_ratio_high, 3 * BASE);
}

#[test]
fn event_log_is_dense_and_ordered() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 2000 * BASE).unwrap();
    h.now = 5;
    h.exec(
        &VaultInstruction::Repay {
            amount: 500 * BASE,
            asset: AssetMeta::new("kUSD", 9),
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();
    h.now = 9;
    h.exec(
        &VaultInstruction::Withdraw {
            amount: BASE,
            score_proof: None,
        },
        &ALICE,
    )
    .unwrap();

    assert!(h.state.events.len() >= 4);
    for (i, event) in h.state.events.iter().enumerate() {
        assert_eq!(event.seq, i as u64);
        if i > 0 {
            assert!(event.timestamp >= h.state.events[i - 1].timestamp);
        }
    }
}

#[test]
fn scan_flags_only_underwater_vaults() {
    let mut h = harness(&[]);
    h.deposit(&ALICE, 10 * BASE);
    h.borrow(&ALICE, 5000 * BASE).unwrap();
    h.deposit(&BOB, 10 * BASE);
    h.borrow(&BOB, 1000 * BASE).unwrap();

    let flagged = scan_liquidatable(&h.state, 1000 * BASE, 2 * BASE);
    assert!(flagged.is_empty());

    // $900 sinks the leveraged vault and spares the conservative one
    let flagged = scan_liquidatable(&h.state, 900 * BASE, 2 * BASE);
    assert_eq!(flagged, vec![ALICE]);

    let flagged = scan_liquidatable(&h.state, 150 * BASE, 2 * BASE);
    assert_eq!(flagged, vec![ALICE, BOB]);
}
