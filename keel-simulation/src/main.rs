//! Keel scenario runner.
//!
//! Seeds a fleet of vaults against a Merkle-attested score tree, walks
//! the collateral price through a crash while interest accrues, runs a
//! keeper loop over the parallel liquidation scan, and reports what the
//! ledger looks like on the other side. Every vault must come out of the
//! crash healthy or closed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use keel_assessor::{Assessor, LinearMapper};
use keel_ledger::{execute_instruction, scan_liquidatable, ExecutionContext, LedgerError};
use keel_merkle::PassportScoreTree;
use keel_oracle::{PriceFeed, StaticOracle};
use keel_types::asset::{AssetMeta, AssetTransfer, MemoryBank};
use keel_types::math::{mul_div_down, BASE, DECIMALS};
use keel_types::score::{PassportScore, PassportScoreProof};
use keel_types::state::{LedgerConfig, LedgerState};
use keel_types::vault::VaultStatus;
use keel_types::{Address, VaultInstruction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const ADMIN: Address = [0xAD; 32];
const CUSTODY: Address = [0xC0; 32];
const TREASURY: Address = [0xFB; 32];
const LIQUIDATOR: Address = [0x11; 32];
const MAX_SCORE: u64 = 1000;
const GENESIS: u64 = 1_700_000_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Keel vault ledger scenario runner")]
struct Args {
    /// Number of vaults opened for the scenario.
    #[arg(long, default_value_t = 200)]
    vaults: usize,
    /// Collateral units deposited per vault.
    #[arg(long, default_value_t = 10)]
    deposit: u64,
    /// Percentage of assessed borrowing capacity each vault draws.
    #[arg(long, default_value_t = 80)]
    borrow_pct: u64,
    /// Starting collateral price in whole dollars.
    #[arg(long, default_value_t = 1000)]
    start_price: u64,
    /// Percentage the price falls across the crash.
    #[arg(long, default_value_t = 40)]
    crash_pct: u64,
    /// Steps the crash is spread over.
    #[arg(long, default_value_t = 8)]
    crash_steps: u64,
    /// Seconds of interest accrual between crash steps.
    #[arg(long, default_value_t = 86_400)]
    step_secs: u64,
    /// Per-second borrow rate at 1e18 scale (default is roughly 5% APR).
    #[arg(long, default_value_t = 1_585_489_599)]
    rate_per_second: u128,
    /// Seed for account and score generation.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Fetch the starting price from public exchanges instead.
    #[arg(long)]
    live_price: bool,
    /// Exchange symbol used with --live-price.
    #[arg(long, default_value = "ETH")]
    symbol: String,
    /// Write a bincode snapshot of the final ledger state here.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Debug)]
struct Summary {
    vaults_opened: usize,
    borrowed_total: u128,
    liquidation_attempts: u64,
    liquidations: u64,
    healthy: usize,
    closed: usize,
    underwater: usize,
    bad_debt: u128,
    treasury_collateral: u128,
    final_index: u128,
    events: usize,
}

struct SimAccount {
    address: Address,
    score: u64,
}

fn build_accounts(count: usize, rng: &mut StdRng) -> Vec<SimAccount> {
    (0..count)
        .map(|_| SimAccount {
            address: rng.gen(),
            score: rng.gen_range(0..=MAX_SCORE),
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn exec(
    state: &mut LedgerState,
    now: u64,
    oracle: &StaticOracle,
    assessor: &Assessor,
    bank: &mut MemoryBank,
    op: &VaultInstruction,
    sender: &Address,
) -> Result<(), LedgerError> {
    let mut ctx = ExecutionContext {
        state,
        timestamp: now,
        oracle,
        assessor,
        assets: bank,
    };
    execute_instruction(op, sender, &mut ctx)
}

fn run_scenario(args: &Args, start_price: u128) -> Result<Summary> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let accounts = build_accounts(args.vaults, &mut rng);

    let scores: Vec<PassportScore> = accounts
        .iter()
        .map(|a| PassportScore::new(a.address, "keel.credit", a.score))
        .collect();
    let tree = PassportScoreTree::new(&scores)?;
    let assessor = Assessor::new(Box::new(LinearMapper), tree.root(), MAX_SCORE)?;
    let proofs: HashMap<Address, PassportScoreProof> = scores
        .iter()
        .map(|s| Ok((s.account, tree.proof_for(s)?)))
        .collect::<Result<_, keel_merkle::MerkleError>>()?;

    let config = LedgerConfig {
        admin: ADMIN,
        custody: CUSTODY,
        fee_treasury: TREASURY,
        rate_per_second: args.rate_per_second,
        ..Default::default()
    };
    let mut state = LedgerState::new(config, GENESIS);
    let mut bank = MemoryBank::new();
    let mut oracle = StaticOracle::new(start_price);
    let mut now = GENESIS;

    let deposit_amount = args.deposit as u128 * BASE;
    for account in &accounts {
        bank.credit(&state.config.collateral_ticker, &account.address, deposit_amount);
    }
    let keeper_deposit = deposit_amount * args.vaults.max(1) as u128 * 20;
    bank.credit(&state.config.collateral_ticker, &LIQUIDATOR, keeper_deposit);

    // open every vault and draw debt against its assessed ratio
    let mut borrowed_total = 0u128;
    for account in &accounts {
        exec(
            &mut state,
            now,
            &oracle,
            &assessor,
            &mut bank,
            &VaultInstruction::Deposit {
                amount: deposit_amount,
                score_proof: None,
            },
            &account.address,
        )?;

        let proof = &proofs[&account.address];
        let ratio = assessor.assess(
            state.config.collateral_ratio_low,
            state.config.collateral_ratio_high,
            Some(proof),
            false,
        )?;
        let value = mul_div_down(deposit_amount, start_price, BASE)?;
        let capacity = mul_div_down(value, BASE, ratio)?;
        let amount = capacity * args.borrow_pct.min(100) as u128 / 100;
        if amount == 0 {
            continue;
        }
        exec(
            &mut state,
            now,
            &oracle,
            &assessor,
            &mut bank,
            &VaultInstruction::Borrow {
                amount,
                score_proof: Some(proof.clone()),
                limit_proof: None,
            },
            &account.address,
        )?;
        borrowed_total += amount;
    }
    info!(
        vaults = accounts.len(),
        drawn_kusd = borrowed_total / BASE,
        "vaults seeded"
    );

    // the keeper funds itself through the same ledger, conservatively
    // enough to ride out the crash
    exec(
        &mut state,
        now,
        &oracle,
        &assessor,
        &mut bank,
        &VaultInstruction::Deposit {
            amount: keeper_deposit,
            score_proof: None,
        },
        &LIQUIDATOR,
    )?;
    let keeper_value = mul_div_down(keeper_deposit, start_price, BASE)?;
    let working_capital =
        mul_div_down(keeper_value, BASE, state.config.collateral_ratio_high)? / 10;
    exec(
        &mut state,
        now,
        &oracle,
        &assessor,
        &mut bank,
        &VaultInstruction::Borrow {
            amount: working_capital,
            score_proof: None,
            limit_proof: None,
        },
        &LIQUIDATOR,
    )?;

    let synthetic = AssetMeta::new(&state.config.synthetic_ticker, DECIMALS);
    let steps = args.crash_steps.max(1);
    let drop_total = start_price * args.crash_pct.min(95) as u128 / 100;
    let mut attempts = 0u64;
    let mut liquidations = 0u64;
    let mut price = start_price;

    for step in 1..=steps {
        now += args.step_secs;
        price = start_price - drop_total * step as u128 / steps as u128;
        oracle.set(price);

        // screen at the worst-case ratio; Liquidate re-verifies with the
        // owner's attested ratio and skips anything still healthy
        let flagged = scan_liquidatable(&state, price, state.config.collateral_ratio_high);
        for account in flagged {
            if account == LIQUIDATOR {
                continue;
            }
            attempts += 1;
            let result = exec(
                &mut state,
                now,
                &oracle,
                &assessor,
                &mut bank,
                &VaultInstruction::Liquidate {
                    account,
                    asset: synthetic.clone(),
                    score_proof: proofs.get(&account).cloned(),
                },
                &LIQUIDATOR,
            );
            match result {
                Ok(()) => liquidations += 1,
                Err(LedgerError::VaultHealthy) => {}
                Err(e) => warn!(?e, account = %hex::encode(account), "liquidation failed"),
            }
        }
        info!(step, price_usd = price / BASE, "crash step complete");
    }

    let mut healthy = 0usize;
    let mut closed = 0usize;
    let mut underwater = 0usize;
    for account in accounts.iter().map(|a| a.address).chain([LIQUIDATOR]) {
        let ratio = assessor.assess(
            state.config.collateral_ratio_low,
            state.config.collateral_ratio_high,
            proofs.get(&account),
            false,
        )?;
        match state
            .vault(&account)
            .status(state.borrow_index.value, price, ratio)?
        {
            VaultStatus::Empty => closed += 1,
            VaultStatus::Open => healthy += 1,
            VaultStatus::UnderCollateralized => underwater += 1,
        }
    }

    if let Some(path) = &args.snapshot {
        keel_storage::save_state(path, &state)?;
        info!(path = %path.display(), "ledger snapshot written");
    }

    Ok(Summary {
        vaults_opened: accounts.len(),
        borrowed_total,
        liquidation_attempts: attempts,
        liquidations,
        healthy,
        closed,
        underwater,
        bad_debt: state.bad_debt,
        treasury_collateral: bank.balance_of(&state.config.collateral_ticker, &TREASURY),
        final_index: state.borrow_index.value,
        events: state.events.len(),
    })
}

fn fetch_live_price(symbol: &str) -> Result<u128> {
    let runtime = tokio::runtime::Runtime::new().context("building tokio runtime")?;
    let mut feed = PriceFeed::new(symbol, 300);
    let report = runtime.block_on(feed.refresh())?;
    info!(
        sources = report.sources,
        volatility = report.volatility,
        "live price aggregated"
    );
    Ok(report.price)
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let args = Args::parse();
    let start_price = if args.live_price {
        fetch_live_price(&args.symbol)?
    } else {
        args.start_price as u128 * BASE
    };

    let started = Instant::now();
    let summary = run_scenario(&args, start_price)?;
    let elapsed = started.elapsed();

    println!("=== Keel ledger crash scenario ===");
    println!("Vaults opened: {}", summary.vaults_opened);
    println!("Synthetic drawn: {} kUSD", summary.borrowed_total / BASE);
    println!("Liquidation attempts: {}", summary.liquidation_attempts);
    println!("Liquidations executed: {}", summary.liquidations);
    println!("Healthy vaults: {}", summary.healthy);
    println!("Closed vaults: {}", summary.closed);
    println!("Underwater vaults: {}", summary.underwater);
    println!("Bad debt written off: {} kUSD", summary.bad_debt / BASE);
    println!(
        "Treasury collateral take: {} units",
        summary.treasury_collateral / BASE
    );
    println!("Final borrow index: {}", summary.final_index);
    println!("Ledger events: {}", summary.events);
    println!("Elapsed: {:.2?}", elapsed);

    Ok(())
}
