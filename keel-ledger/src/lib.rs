//! Vault ledger execution core.
//!
//! Every mutation flows through [`execute_instruction`] against an
//! exclusive borrow of [`LedgerState`], which serializes the
//! check-then-mutate sequence: no operation can observe a partially
//! updated borrow index or vault. External reads (price, proof
//! verification) complete before any balance moves, and balances move
//! before vault bookkeeping is committed, so a failure at any step
//! leaves no partial state behind.

pub mod liquidation;

#[cfg(test)]
mod tests;

use keel_assessor::{AssessError, Assessor};
use keel_merkle::passport::PassportScoreTree;
use keel_oracle::{OracleError, PriceOracle};
use keel_types::asset::{AssetMeta, AssetTransfer, TransferError};
use keel_types::event::{EventKind, LedgerEvent};
use keel_types::instruction::VaultInstruction;
use keel_types::math::{self, MathError, BASE, INDEX_ONE};
use keel_types::score::PassportScoreProof;
use keel_types::state::LedgerState;
use keel_types::vault::is_collateralized;
use keel_types::Address;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    // ── validation ──
    #[error("amount must be positive")]
    ZeroAmount,
    #[error("ledger is paused")]
    Paused,
    #[error("sender is not the admin")]
    NotAdmin,
    #[error("repay asset {0} is not whitelisted")]
    UnknownRepayAsset(String),
    #[error("asset {ticker} reports {reported} decimals, whitelist pins {expected}")]
    DecimalsMismatch {
        ticker: String,
        expected: u8,
        reported: u8,
    },
    #[error("score proof is not for this vault's owner")]
    ProofAccountMismatch,
    #[error("score proof protocol {got} does not match {expected}")]
    ProofProtocolMismatch { expected: String, got: String },
    #[error("borrow limit proof required while a limit root is published")]
    LimitProofRequired,
    #[error("borrow limit proof does not match the published limit root")]
    InvalidLimitProof,
    #[error("fee fractions must stay below the base scale")]
    InvalidFees,
    #[error("ratio bounds must satisfy low < high")]
    InvalidRatioBounds,

    // ── invariant ──
    #[error("vault would be undercollateralized")]
    Undercollateralized,
    #[error("denormalized debt {debt} exceeds attested credit limit {limit}")]
    CreditLimitExceeded { limit: u128, debt: u128 },
    #[error("vault is healthy, cannot liquidate")]
    VaultHealthy,
    #[error("no vault exists for this account")]
    VaultNotFound,
    #[error("no outstanding debt to repay")]
    NoOutstandingDebt,
    #[error("withdrawal of {requested} exceeds collateral {held}")]
    InsufficientCollateral { held: u128, requested: u128 },
    #[error("timestamp {now} precedes last index update {last}")]
    ClockRegression { last: u64, now: u64 },

    // ── external ──
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Assess(#[from] AssessError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Everything one instruction needs: the exclusively-borrowed ledger,
/// the operation timestamp, and the external collaborators.
pub struct ExecutionContext<'a> {
    pub state: &'a mut LedgerState,
    pub timestamp: u64,
    pub oracle: &'a dyn PriceOracle,
    pub assessor: &'a Assessor,
    pub assets: &'a mut dyn AssetTransfer,
}

pub fn execute_instruction(
    op: &VaultInstruction,
    sender: &Address,
    ctx: &mut ExecutionContext,
) -> Result<(), LedgerError> {
    accrue_index(ctx)?;

    match op {
        VaultInstruction::Deposit {
            amount,
            score_proof,
        } => deposit(sender, *amount, score_proof.as_ref(), ctx),
        VaultInstruction::Borrow {
            amount,
            score_proof,
            limit_proof,
        } => borrow(
            sender,
            *amount,
            score_proof.as_ref(),
            limit_proof.as_ref(),
            ctx,
        ),
        VaultInstruction::Repay {
            amount,
            asset,
            score_proof,
        } => repay(sender, *amount, asset, score_proof.as_ref(), ctx),
        VaultInstruction::Withdraw {
            amount,
            score_proof,
        } => withdraw(sender, *amount, score_proof.as_ref(), ctx),
        VaultInstruction::Liquidate {
            account,
            asset,
            score_proof,
        } => liquidate(sender, account, asset, score_proof.as_ref(), ctx),
        admin => apply_admin(admin, sender, ctx),
    }
}

/// Advance the shared borrow index to the operation timestamp. Runs
/// before every instruction; all normalized amounts implicitly reflect
/// the result.
fn accrue_index(ctx: &mut ExecutionContext) -> Result<(), LedgerError> {
    let now = ctx.timestamp;
    let last = ctx.state.borrow_index.last_updated;
    if now < last {
        return Err(LedgerError::ClockRegression { last, now });
    }
    let elapsed = now - last;
    if elapsed == 0 {
        return Ok(());
    }
    ctx.state.borrow_index.last_updated = now;

    let rate = ctx.state.config.rate_per_second;
    if rate == 0 {
        return Ok(());
    }
    let per_second = INDEX_ONE.checked_add(rate).ok_or(MathError::Overflow)?;
    let growth = math::pow_index(per_second, elapsed)?;
    let next = math::mul_div_down(ctx.state.borrow_index.value, growth, INDEX_ONE)?;
    ctx.state.borrow_index.value = next;
    emit(ctx.state, now, EventKind::IndexAccrued { index: next });
    Ok(())
}

fn emit(state: &mut LedgerState, timestamp: u64, kind: EventKind) {
    let seq = state.events.len() as u64;
    debug!(seq, ?kind, "ledger event");
    state.events.push(LedgerEvent {
        seq,
        timestamp,
        kind,
    });
}

/// A supplied score proof must be for the vault owner under the
/// configured score protocol; anything else is a caller error no matter
/// what the proof itself says.
fn check_proof_identity(
    state: &LedgerState,
    owner: &Address,
    proof: Option<&PassportScoreProof>,
) -> Result<(), LedgerError> {
    if let Some(p) = proof {
        if p.score.account != *owner {
            return Err(LedgerError::ProofAccountMismatch);
        }
        if p.score.protocol != state.config.score_protocol {
            return Err(LedgerError::ProofProtocolMismatch {
                expected: state.config.score_protocol.clone(),
                got: p.score.protocol.clone(),
            });
        }
    }
    Ok(())
}

/// Verify a proof supplied to an operation that does not need a ratio
/// (deposit, repay, debt-free withdraw). Invalid attestations are
/// rejected even where they would not change the outcome.
fn verify_optional_proof(
    state: &LedgerState,
    assessor: &Assessor,
    owner: &Address,
    proof: Option<&PassportScoreProof>,
) -> Result<(), LedgerError> {
    check_proof_identity(state, owner, proof)?;
    if let Some(p) = proof {
        assessor.verify(p)?;
    }
    Ok(())
}

fn assessed_ratio(
    state: &LedgerState,
    assessor: &Assessor,
    owner: &Address,
    proof: Option<&PassportScoreProof>,
) -> Result<u128, LedgerError> {
    check_proof_identity(state, owner, proof)?;
    let cfg = &state.config;
    Ok(assessor.assess(
        cfg.collateral_ratio_low,
        cfg.collateral_ratio_high,
        proof,
        cfg.score_required,
    )?)
}

/// Published limit root makes the attested ceiling a hard precondition:
/// no proof, no borrow. Limit scores are denominated in whole synthetic
/// units.
fn check_credit_limit(
    state: &LedgerState,
    account: &Address,
    proof: Option<&PassportScoreProof>,
    debt_after: u128,
) -> Result<(), LedgerError> {
    let Some(root) = state.limit_root else {
        return Ok(());
    };
    let Some(p) = proof else {
        return Err(LedgerError::LimitProofRequired);
    };
    if p.score.account != *account {
        return Err(LedgerError::ProofAccountMismatch);
    }
    if p.score.protocol != state.config.limit_protocol {
        return Err(LedgerError::ProofProtocolMismatch {
            expected: state.config.limit_protocol.clone(),
            got: p.score.protocol.clone(),
        });
    }
    if !PassportScoreTree::verify(p, &root) {
        return Err(LedgerError::InvalidLimitProof);
    }
    let limit = (p.score.score as u128)
        .checked_mul(BASE)
        .ok_or(MathError::Overflow)?;
    if debt_after > limit {
        return Err(LedgerError::CreditLimitExceeded {
            limit,
            debt: debt_after,
        });
    }
    Ok(())
}

/// Repay assets are accepted off the whitelist alone. The pinned
/// decimals must equal what the token layer reports; the pinned value,
/// never the reported one, is what converts amounts.
fn repay_asset_decimals(state: &LedgerState, asset: &AssetMeta) -> Result<u8, LedgerError> {
    let pinned = state
        .repay_assets
        .get(&asset.ticker)
        .copied()
        .ok_or_else(|| LedgerError::UnknownRepayAsset(asset.ticker.clone()))?;
    if pinned != asset.decimals {
        return Err(LedgerError::DecimalsMismatch {
            ticker: asset.ticker.clone(),
            expected: pinned,
            reported: asset.decimals,
        });
    }
    Ok(pinned)
}

/// Synthetic units surrendered to the ledger are burned; any other
/// whitelisted asset is pulled into protocol custody.
fn surrender_repay_asset(
    assets: &mut dyn AssetTransfer,
    state: &LedgerState,
    payer: &Address,
    ticker: &str,
    amount: u128,
) -> Result<(), TransferError> {
    if ticker == state.config.synthetic_ticker {
        assets.burn(ticker, payer, amount)
    } else {
        assets.transfer_from(ticker, payer, &state.config.custody, amount)
    }
}

fn deposit(
    sender: &Address,
    amount: u128,
    score_proof: Option<&PassportScoreProof>,
    ctx: &mut ExecutionContext,
) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    verify_optional_proof(ctx.state, ctx.assessor, sender, score_proof)?;

    // pure collateral increase: no ratio check
    let vault = ctx.state.vault(sender);
    let collateral_after = vault
        .collateral_amount
        .checked_add(amount)
        .ok_or(MathError::Overflow)?;

    let ticker = ctx.state.config.collateral_ticker.clone();
    let custody = ctx.state.config.custody;
    ctx.assets.transfer_from(&ticker, sender, &custody, amount)?;

    ctx.state.vaults.entry(*sender).or_default().collateral_amount = collateral_after;
    emit(
        ctx.state,
        ctx.timestamp,
        EventKind::Deposited {
            account: *sender,
            amount,
            collateral_after,
        },
    );
    Ok(())
}

fn borrow(
    sender: &Address,
    amount: u128,
    score_proof: Option<&PassportScoreProof>,
    limit_proof: Option<&PassportScoreProof>,
    ctx: &mut ExecutionContext,
) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    if ctx.state.config.paused {
        return Err(LedgerError::Paused);
    }

    let ratio = assessed_ratio(ctx.state, ctx.assessor, sender, score_proof)?;
    let price = ctx.oracle.fetch_current_price()?;

    let index = ctx.state.borrow_index.value;
    let vault = ctx.state.vault(sender);
    // owed amounts round against the borrower
    let added_normalized = math::mul_div_up(amount, INDEX_ONE, index)?;
    let normalized_after = vault
        .normalized_borrowed_amount
        .checked_add(added_normalized)
        .ok_or(MathError::Overflow)?;
    let debt_after = math::mul_div_up(normalized_after, index, INDEX_ONE)?;

    check_credit_limit(ctx.state, sender, limit_proof, debt_after)?;
    if !is_collateralized(vault.collateral_amount, price, debt_after, ratio)? {
        return Err(LedgerError::Undercollateralized);
    }
    let total_after = ctx
        .state
        .total_normalized_debt
        .checked_add(added_normalized)
        .ok_or(MathError::Overflow)?;

    let synthetic = ctx.state.config.synthetic_ticker.clone();
    ctx.assets.mint(&synthetic, sender, amount)?;

    ctx.state
        .vaults
        .entry(*sender)
        .or_default()
        .normalized_borrowed_amount = normalized_after;
    ctx.state.total_normalized_debt = total_after;
    emit(
        ctx.state,
        ctx.timestamp,
        EventKind::Borrowed {
            account: *sender,
            amount,
            normalized_after,
        },
    );
    Ok(())
}

fn repay(
    sender: &Address,
    amount: u128,
    asset: &AssetMeta,
    score_proof: Option<&PassportScoreProof>,
    ctx: &mut ExecutionContext,
) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    verify_optional_proof(ctx.state, ctx.assessor, sender, score_proof)?;
    let decimals = repay_asset_decimals(ctx.state, asset)?;

    let vault = ctx.state.vault(sender);
    if vault.normalized_borrowed_amount == 0 {
        return Err(LedgerError::NoOutstandingDebt);
    }

    let index = ctx.state.borrow_index.value;
    let amount_base = math::to_base_amount(amount, decimals)?;
    if amount_base == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    let debt = vault.denormalized_debt(index)?;

    // cap at the outstanding debt; surplus is never pulled
    let (paid_base, normalized_after) = if amount_base >= debt {
        (debt, 0)
    } else {
        // debt relief rounds down, against the payer
        let reduction = math::mul_div_down(amount_base, INDEX_ONE, index)?;
        (
            amount_base,
            vault.normalized_borrowed_amount.saturating_sub(reduction),
        )
    };
    let repaid_normalized = vault.normalized_borrowed_amount - normalized_after;
    // charging the payer rounds up
    let pull_amount = math::from_base_amount_up(paid_base, decimals)?;

    surrender_repay_asset(ctx.assets, ctx.state, sender, &asset.ticker, pull_amount)?;

    ctx.state
        .vaults
        .entry(*sender)
        .or_default()
        .normalized_borrowed_amount = normalized_after;
    ctx.state.total_normalized_debt = ctx
        .state
        .total_normalized_debt
        .saturating_sub(repaid_normalized);
    emit(
        ctx.state,
        ctx.timestamp,
        EventKind::Repaid {
            account: *sender,
            ticker: asset.ticker.clone(),
            amount_base: paid_base,
            normalized_after,
        },
    );
    Ok(())
}

fn withdraw(
    sender: &Address,
    amount: u128,
    score_proof: Option<&PassportScoreProof>,
    ctx: &mut ExecutionContext,
) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }

    let vault = ctx.state.vault(sender);
    if amount > vault.collateral_amount {
        return Err(LedgerError::InsufficientCollateral {
            held: vault.collateral_amount,
            requested: amount,
        });
    }
    let collateral_after = vault.collateral_amount - amount;

    if vault.normalized_borrowed_amount > 0 {
        let ratio = assessed_ratio(ctx.state, ctx.assessor, sender, score_proof)?;
        let price = ctx.oracle.fetch_current_price()?;
        let debt = vault.denormalized_debt(ctx.state.borrow_index.value)?;
        if !is_collateralized(collateral_after, price, debt, ratio)? {
            return Err(LedgerError::Undercollateralized);
        }
    } else {
        // debt-free withdrawals need no oracle, but a bad proof still fails
        verify_optional_proof(ctx.state, ctx.assessor, sender, score_proof)?;
    }

    let ticker = ctx.state.config.collateral_ticker.clone();
    let custody = ctx.state.config.custody;
    ctx.assets.transfer_from(&ticker, &custody, sender, amount)?;

    ctx.state.vaults.entry(*sender).or_default().collateral_amount = collateral_after;
    emit(
        ctx.state,
        ctx.timestamp,
        EventKind::Withdrawn {
            account: *sender,
            amount,
            collateral_after,
        },
    );
    Ok(())
}

fn liquidate(
    liquidator: &Address,
    account: &Address,
    asset: &AssetMeta,
    score_proof: Option<&PassportScoreProof>,
    ctx: &mut ExecutionContext,
) -> Result<(), LedgerError> {
    if !ctx.state.vaults.contains_key(account) {
        return Err(LedgerError::VaultNotFound);
    }
    let vault = ctx.state.vault(account);

    // the assessed ratio is the vault owner's; the liquidator supplies
    // the owner's proof
    let ratio = assessed_ratio(ctx.state, ctx.assessor, account, score_proof)?;
    let price = ctx.oracle.fetch_current_price()?;
    let index = ctx.state.borrow_index.value;
    let debt = vault.denormalized_debt(index)?;

    if is_collateralized(vault.collateral_amount, price, debt, ratio)? {
        return Err(LedgerError::VaultHealthy);
    }

    // asset acceptance is checked before anything moves
    let decimals = repay_asset_decimals(ctx.state, asset)?;

    let cfg = &ctx.state.config;
    let plan = liquidation::plan_liquidation(
        vault.collateral_amount,
        debt,
        price,
        ratio,
        cfg.liquidator_discount,
        cfg.liquidation_fee,
    )?;
    let pull_amount = math::from_base_amount_up(plan.debt_repaid, decimals)?;

    let collateral_ticker = cfg.collateral_ticker.clone();
    let custody = cfg.custody;
    let fee_treasury = cfg.fee_treasury;

    surrender_repay_asset(ctx.assets, ctx.state, liquidator, &asset.ticker, pull_amount)?;
    ctx.assets.transfer_from(
        &collateral_ticker,
        &custody,
        liquidator,
        plan.collateral_to_liquidator,
    )?;
    ctx.assets.transfer_from(
        &collateral_ticker,
        &custody,
        &fee_treasury,
        plan.collateral_to_treasury,
    )?;

    let repaid_normalized = if plan.closes_vault {
        vault.normalized_borrowed_amount
    } else {
        math::mul_div_down(plan.debt_repaid, INDEX_ONE, index)?
    };
    let entry = ctx.state.vaults.entry(*account).or_default();
    entry.collateral_amount = vault.collateral_amount - plan.collateral_seized;
    entry.normalized_borrowed_amount = vault
        .normalized_borrowed_amount
        .saturating_sub(repaid_normalized);
    ctx.state.total_normalized_debt = ctx
        .state
        .total_normalized_debt
        .saturating_sub(repaid_normalized);
    ctx.state.bad_debt = ctx.state.bad_debt.saturating_add(plan.debt_written_off);

    info!(
        debt_repaid = plan.debt_repaid,
        collateral_seized = plan.collateral_seized,
        closed = plan.closes_vault,
        "vault liquidated"
    );
    emit(
        ctx.state,
        ctx.timestamp,
        EventKind::Liquidated {
            account: *account,
            liquidator: *liquidator,
            debt_repaid: plan.debt_repaid,
            collateral_seized: plan.collateral_seized,
            collateral_to_liquidator: plan.collateral_to_liquidator,
            collateral_to_treasury: plan.collateral_to_treasury,
            closed: plan.closes_vault,
        },
    );
    if plan.debt_written_off > 0 {
        emit(
            ctx.state,
            ctx.timestamp,
            EventKind::DebtWrittenOff {
                account: *account,
                amount: plan.debt_written_off,
            },
        );
    }
    Ok(())
}

fn apply_admin(
    op: &VaultInstruction,
    sender: &Address,
    ctx: &mut ExecutionContext,
) -> Result<(), LedgerError> {
    if *sender != ctx.state.config.admin {
        return Err(LedgerError::NotAdmin);
    }

    match op {
        VaultInstruction::SetFees {
            liquidator_discount,
            liquidation_fee,
        } => {
            if *liquidator_discount >= BASE || *liquidation_fee > BASE {
                return Err(LedgerError::InvalidFees);
            }
            ctx.state.config.liquidator_discount = *liquidator_discount;
            ctx.state.config.liquidation_fee = *liquidation_fee;
            emit(
                ctx.state,
                ctx.timestamp,
                EventKind::FeesUpdated {
                    liquidator_discount: *liquidator_discount,
                    liquidation_fee: *liquidation_fee,
                },
            );
        }
        VaultInstruction::SetInterestRate { rate_per_second } => {
            // the index was already accrued at the old rate this call
            ctx.state.config.rate_per_second = *rate_per_second;
            emit(
                ctx.state,
                ctx.timestamp,
                EventKind::InterestRateUpdated {
                    rate_per_second: *rate_per_second,
                },
            );
        }
        VaultInstruction::SetRatioBounds { low, high } => {
            if *low >= *high || *high == 0 {
                return Err(LedgerError::InvalidRatioBounds);
            }
            ctx.state.config.collateral_ratio_low = *low;
            ctx.state.config.collateral_ratio_high = *high;
            emit(
                ctx.state,
                ctx.timestamp,
                EventKind::RatioBoundsUpdated {
                    low: *low,
                    high: *high,
                },
            );
        }
        VaultInstruction::SetLimitRoot { root } => {
            // the all-zero root unpublishes the limit tree
            ctx.state.limit_root = if *root == [0u8; 32] { None } else { Some(*root) };
            emit(
                ctx.state,
                ctx.timestamp,
                EventKind::LimitRootUpdated { root: *root },
            );
        }
        VaultInstruction::AddRepayAsset { ticker, decimals } => {
            ctx.state.repay_assets.insert(ticker.clone(), *decimals);
            emit(
                ctx.state,
                ctx.timestamp,
                EventKind::RepayAssetAdded {
                    ticker: ticker.clone(),
                    decimals: *decimals,
                },
            );
        }
        VaultInstruction::RemoveRepayAsset { ticker } => {
            ctx.state.repay_assets.remove(ticker);
            emit(
                ctx.state,
                ctx.timestamp,
                EventKind::RepayAssetRemoved {
                    ticker: ticker.clone(),
                },
            );
        }
        VaultInstruction::SetPaused { paused } => {
            ctx.state.config.paused = *paused;
            emit(
                ctx.state,
                ctx.timestamp,
                EventKind::PausedSet { paused: *paused },
            );
        }
        // user variants are dispatched before this point
        _ => unreachable!("non-admin instruction routed to apply_admin"),
    }
    Ok(())
}

/// Conservative read-only screen over every vault at a caller-chosen
/// ratio (typically the worst-case upper bound). Runs across accounts in
/// parallel; `Liquidate` re-verifies with the owner's proof before
/// anything moves. Output is sorted for deterministic keeper behavior.
pub fn scan_liquidatable(state: &LedgerState, price: u128, ratio: u128) -> Vec<Address> {
    let index = state.borrow_index.value;
    let mut flagged: Vec<Address> = state
        .vaults
        .par_iter()
        .filter_map(|(address, vault)| {
            let debt = vault.denormalized_debt(index).ok()?;
            if debt == 0 {
                return None;
            }
            match is_collateralized(vault.collateral_amount, price, debt, ratio) {
                Ok(false) => Some(*address),
                _ => None,
            }
        })
        .collect();
    flagged.sort_unstable();
    flagged
}
