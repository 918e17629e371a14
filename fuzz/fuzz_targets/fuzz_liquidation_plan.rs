#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use keel_ledger::liquidation::plan_liquidation;
use keel_types::math::BASE;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    collateral: u64,
    debt: u64,
    price: u64,
    ratio: u64,
    discount: u64,
    fee: u64,
}

fuzz_target!(|data: FuzzInput| {
    let collateral = data.collateral as u128;
    let debt = data.debt as u128;
    let price = data.price as u128 % (1_000_000 * BASE) + 1;
    let ratio = data.ratio as u128 % (10 * BASE) + BASE;
    let discount = data.discount as u128 % BASE;
    let fee = data.fee as u128 % (BASE + 1);

    let Ok(plan) = plan_liquidation(collateral, debt, price, ratio, discount, fee) else {
        return;
    };

    // nothing is conjured: seized collateral and settled debt stay
    // inside what the vault actually holds and owes
    assert!(plan.collateral_seized <= collateral);
    assert_eq!(
        plan.collateral_to_liquidator + plan.collateral_to_treasury,
        plan.collateral_seized
    );
    assert!(plan.debt_repaid + plan.debt_written_off <= debt);
    assert_eq!(
        plan.closes_vault,
        plan.debt_repaid + plan.debt_written_off == debt
    );
});
