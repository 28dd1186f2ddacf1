//! Debt health calculator.
//!
//! Aggregates a position's collateral and debt into the
//! `(current, max, liquidatable)` triple. Pure functions of market state at
//! call time; nothing is cached between calls.

use crate::comet::Comet;
use crate::errors::{StrategyError, StrategyResult};
use crate::math::{mul_factor, mul_price, present_value, to_signed};
use crate::types::{Address, DebtHealth};

/// Debt health of an account in a comet-style market.
///
/// The signed present value of the base principal, priced and scaled,
/// seeds both running liquidity sums; every configured collateral slot,
/// held or not, contributes its USD value scaled by the liquidation
/// factor to one sum and by the borrow factor to the other. `zero_point`
/// is the utilization baseline with no collateral posted. A negative
/// result in any of the three unsigned conversions is an invariant
/// violation, not a normal error.
pub fn comet_debt_health(comet: &Comet, account: Address) -> StrategyResult<DebtHealth> {
    let totals = comet.totals_basic();
    let base_pv = present_value(
        comet.user_basic(account).principal,
        totals.base_supply_index,
        totals.base_borrow_index,
    )?;
    let base_price = to_signed(comet.get_price(comet.base_token_price_feed())?)?;
    let base_scale = to_signed(comet.base_scale())?;
    let mut liquidity = base_pv
        .checked_mul(base_price)
        .ok_or(StrategyError::ArithmeticOverflow)?
        / base_scale;
    let zero_point = -liquidity;
    let mut borrow_liquidity = liquidity;

    for offset in 0..comet.num_assets() {
        let info = comet.get_asset_info(offset)?;
        let balance = comet.collateral_balance_of(account, info.asset);
        let value = mul_price(balance, comet.get_price(info.price_feed)?, info.scale)?;
        liquidity = liquidity
            .checked_add(to_signed(mul_factor(value, info.liquidate_collateral_factor)?)?)
            .ok_or(StrategyError::ArithmeticOverflow)?;
        borrow_liquidity = borrow_liquidity
            .checked_add(to_signed(mul_factor(value, info.borrow_collateral_factor)?)?)
            .ok_or(StrategyError::ArithmeticOverflow)?;
    }

    Ok(DebtHealth {
        current: unsigned_or_invariant(zero_point)?,
        max: unsigned_or_invariant(
            zero_point
                .checked_add(borrow_liquidity)
                .ok_or(StrategyError::ArithmeticOverflow)?,
        )?,
        liquidatable: unsigned_or_invariant(
            zero_point
                .checked_add(liquidity)
                .ok_or(StrategyError::ArithmeticOverflow)?,
        )?,
    })
}

fn unsigned_or_invariant(value: i128) -> StrategyResult<u128> {
    u128::try_from(value).map_err(|_| StrategyError::NegativeLiquidity(value))
}

/// Debt health of a single collateral/debt pair (pool-style markets).
///
/// Utilization is `debt * 1e4 / collateral` (zero with no collateral); the
/// borrow threshold is the pair's collateral factor and the liquidation
/// threshold is 85% of it.
pub fn pair_debt_health(
    collateral_balance: u128,
    debt_balance: u128,
    collateral_factor: u128,
) -> DebtHealth {
    let current = if collateral_balance == 0 {
        0
    } else {
        debt_balance * 10_000 / collateral_balance
    };
    DebtHealth {
        current,
        max: collateral_factor,
        liquidatable: collateral_factor * 85 / 100,
    }
}
