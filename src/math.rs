//! Fixed-point arithmetic helpers.
//!
//! Conversions between the unsigned amount domain and the signed
//! principal/liquidity domain, plus the rate-index present-value math used
//! by comet-style markets. All paths fail with a typed error rather than
//! silently wrapping.

use crate::errors::{StrategyError, StrategyResult};

/// Fixed base for collateral factors: factors are fractions of 1e18.
pub const FACTOR_SCALE: u128 = 1_000_000_000_000_000_000;

/// Scale of the supply/borrow rate indices.
pub const BASE_INDEX_SCALE: u128 = 1_000_000_000_000_000;

/// Scale of oracle prices (8 decimals).
pub const PRICE_SCALE: u128 = 100_000_000;

/// Convert an unsigned amount into the signed domain.
pub fn to_signed(value: u128) -> StrategyResult<i128> {
    i128::try_from(value).map_err(|_| StrategyError::SignedOverflow(value))
}

/// Convert a signed quantity back into the unsigned domain.
pub fn to_unsigned(value: i128) -> StrategyResult<u128> {
    u128::try_from(value).map_err(|_| StrategyError::NegativeAmount(value))
}

/// Present value of a principal balance under the given rate indices.
///
/// Positive principal accrues along the supply index, negative principal
/// along the borrow index. The sign of the result matches the sign of the
/// principal.
pub fn present_value(
    principal: i128,
    base_supply_index: u128,
    base_borrow_index: u128,
) -> StrategyResult<i128> {
    let index = if principal >= 0 {
        base_supply_index
    } else {
        base_borrow_index
    };
    let scaled = principal
        .checked_mul(to_signed(index)?)
        .ok_or(StrategyError::ArithmeticOverflow)?;
    Ok(scaled / to_signed(BASE_INDEX_SCALE)?)
}

/// Inverse of [`present_value`]: the principal that realizes a present
/// balance under the given indices. Sign selects the index exactly as in
/// the forward direction.
pub fn principal_value(
    present: i128,
    base_supply_index: u128,
    base_borrow_index: u128,
) -> StrategyResult<i128> {
    let index = if present >= 0 {
        base_supply_index
    } else {
        base_borrow_index
    };
    if index == 0 {
        return Err(StrategyError::ArithmeticOverflow);
    }
    let scaled = present
        .checked_mul(to_signed(BASE_INDEX_SCALE)?)
        .ok_or(StrategyError::ArithmeticOverflow)?;
    Ok(scaled / to_signed(index)?)
}

/// Scale a value by a collateral factor expressed as a fraction of
/// [`FACTOR_SCALE`].
pub fn mul_factor(value: u128, factor: u128) -> StrategyResult<u128> {
    Ok(value
        .checked_mul(factor)
        .ok_or(StrategyError::ArithmeticOverflow)?
        / FACTOR_SCALE)
}

/// USD-equivalent value of a balance: `balance * price / scale`.
pub fn mul_price(balance: u128, price: u128, scale: u128) -> StrategyResult<u128> {
    if scale == 0 {
        return Err(StrategyError::ArithmeticOverflow);
    }
    Ok(balance
        .checked_mul(price)
        .ok_or(StrategyError::ArithmeticOverflow)?
        / scale)
}
