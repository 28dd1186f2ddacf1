//! Exact-input swap router model.
//!
//! Single-hop swaps at configured rates. The router pulls the input token
//! from the payer against an allowance, applies the fee tier, and pays the
//! output token out of its own reserves. Minimum-output and deadline
//! violations are the router's failures, not the strategy layer's.

use crate::errors::{StrategyError, StrategyResult};
use crate::token::TokenLedger;
use crate::types::Address;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Router handle shared with the flash-swap callback.
pub type SharedRouter = Arc<RwLock<ExactInputRouter>>;

/// Fee denominator: fee tiers are hundredths of a basis point.
pub const FEE_SCALE: u128 = 1_000_000;

/// Parameters of a single-hop exact-input swap.
#[derive(Debug, Clone, Copy)]
pub struct ExactInputParams {
    pub token_in: Address,
    pub token_out: Address,
    /// Fee tier in hundredths of a basis point (3000 = 0.3%)
    pub fee: u32,
    pub recipient: Address,
    pub amount_in: u128,
    pub amount_out_minimum: u128,
    /// Price limit; zero disables the limit. Non-zero limits are not
    /// supported by this model.
    pub sqrt_price_limit: u128,
    pub deadline: u64,
}

/// Conversion rate: `out = in * numerator / denominator`.
#[derive(Debug, Clone, Copy)]
pub struct Rate {
    pub numerator: u128,
    pub denominator: u128,
}

/// In-process exact-input router.
#[derive(Debug, Clone)]
pub struct ExactInputRouter {
    address: Address,
    rates: HashMap<(Address, Address), Rate>,
}

impl ExactInputRouter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            rates: HashMap::new(),
        }
    }

    /// Wrap the router in a shared handle.
    pub fn shared(self) -> SharedRouter {
        Arc::new(RwLock::new(self))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Configure the conversion rate for a pair.
    pub fn set_rate(&mut self, token_in: Address, token_out: Address, rate: Rate) {
        self.rates.insert((token_in, token_out), rate);
    }

    /// Execute an exact-input single-hop swap on behalf of `payer`.
    /// Returns the output amount delivered to the recipient.
    pub fn exact_input_single(
        &self,
        ledger: &mut TokenLedger,
        payer: Address,
        params: ExactInputParams,
        now: u64,
    ) -> StrategyResult<u128> {
        if now > params.deadline {
            return Err(StrategyError::DeadlineExpired {
                deadline: params.deadline,
                now,
            });
        }
        if params.sqrt_price_limit != 0 {
            return Err(StrategyError::SwapFailed(
                "price limits are not supported".to_string(),
            ));
        }
        let rate = self
            .rates
            .get(&(params.token_in, params.token_out))
            .copied()
            .ok_or_else(|| {
                StrategyError::SwapFailed(format!(
                    "no route from {} to {}",
                    params.token_in, params.token_out
                ))
            })?;
        if rate.denominator == 0 {
            return Err(StrategyError::SwapFailed("zero-denominator rate".to_string()));
        }
        if params.fee as u128 > FEE_SCALE {
            return Err(StrategyError::SwapFailed(format!(
                "fee tier {} exceeds the fee scale",
                params.fee
            )));
        }

        let amount_after_fee = params.amount_in
            .checked_mul(FEE_SCALE - params.fee as u128)
            .ok_or(StrategyError::ArithmeticOverflow)?
            / FEE_SCALE;
        let amount_out = amount_after_fee
            .checked_mul(rate.numerator)
            .ok_or(StrategyError::ArithmeticOverflow)?
            / rate.denominator;
        if amount_out < params.amount_out_minimum {
            return Err(StrategyError::SwapFailed(format!(
                "output {} below minimum {}",
                amount_out, params.amount_out_minimum
            )));
        }

        ledger.transfer_from(
            params.token_in,
            self.address,
            payer,
            self.address,
            params.amount_in,
        )?;
        ledger.transfer(params.token_out, self.address, params.recipient, amount_out)?;
        Ok(amount_out)
    }
}
