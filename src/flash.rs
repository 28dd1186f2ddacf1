//! Flash-loan collateral swap.
//!
//! `CollateralSwap` is the receiver side of a flash loan: within one
//! callback it swaps the borrowed asset into a target collateral asset,
//! supplies the proceeds for the original caller, and withdraws the
//! caller's original collateral so the caller can settle the loan. Any
//! failure aborts the whole sequence; `FlashLender` models the
//! all-or-nothing rollback the execution environment provides by
//! snapshotting ledger and market state around the callback.

use crate::comet::SharedComet;
use crate::errors::{StrategyError, StrategyResult};
use crate::position::PositionId;
use crate::router::{ExactInputParams, SharedRouter};
use crate::token::SharedLedger;
use crate::types::Address;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default fee tier used for the collateral swap (0.3%).
pub const DEFAULT_SWAP_FEE: u32 = 3000;

/// Opaque callback payload: the target output asset and target market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    pub asset_out: Address,
    pub market: Address,
}

impl SwapParams {
    /// Encode as two 32-byte words, addresses left-padded with zeroes.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; 64];
        data[12..32].copy_from_slice(self.asset_out.as_bytes());
        data[44..64].copy_from_slice(self.market.as_bytes());
        data
    }

    /// Decode the payload, rejecting wrong lengths and non-zero padding.
    pub fn decode(data: &[u8]) -> StrategyResult<Self> {
        if data.len() != 64 {
            return Err(StrategyError::MalformedCallData {
                expected: 64,
                got: data.len(),
            });
        }
        if data[..12].iter().any(|b| *b != 0) || data[32..44].iter().any(|b| *b != 0) {
            return Err(StrategyError::MalformedCallData {
                expected: 64,
                got: data.len(),
            });
        }
        let mut asset_out = [0u8; 20];
        asset_out.copy_from_slice(&data[12..32]);
        let mut market = [0u8; 20];
        market.copy_from_slice(&data[44..64]);
        Ok(Self {
            asset_out: Address(asset_out),
            market: Address(market),
        })
    }
}

/// Inbound flash-loan callback payload.
#[derive(Debug, Clone)]
pub struct FlashLoan {
    pub assets: Vec<Address>,
    pub amounts: Vec<u128>,
    pub premiums: Vec<u128>,
    /// The account that requested the loan, as declared by the lender
    pub initiator: Address,
    /// Opaque parameters, decoded by the receiver
    pub data: Vec<u8>,
}

/// Flash-loan receiver executing the borrow -> swap -> supply -> repay
/// sequence as one unit.
pub struct CollateralSwap {
    address: Address,
    /// The lending pool funds are pulled from during the callback
    lender: Address,
    /// Fee tier passed to the router
    fee: u32,
    ledger: SharedLedger,
    router: SharedRouter,
    /// Markets this receiver can supply to and withdraw from
    markets: HashMap<Address, SharedComet>,
}

impl CollateralSwap {
    pub fn new(
        address: Address,
        lender: Address,
        ledger: SharedLedger,
        router: SharedRouter,
    ) -> Self {
        Self {
            address,
            lender,
            fee: DEFAULT_SWAP_FEE,
            ledger,
            router,
            markets: HashMap::new(),
        }
    }

    /// Override the router fee tier.
    pub fn with_fee(mut self, fee: u32) -> Self {
        self.fee = fee;
        self
    }

    /// Register a market the receiver may target. Configuration only;
    /// immutable once the receiver is in use.
    pub fn register_market(&mut self, comet: SharedComet) {
        let address = comet.read().address();
        self.markets.insert(address, comet);
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Handles of every registered market, for the lender's snapshots.
    pub fn market_handles(&self) -> Vec<SharedComet> {
        self.markets.values().cloned().collect()
    }

    /// The single externally reachable transition.
    ///
    /// `caller` is the account on whose behalf the lender delivers the
    /// callback; it must match the loan's declared initiator before any
    /// token moves. The swap runs with a minimum output of one unit and a
    /// deadline of the current time; both are deliberately loose guards
    /// and known weak spots, not recommended defaults.
    pub fn on_flash_loan(
        &self,
        caller: Address,
        loan: &FlashLoan,
        now: u64,
    ) -> StrategyResult<bool> {
        if loan.initiator != caller {
            return Err(StrategyError::InvalidInitiator {
                initiator: loan.initiator,
                caller,
            });
        }
        if loan.assets.is_empty() || loan.amounts.is_empty() {
            return Err(StrategyError::MalformedCallData {
                expected: 1,
                got: 0,
            });
        }
        let asset_in = loan.assets[0];
        let amount_in = loan.amounts[0];
        let params = SwapParams::decode(&loan.data)?;
        let comet = self
            .markets
            .get(&params.market)
            .ok_or(StrategyError::UnsupportedPosition(PositionId::for_market(
                params.market,
            )))?;
        debug!(
            asset_in = %asset_in,
            amount_in,
            asset_out = %params.asset_out,
            market = %params.market,
            "executing collateral swap"
        );

        let mut ledger = self.ledger.write();
        let mut comet = comet.write();
        let router = self.router.read();

        // Pull the flash-borrowed asset into custody.
        ledger.transfer_from(asset_in, self.address, self.lender, self.address, amount_in)?;

        // Swap with the loose floor of one output unit.
        ledger.approve(asset_in, self.address, router.address(), 0)?;
        ledger.approve(asset_in, self.address, router.address(), amount_in)?;
        router
            .exact_input_single(
                &mut ledger,
                self.address,
                ExactInputParams {
                    token_in: asset_in,
                    token_out: params.asset_out,
                    fee: self.fee,
                    recipient: self.address,
                    amount_in,
                    amount_out_minimum: 1,
                    sqrt_price_limit: 0,
                    deadline: now,
                },
                now,
            )
            .map_err(|err| match err {
                failure @ StrategyError::SwapFailed(_) => failure,
                other => StrategyError::SwapFailed(other.to_string()),
            })?;

        // Supply the entire post-swap balance for the original caller.
        let proceeds = ledger.balance_of(params.asset_out, self.address);
        ledger.approve(params.asset_out, self.address, params.market, 0)?;
        ledger.approve(params.asset_out, self.address, params.market, proceeds)?;
        comet.supply_to(
            &mut ledger,
            self.address,
            loan.initiator,
            params.asset_out,
            proceeds,
        )?;

        // Release the original collateral so the caller can settle the loan.
        comet.withdraw_to(&mut ledger, loan.initiator, loan.initiator, asset_in, amount_in)?;
        Ok(true)
    }
}

/// Flash-loan provider with all-or-nothing settlement.
pub struct FlashLender {
    address: Address,
    /// Loan premium in basis points
    premium_bps: u128,
    ledger: SharedLedger,
}

impl FlashLender {
    pub fn new(address: Address, ledger: SharedLedger) -> Self {
        Self {
            address,
            premium_bps: 9,
            ledger,
        }
    }

    /// Override the loan premium.
    pub fn with_premium_bps(mut self, premium_bps: u128) -> Self {
        self.premium_bps = premium_bps;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Lend `amount` of `asset` to the receiver for the duration of one
    /// callback, then collect principal plus premium from `origin`.
    ///
    /// Ledger and market state are snapshotted before the callback and
    /// restored on any failure, including a failure to collect; no partial
    /// effects survive.
    pub fn flash_loan(
        &self,
        origin: Address,
        receiver: &CollateralSwap,
        asset: Address,
        amount: u128,
        data: Vec<u8>,
        now: u64,
    ) -> StrategyResult<()> {
        let premium = amount * self.premium_bps / 10_000;
        let ledger_snapshot = self.ledger.read().clone();
        let market_snapshots: Vec<_> = receiver
            .market_handles()
            .into_iter()
            .map(|handle| {
                let state = handle.read().clone();
                (handle, state)
            })
            .collect();

        let loan = FlashLoan {
            assets: vec![asset],
            amounts: vec![amount],
            premiums: vec![premium],
            initiator: origin,
            data,
        };
        let outcome = self.settle(origin, receiver, &loan, now);
        match outcome {
            Ok(()) => {
                info!(origin = %origin, asset = %asset, amount, premium, "flash loan settled");
                Ok(())
            }
            Err(err) => {
                warn!(origin = %origin, asset = %asset, amount, error = %err, "flash loan rolled back");
                *self.ledger.write() = ledger_snapshot;
                for (handle, state) in market_snapshots {
                    *handle.write() = state;
                }
                Err(err)
            }
        }
    }

    fn settle(
        &self,
        origin: Address,
        receiver: &CollateralSwap,
        loan: &FlashLoan,
        now: u64,
    ) -> StrategyResult<()> {
        let asset = loan.assets[0];
        let amount = loan.amounts[0];
        {
            let mut ledger = self.ledger.write();
            let reserves = ledger.balance_of(asset, self.address);
            if reserves < amount {
                return Err(StrategyError::InsufficientBalance {
                    asset,
                    required: amount,
                    available: reserves,
                });
            }
            // Let the receiver pull the loan during the callback.
            ledger.approve(asset, self.address, receiver.address(), amount)?;
        }

        let accepted = receiver.on_flash_loan(origin, loan, now)?;
        if !accepted {
            return Err(StrategyError::SwapFailed(
                "receiver rejected the loan".to_string(),
            ));
        }

        let owed = amount + loan.premiums[0];
        let mut ledger = self.ledger.write();
        let available = ledger.balance_of(asset, origin);
        ledger
            .transfer(asset, origin, self.address, owed)
            .map_err(|_| StrategyError::LoanNotRepaid {
                asset,
                owed,
                available,
            })
    }
}
