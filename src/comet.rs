//! Comet-style lending market model.
//!
//! A base-asset-centric market: one borrowable base asset, up to sixteen
//! collateral asset slots. An account's base holding is a signed principal
//! scaled by supply/borrow rate indices; its collateral holdings are
//! tracked per slot with an `assets_in` bitmask recording which slots are
//! occupied. The model keeps the market's own invariants (factor bounds,
//! borrow minimum, borrow-capacity checks on withdrawal) while leaving
//! interest accrual to explicit index updates, since the strategy layer
//! treats market accounting as an external concern.

use crate::errors::{StrategyError, StrategyResult};
use crate::math::{
    self, mul_factor, mul_price, present_value, principal_value, FACTOR_SCALE,
};
use crate::token::TokenLedger;
use crate::types::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Market handle shared between strategies and the flash-swap callback.
pub type SharedComet = Arc<RwLock<Comet>>;

/// Maximum number of collateral asset slots (width of the bitmask).
pub const MAX_ASSETS: u8 = 16;

/// Configuration of one collateral asset slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Slot index, also the asset's bit in the `assets_in` mask
    pub offset: u8,
    /// Collateral token
    pub asset: Address,
    /// Oracle feed pricing this asset
    pub price_feed: Address,
    /// Fixed-point denominator of the asset's balances
    pub scale: u128,
    /// Fraction of value usable as borrow capacity
    pub borrow_collateral_factor: u128,
    /// Fraction of value counted toward the liquidation threshold
    pub liquidate_collateral_factor: u128,
}

/// An account's base-asset bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserBasic {
    /// Signed principal: positive supplies, negative borrows
    pub principal: i128,
    /// Bitmask of occupied collateral slots
    pub assets_in: u16,
}

/// Market-wide rate indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsBasic {
    pub base_supply_index: u128,
    pub base_borrow_index: u128,
}

impl Default for TotalsBasic {
    fn default() -> Self {
        Self {
            base_supply_index: math::BASE_INDEX_SCALE,
            base_borrow_index: math::BASE_INDEX_SCALE,
        }
    }
}

/// Immutable market configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CometConfig {
    /// The market's own account address
    pub address: Address,
    /// Borrowable base asset
    pub base_token: Address,
    /// Oracle feed pricing the base asset
    pub base_token_price_feed: Address,
    /// Fixed-point denominator of base balances
    pub base_scale: u128,
    /// Minimum size of a base borrow
    pub base_borrow_min: u128,
}

/// In-process comet market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comet {
    config: CometConfig,
    asset_configs: Vec<AssetInfo>,
    /// feed -> price in PRICE_SCALE units
    prices: HashMap<Address, u128>,
    totals: TotalsBasic,
    users: HashMap<Address, UserBasic>,
    /// (account, asset) -> collateral balance
    collateral: HashMap<(Address, Address), u128>,
}

impl Comet {
    pub fn new(config: CometConfig) -> Self {
        Self {
            config,
            asset_configs: Vec::new(),
            prices: HashMap::new(),
            totals: TotalsBasic::default(),
            users: HashMap::new(),
            collateral: HashMap::new(),
        }
    }

    /// Wrap a market in a shared handle.
    pub fn shared(self) -> SharedComet {
        Arc::new(RwLock::new(self))
    }

    /// List a collateral asset. Returns the assigned slot offset.
    ///
    /// Factors must be fractions of `FACTOR_SCALE` with the borrow factor
    /// no larger than the liquidation factor.
    pub fn add_asset(
        &mut self,
        asset: Address,
        price_feed: Address,
        scale: u128,
        borrow_collateral_factor: u128,
        liquidate_collateral_factor: u128,
    ) -> StrategyResult<u8> {
        if borrow_collateral_factor > liquidate_collateral_factor
            || liquidate_collateral_factor > FACTOR_SCALE
        {
            return Err(StrategyError::InvalidCollateralFactors {
                borrow: borrow_collateral_factor,
                liquidate: liquidate_collateral_factor,
            });
        }
        if self.asset_configs.iter().any(|info| info.asset == asset) {
            return Err(StrategyError::AssetAlreadyListed(asset));
        }
        if self.asset_configs.len() >= MAX_ASSETS as usize {
            return Err(StrategyError::AssetSlotsExhausted);
        }
        let offset = self.asset_configs.len() as u8;
        self.asset_configs.push(AssetInfo {
            offset,
            asset,
            price_feed,
            scale,
            borrow_collateral_factor,
            liquidate_collateral_factor,
        });
        Ok(offset)
    }

    /// Post a price for a feed, in `PRICE_SCALE` units.
    pub fn set_price(&mut self, feed: Address, price: u128) {
        self.prices.insert(feed, price);
    }

    /// Advance the rate indices (simulated accrual).
    pub fn set_totals(&mut self, totals: TotalsBasic) {
        self.totals = totals;
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn base_token(&self) -> Address {
        self.config.base_token
    }

    pub fn base_token_price_feed(&self) -> Address {
        self.config.base_token_price_feed
    }

    pub fn base_scale(&self) -> u128 {
        self.config.base_scale
    }

    pub fn base_borrow_min(&self) -> u128 {
        self.config.base_borrow_min
    }

    pub fn num_assets(&self) -> u8 {
        self.asset_configs.len() as u8
    }

    pub fn get_asset_info(&self, offset: u8) -> StrategyResult<AssetInfo> {
        self.asset_configs
            .get(offset as usize)
            .copied()
            .ok_or(StrategyError::UnknownAssetSlot(offset))
    }

    pub fn get_asset_info_by_address(&self, asset: Address) -> Option<AssetInfo> {
        self.asset_configs
            .iter()
            .find(|info| info.asset == asset)
            .copied()
    }

    pub fn get_price(&self, feed: Address) -> StrategyResult<u128> {
        self.prices
            .get(&feed)
            .copied()
            .ok_or(StrategyError::UnknownPriceFeed(feed))
    }

    pub fn totals_basic(&self) -> TotalsBasic {
        self.totals
    }

    pub fn user_basic(&self, account: Address) -> UserBasic {
        self.users.get(&account).copied().unwrap_or_default()
    }

    pub fn collateral_balance_of(&self, account: Address, asset: Address) -> u128 {
        self.collateral
            .get(&(account, asset))
            .copied()
            .unwrap_or(0)
    }

    /// Present-value borrow balance of an account (zero for suppliers).
    pub fn borrow_balance_of(&self, account: Address) -> StrategyResult<u128> {
        let pv = self.present_principal(account)?;
        if pv < 0 {
            math::to_unsigned(-pv)
        } else {
            Ok(0)
        }
    }

    /// Present-value supply balance of an account (zero for borrowers).
    pub fn balance_of(&self, account: Address) -> StrategyResult<u128> {
        let pv = self.present_principal(account)?;
        if pv > 0 {
            math::to_unsigned(pv)
        } else {
            Ok(0)
        }
    }

    fn present_principal(&self, account: Address) -> StrategyResult<i128> {
        present_value(
            self.user_basic(account).principal,
            self.totals.base_supply_index,
            self.totals.base_borrow_index,
        )
    }

    /// Supply base or collateral for `dst`, pulling tokens from `from`
    /// against an allowance granted to this market.
    pub fn supply_to(
        &mut self,
        ledger: &mut TokenLedger,
        from: Address,
        dst: Address,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        if asset != self.config.base_token && self.get_asset_info_by_address(asset).is_none() {
            return Err(StrategyError::UnknownAsset(asset));
        }
        ledger.transfer_from(asset, self.config.address, from, self.config.address, amount)?;

        if asset == self.config.base_token {
            let pv = self.present_principal(dst)?;
            let new_pv = pv
                .checked_add(math::to_signed(amount)?)
                .ok_or(StrategyError::ArithmeticOverflow)?;
            let principal = principal_value(
                new_pv,
                self.totals.base_supply_index,
                self.totals.base_borrow_index,
            )?;
            self.users.entry(dst).or_default().principal = principal;
        } else {
            let info = self
                .get_asset_info_by_address(asset)
                .ok_or(StrategyError::UnknownAsset(asset))?;
            *self.collateral.entry((dst, asset)).or_insert(0) += amount;
            self.users.entry(dst).or_default().assets_in |= 1 << info.offset;
        }
        Ok(())
    }

    /// Withdraw base or collateral from `src`'s holdings to `to`.
    ///
    /// Withdrawing base past zero opens a borrow; the resulting borrow must
    /// meet the market minimum and stay within borrow capacity. A
    /// collateral withdrawal must leave any open borrow collateralized.
    pub fn withdraw_to(
        &mut self,
        ledger: &mut TokenLedger,
        src: Address,
        to: Address,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        if asset == self.config.base_token {
            let pv = self.present_principal(src)?;
            let new_pv = pv
                .checked_sub(math::to_signed(amount)?)
                .ok_or(StrategyError::ArithmeticOverflow)?;
            if new_pv < 0 {
                let borrow = math::to_unsigned(-new_pv)?;
                if borrow < self.config.base_borrow_min {
                    return Err(StrategyError::AmountOutOfBounds {
                        asset,
                        requested: borrow,
                        min: self.config.base_borrow_min,
                        max: u128::MAX,
                    });
                }
                self.check_borrow_capacity(src, borrow)?;
            }
            let principal = principal_value(
                new_pv,
                self.totals.base_supply_index,
                self.totals.base_borrow_index,
            )?;
            self.users.entry(src).or_default().principal = principal;
        } else {
            let info = self
                .get_asset_info_by_address(asset)
                .ok_or(StrategyError::UnknownAsset(asset))?;
            let held = self.collateral_balance_of(src, asset);
            if held < amount {
                return Err(StrategyError::InsufficientBalance {
                    asset,
                    required: amount,
                    available: held,
                });
            }
            let remaining = held - amount;
            self.collateral.insert((src, asset), remaining);
            if remaining == 0 {
                self.users.entry(src).or_default().assets_in &= !(1 << info.offset);
            }
            let borrow = self.borrow_balance_of(src)?;
            if borrow > 0 {
                self.check_borrow_capacity(src, borrow)?;
            }
        }
        ledger.transfer(asset, self.config.address, to, amount)
    }

    /// USD-equivalent borrow capacity of an account's collateral.
    pub fn borrow_capacity(&self, account: Address) -> StrategyResult<u128> {
        let mut capacity: u128 = 0;
        for info in &self.asset_configs {
            let balance = self.collateral_balance_of(account, info.asset);
            if balance == 0 {
                continue;
            }
            let value = mul_price(balance, self.get_price(info.price_feed)?, info.scale)?;
            capacity = capacity
                .checked_add(mul_factor(value, info.borrow_collateral_factor)?)
                .ok_or(StrategyError::ArithmeticOverflow)?;
        }
        Ok(capacity)
    }

    fn check_borrow_capacity(&self, account: Address, borrow: u128) -> StrategyResult<()> {
        let debt = mul_price(
            borrow,
            self.get_price(self.config.base_token_price_feed)?,
            self.config.base_scale,
        )?;
        let capacity = self.borrow_capacity(account)?;
        if debt > capacity {
            return Err(StrategyError::Undercollateralized { debt, capacity });
        }
        Ok(())
    }
}
