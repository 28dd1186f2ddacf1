//! Collateral/debt operations engine for pool-style markets.
//!
//! A `PoolStrategy` services one collateral/debt underlying pair through a
//! pool-style markets registry: deposits and withdrawals settle against
//! the pair's e-token, borrows and repays against its d-token. Native
//! normalization, beneficiary redirection and the error taxonomy match the
//! comet engine.

use crate::errors::{AssetRole, StrategyError, StrategyResult};
use crate::euler::SharedEulerMarkets;
use crate::health;
use crate::position::{self, PositionId};
use crate::token::SharedLedger;
use crate::types::{Address, AssetAmount, Capability, DebtHealth};
use tracing::debug;

/// Strategy over one collateral/debt pair in a pool-style registry.
pub struct PoolStrategy {
    address: Address,
    wrapped_native: Address,
    /// The registry this strategy can service
    registry: Address,
    /// Underlying deposited as collateral
    collateral_asset: Address,
    /// Underlying borrowed as debt
    debt_asset: Address,
    markets: SharedEulerMarkets,
    ledger: SharedLedger,
}

impl PoolStrategy {
    pub const CAPABILITIES: &'static [Capability] = &[
        Capability::Deposit,
        Capability::Withdraw,
        Capability::Borrow,
        Capability::Repay,
        Capability::Report,
    ];

    pub fn new(
        address: Address,
        markets: SharedEulerMarkets,
        ledger: SharedLedger,
        collateral_asset: Address,
        debt_asset: Address,
    ) -> Self {
        let registry = markets.read().address();
        let wrapped_native = ledger.read().wrapped_native();
        Self {
            address,
            wrapped_native,
            registry,
            collateral_asset,
            debt_asset,
            markets,
            ledger,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn supports(&self, capability: Capability) -> bool {
        Self::CAPABILITIES.contains(&capability)
    }

    fn resolve(&self, position: PositionId) -> StrategyResult<Address> {
        position::resolve_market(position, self.registry)
    }

    fn normalize(&self, asset: Address) -> Address {
        if asset.is_native() {
            self.wrapped_native
        } else {
            asset
        }
    }

    pub fn deposit(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        self.deposit_to(position, asset, amount, self.address)
    }

    /// Deposit the pair's collateral underlying for `beneficiary`.
    pub fn deposit_to(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
        beneficiary: Address,
    ) -> StrategyResult<()> {
        self.resolve(position)?;
        let token = self.normalize(asset);
        if token != self.collateral_asset {
            return Err(StrategyError::UnsupportedAsset {
                asset,
                role: AssetRole::Collateral,
            });
        }
        let mut ledger = self.ledger.write();
        let mut markets = self.markets.write();
        let etoken = markets.underlying_to_etoken(token)?;
        if asset.is_native() {
            let wrapped = ledger.wrap(self.address, amount)?;
            if wrapped != amount {
                return Err(StrategyError::AmountOutOfBounds {
                    asset,
                    requested: amount,
                    min: wrapped,
                    max: wrapped,
                });
            }
        }
        ledger.approve(token, self.address, self.registry, 0)?;
        ledger.approve(token, self.address, self.registry, amount)?;
        markets.deposit(&mut ledger, etoken, self.address, beneficiary, amount)?;
        debug!(asset = %token, amount, beneficiary = %beneficiary, "deposited against e-token");
        Ok(())
    }

    pub fn withdraw(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        self.withdraw_to(position, asset, amount, self.address)
    }

    /// Withdraw the pair's collateral underlying to `beneficiary`.
    pub fn withdraw_to(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
        beneficiary: Address,
    ) -> StrategyResult<()> {
        self.resolve(position)?;
        let token = self.normalize(asset);
        if token != self.collateral_asset {
            return Err(StrategyError::UnsupportedAsset {
                asset,
                role: AssetRole::Collateral,
            });
        }
        let mut ledger = self.ledger.write();
        let mut markets = self.markets.write();
        let etoken = markets.underlying_to_etoken(token)?;
        if asset.is_native() {
            markets.withdraw(&mut ledger, etoken, self.address, self.address, amount)?;
            ledger.unwrap(self.address, amount)?;
            if beneficiary != self.address {
                ledger.transfer_native(self.address, beneficiary, amount)?;
            }
        } else {
            markets.withdraw(&mut ledger, etoken, self.address, beneficiary, amount)?;
        }
        debug!(asset = %asset, amount, beneficiary = %beneficiary, "withdrawn against e-token");
        Ok(())
    }

    pub fn borrow(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        self.borrow_to(position, asset, amount, self.address)
    }

    /// Borrow the pair's debt underlying for `beneficiary`.
    pub fn borrow_to(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
        beneficiary: Address,
    ) -> StrategyResult<()> {
        self.resolve(position)?;
        let token = self.normalize(asset);
        if token != self.debt_asset {
            return Err(StrategyError::UnsupportedAsset {
                asset,
                role: AssetRole::Base,
            });
        }
        let mut ledger = self.ledger.write();
        let mut markets = self.markets.write();
        let dtoken = markets.underlying_to_dtoken(token)?;
        if asset.is_native() {
            markets.borrow(&mut ledger, dtoken, self.address, self.address, amount)?;
            ledger.unwrap(self.address, amount)?;
            if beneficiary != self.address {
                ledger.transfer_native(self.address, beneficiary, amount)?;
            }
        } else {
            markets.borrow(&mut ledger, dtoken, self.address, beneficiary, amount)?;
        }
        debug!(asset = %asset, amount, beneficiary = %beneficiary, "borrowed against d-token");
        Ok(())
    }

    /// Repay the pair's debt underlying from the strategy's custody.
    pub fn repay(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        self.resolve(position)?;
        let token = self.normalize(asset);
        if token != self.debt_asset {
            return Err(StrategyError::UnsupportedAsset {
                asset,
                role: AssetRole::Base,
            });
        }
        let mut ledger = self.ledger.write();
        let mut markets = self.markets.write();
        let dtoken = markets.underlying_to_dtoken(token)?;
        let available = if asset.is_native() {
            ledger.native_balance_of(self.address)
        } else {
            ledger.balance_of(token, self.address)
        };
        if available < amount {
            let outstanding = markets.debt_balance_of(dtoken, self.address)?;
            return Err(StrategyError::AmountOutOfBounds {
                asset,
                requested: amount,
                min: 0,
                max: available.min(outstanding),
            });
        }
        if asset.is_native() {
            ledger.wrap(self.address, amount)?;
        }
        ledger.approve(token, self.address, self.registry, 0)?;
        ledger.approve(token, self.address, self.registry, amount)?;
        markets.repay(&mut ledger, dtoken, self.address, self.address, amount)?;
        debug!(asset = %token, amount, "repaid against d-token");
        Ok(())
    }

    /// Collateral holdings: one entry per e-token with a non-zero balance.
    pub fn assets(&self, position: PositionId) -> StrategyResult<Vec<AssetAmount>> {
        self.resolve(position)?;
        let markets = self.markets.read();
        let mut held = Vec::new();
        for etoken in markets.all_etokens() {
            let amount = markets.balance_of_underlying(etoken, self.address)?;
            if amount > 0 {
                held.push(AssetAmount {
                    asset: markets.underlying_of_etoken(etoken)?,
                    amount,
                });
            }
        }
        Ok(held)
    }

    /// Outstanding debts: one entry per d-token with a non-zero balance.
    pub fn debt(&self, position: PositionId) -> StrategyResult<Vec<AssetAmount>> {
        self.resolve(position)?;
        let markets = self.markets.read();
        let mut owed = Vec::new();
        for dtoken in markets.all_dtokens() {
            let amount = markets.debt_balance_of(dtoken, self.address)?;
            if amount > 0 {
                owed.push(AssetAmount {
                    asset: markets.underlying_of_dtoken(dtoken)?,
                    amount,
                });
            }
        }
        Ok(owed)
    }

    /// Debt health of the configured pair only.
    pub fn debt_health(&self, position: PositionId) -> StrategyResult<DebtHealth> {
        self.resolve(position)?;
        let markets = self.markets.read();
        let etoken = markets.underlying_to_etoken(self.collateral_asset)?;
        let dtoken = markets.underlying_to_dtoken(self.debt_asset)?;
        let collateral = markets.balance_of_underlying(etoken, self.address)?;
        let debt = markets.debt_balance_of(dtoken, self.address)?;
        let factor = markets.collateral_factor(etoken)?;
        Ok(health::pair_debt_health(collateral, debt, factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::euler::EulerMarkets;
    use crate::token::TokenLedger;
    use crate::types::NATIVE_ASSET;

    const DAI_SCALE: u128 = 1_000_000_000_000_000_000;

    fn weth() -> Address {
        Address::from_low_u64(0xE7)
    }

    fn dai() -> Address {
        Address::from_low_u64(0xA4)
    }

    fn registry_address() -> Address {
        Address::from_low_u64(0xB0)
    }

    fn strategy_address() -> Address {
        Address::from_low_u64(0x52)
    }

    struct Env {
        strategy: PoolStrategy,
        ledger: SharedLedger,
        markets: SharedEulerMarkets,
        position: PositionId,
    }

    fn setup() -> Env {
        let mut markets = EulerMarkets::new(registry_address());
        markets
            .activate_market(
                weth(),
                Address::from_low_u64(0xE1),
                Address::from_low_u64(0xD1),
                7500,
            )
            .unwrap();
        markets
            .activate_market(
                dai(),
                Address::from_low_u64(0xE2),
                Address::from_low_u64(0xD2),
                8000,
            )
            .unwrap();
        let markets = markets.shared();
        let ledger = TokenLedger::shared(weth());
        // Registry reserves to lend out.
        ledger
            .write()
            .mint(dai(), registry_address(), 1_000_000 * DAI_SCALE);

        let strategy = PoolStrategy::new(
            strategy_address(),
            markets.clone(),
            ledger.clone(),
            weth(),
            dai(),
        );
        let position = PositionId::for_market(registry_address());
        Env {
            strategy,
            ledger,
            markets,
            position,
        }
    }

    #[test]
    fn native_deposit_round_trip() {
        let env = setup();
        env.ledger.write().mint_native(strategy_address(), 10 * DAI_SCALE);

        env.strategy
            .deposit(env.position, NATIVE_ASSET, 10 * DAI_SCALE)
            .unwrap();
        assert_eq!(env.ledger.read().native_balance_of(strategy_address()), 0);

        env.strategy
            .withdraw(env.position, NATIVE_ASSET, 10 * DAI_SCALE)
            .unwrap();
        assert_eq!(
            env.ledger.read().native_balance_of(strategy_address()),
            10 * DAI_SCALE
        );
    }

    #[test]
    fn deposit_outside_the_pair_is_unsupported() {
        let env = setup();
        let err = env.strategy.deposit(env.position, dai(), 1).unwrap_err();
        assert_eq!(
            err,
            StrategyError::UnsupportedAsset {
                asset: dai(),
                role: AssetRole::Collateral,
            }
        );
    }

    #[test]
    fn borrow_outside_the_pair_is_unsupported() {
        let env = setup();
        let err = env.strategy.borrow(env.position, weth(), 1).unwrap_err();
        assert_eq!(
            err,
            StrategyError::UnsupportedAsset {
                asset: weth(),
                role: AssetRole::Base,
            }
        );
    }

    #[test]
    fn borrow_and_repay_settle_against_the_dtoken() {
        let env = setup();
        env.strategy
            .borrow(env.position, dai(), 100 * DAI_SCALE)
            .unwrap();
        assert_eq!(
            env.ledger.read().balance_of(dai(), strategy_address()),
            100 * DAI_SCALE
        );
        let debt = env.strategy.debt(env.position).unwrap();
        assert_eq!(debt.len(), 1);
        assert_eq!(debt[0].asset, dai());

        env.strategy
            .repay(env.position, dai(), 100 * DAI_SCALE)
            .unwrap();
        assert!(env.strategy.debt(env.position).unwrap().is_empty());
    }

    #[test]
    fn repay_beyond_custody_reports_achievable_bound() {
        let env = setup();
        env.strategy
            .borrow(env.position, dai(), 100 * DAI_SCALE)
            .unwrap();
        env.ledger
            .write()
            .transfer(dai(), strategy_address(), Address::from_low_u64(0x99), 60 * DAI_SCALE)
            .unwrap();

        let err = env
            .strategy
            .repay(env.position, dai(), 100 * DAI_SCALE)
            .unwrap_err();
        assert_eq!(
            err,
            StrategyError::AmountOutOfBounds {
                asset: dai(),
                requested: 100 * DAI_SCALE,
                min: 0,
                max: 40 * DAI_SCALE,
            }
        );
    }

    #[test]
    fn assets_lists_only_nonzero_etoken_balances() {
        let env = setup();
        assert!(env.strategy.assets(env.position).unwrap().is_empty());

        env.ledger
            .write()
            .mint(weth(), strategy_address(), 5 * DAI_SCALE);
        env.strategy
            .deposit(env.position, weth(), 5 * DAI_SCALE)
            .unwrap();

        let held = env.strategy.assets(env.position).unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].asset, weth());
        assert_eq!(held[0].amount, 5 * DAI_SCALE);
    }

    #[test]
    fn debt_health_uses_the_pair_factor() {
        let env = setup();
        env.ledger
            .write()
            .mint(weth(), strategy_address(), 1000);
        env.strategy.deposit(env.position, weth(), 1000).unwrap();
        env.strategy.borrow(env.position, dai(), 500).unwrap();

        let health = env.strategy.debt_health(env.position).unwrap();
        assert_eq!(health.current, 5000);
        assert_eq!(health.max, 7500);
        assert_eq!(health.liquidatable, 6375);

        let markets = env.markets.read();
        let etoken = markets.underlying_to_etoken(weth()).unwrap();
        assert_eq!(markets.collateral_factor(etoken).unwrap(), health.max);
    }
}
