//! Collateral/debt operations engine for comet-style markets.
//!
//! A `CometStrategy` is a stateless accessor over one comet market: it
//! resolves positions, normalizes the native asset to its wrapped
//! representation, grants exact per-call allowances, and settles every
//! operation through the market's supply/withdraw primitives. Repay
//! settles through the deposit path and borrow through the withdraw path,
//! since the comet model shares settlement mechanics between them.

use crate::comet::SharedComet;
use crate::errors::{AssetRole, StrategyError, StrategyResult};
use crate::health;
use crate::position::{self, PositionId};
use crate::registry;
use crate::token::SharedLedger;
use crate::types::{Address, AssetAmount, Capability, DebtHealth};
use tracing::debug;

/// Strategy over a single comet market.
pub struct CometStrategy {
    /// The strategy's own account, holder of custody balances
    address: Address,
    /// Wrapped representation of the native asset
    wrapped_native: Address,
    /// The one market this strategy can service
    market: Address,
    comet: SharedComet,
    ledger: SharedLedger,
}

impl CometStrategy {
    /// Capability tags implemented by this strategy.
    pub const CAPABILITIES: &'static [Capability] = &[
        Capability::Deposit,
        Capability::Withdraw,
        Capability::Borrow,
        Capability::Repay,
        Capability::Report,
    ];

    pub fn new(address: Address, comet: SharedComet, ledger: SharedLedger) -> Self {
        let market = comet.read().address();
        let wrapped_native = ledger.read().wrapped_native();
        Self {
            address,
            wrapped_native,
            market,
            comet,
            ledger,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The market this strategy services.
    pub fn market(&self) -> Address {
        self.market
    }

    /// Static set membership over the implemented capability tags.
    pub fn supports(&self, capability: Capability) -> bool {
        Self::CAPABILITIES.contains(&capability)
    }

    fn resolve(&self, position: PositionId) -> StrategyResult<Address> {
        position::resolve_market(position, self.market)
    }

    /// Translate the native marker to the wrapped asset.
    fn normalize(&self, asset: Address) -> Address {
        if asset.is_native() {
            self.wrapped_native
        } else {
            asset
        }
    }

    /// Deposit to the strategy's own account.
    pub fn deposit(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        self.deposit_to(position, asset, amount, self.address)
    }

    /// Deposit base or collateral for `beneficiary`.
    pub fn deposit_to(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
        beneficiary: Address,
    ) -> StrategyResult<()> {
        self.resolve(position)?;
        let token = self.normalize(asset);

        let mut ledger = self.ledger.write();
        let mut comet = self.comet.write();
        if token != comet.base_token() {
            registry::collateral_slot(&comet, token)?;
        }
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
        // Exact per-call allowance, reset first for strict-approval tokens.
        ledger.approve(token, self.address, self.market, 0)?;
        ledger.approve(token, self.address, self.market, amount)?;
        comet.supply_to(&mut ledger, self.address, beneficiary, token, amount)?;
        debug!(asset = %token, amount, beneficiary = %beneficiary, "supplied to market");
        Ok(())
    }

    /// Withdraw to the strategy's own account.
    pub fn withdraw(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        self.withdraw_to(position, asset, amount, self.address)
    }

    /// Withdraw base or collateral to `beneficiary`.
    ///
    /// Native withdrawals unwrap in the strategy's custody first; the
    /// native transfer is skipped entirely when the strategy itself is the
    /// beneficiary.
    pub fn withdraw_to(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
        beneficiary: Address,
    ) -> StrategyResult<()> {
        self.resolve(position)?;
        let mut ledger = self.ledger.write();
        let mut comet = self.comet.write();
        if asset.is_native() {
            comet.withdraw_to(
                &mut ledger,
                self.address,
                self.address,
                self.wrapped_native,
                amount,
            )?;
            ledger.unwrap(self.address, amount)?;
            if beneficiary != self.address {
                ledger.transfer_native(self.address, beneficiary, amount)?;
            }
        } else {
            if asset != comet.base_token() {
                registry::collateral_slot(&comet, asset)?;
            }
            comet.withdraw_to(&mut ledger, self.address, beneficiary, asset, amount)?;
        }
        debug!(asset = %asset, amount, beneficiary = %beneficiary, "withdrawn from market");
        Ok(())
    }

    /// Borrow to the strategy's own account.
    pub fn borrow(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        self.borrow_to(position, asset, amount, self.address)
    }

    /// Borrow the market's base asset for `beneficiary`.
    ///
    /// Settlement delegates to the withdraw path.
    pub fn borrow_to(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
        beneficiary: Address,
    ) -> StrategyResult<()> {
        self.resolve(position)?;
        let token = self.normalize(asset);
        {
            let comet = self.comet.read();
            if token != comet.base_token() {
                return Err(StrategyError::UnsupportedAsset {
                    asset,
                    role: AssetRole::Base,
                });
            }
            let min = comet.base_borrow_min();
            if amount < min {
                return Err(StrategyError::AmountOutOfBounds {
                    asset,
                    requested: amount,
                    min,
                    max: u128::MAX,
                });
            }
        }
        self.withdraw_to(position, asset, amount, beneficiary)
    }

    /// Repay the market's base asset from the strategy's custody.
    ///
    /// The custody balance must cover the amount; otherwise the achievable
    /// bound is the lesser of the balance and the outstanding borrow.
    /// Settlement delegates to the deposit path.
    pub fn repay(
        &self,
        position: PositionId,
        asset: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        self.resolve(position)?;
        let token = self.normalize(asset);
        {
            let ledger = self.ledger.read();
            let comet = self.comet.read();
            if token != comet.base_token() {
                return Err(StrategyError::UnsupportedAsset {
                    asset,
                    role: AssetRole::Base,
                });
            }
            let available = if asset.is_native() {
                ledger.native_balance_of(self.address)
            } else {
                ledger.balance_of(token, self.address)
            };
            if available < amount {
                let outstanding = comet.borrow_balance_of(self.address)?;
                return Err(StrategyError::AmountOutOfBounds {
                    asset,
                    requested: amount,
                    min: 0,
                    max: available.min(outstanding),
                });
            }
        }
        self.deposit(position, asset, amount)
    }

    /// Collateral holdings of the position, one entry per occupied slot.
    pub fn assets(&self, position: PositionId) -> StrategyResult<Vec<AssetAmount>> {
        self.resolve(position)?;
        let comet = self.comet.read();
        registry::held_collateral(&comet, self.address)
    }

    /// Outstanding debt of the position: empty with no open borrow.
    pub fn debt(&self, position: PositionId) -> StrategyResult<Vec<AssetAmount>> {
        self.resolve(position)?;
        let comet = self.comet.read();
        let outstanding = comet.borrow_balance_of(self.address)?;
        if outstanding == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![AssetAmount {
            asset: comet.base_token(),
            amount: outstanding,
        }])
    }

    /// Current debt health of the position, recomputed from market state.
    pub fn debt_health(&self, position: PositionId) -> StrategyResult<DebtHealth> {
        self.resolve(position)?;
        let comet = self.comet.read();
        health::comet_debt_health(&comet, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comet::{Comet, CometConfig};
    use crate::math::PRICE_SCALE;
    use crate::token::TokenLedger;
    use crate::types::NATIVE_ASSET;

    const USDC_SCALE: u128 = 1_000_000;
    const WETH_SCALE: u128 = 1_000_000_000_000_000_000;

    fn usdc() -> Address {
        Address::from_low_u64(0xA1)
    }

    fn weth() -> Address {
        Address::from_low_u64(0xE7)
    }

    fn market_address() -> Address {
        Address::from_low_u64(0xC0)
    }

    fn strategy_address() -> Address {
        Address::from_low_u64(0x51)
    }

    struct Env {
        strategy: CometStrategy,
        ledger: SharedLedger,
        comet: SharedComet,
        position: PositionId,
    }

    fn setup() -> Env {
        let mut comet = Comet::new(CometConfig {
            address: market_address(),
            base_token: usdc(),
            base_token_price_feed: Address::from_low_u64(0xF1),
            base_scale: USDC_SCALE,
            base_borrow_min: 100 * USDC_SCALE,
        });
        comet
            .add_asset(
                weth(),
                Address::from_low_u64(0xF2),
                WETH_SCALE,
                775_000_000_000_000_000,
                825_000_000_000_000_000,
            )
            .unwrap();
        comet.set_price(Address::from_low_u64(0xF1), PRICE_SCALE);
        comet.set_price(Address::from_low_u64(0xF2), 2000 * PRICE_SCALE);
        let comet = comet.shared();
        let ledger = TokenLedger::shared(weth());
        ledger
            .write()
            .mint(usdc(), market_address(), 1_000_000 * USDC_SCALE);

        let strategy = CometStrategy::new(strategy_address(), comet.clone(), ledger.clone());
        let position = PositionId::for_market(market_address());
        Env {
            strategy,
            ledger,
            comet,
            position,
        }
    }

    #[test]
    fn supports_every_capability() {
        let env = setup();
        for capability in [
            Capability::Deposit,
            Capability::Withdraw,
            Capability::Borrow,
            Capability::Repay,
            Capability::Report,
        ] {
            assert!(env.strategy.supports(capability));
        }
    }

    #[test]
    fn foreign_position_is_rejected() {
        let env = setup();
        let foreign = PositionId::for_market(Address::from_low_u64(0xBAD));
        let err = env.strategy.deposit(foreign, weth(), 1).unwrap_err();
        assert!(matches!(err, StrategyError::UnsupportedPosition(_)));
    }

    #[test]
    fn native_deposit_wraps_and_supplies() {
        let env = setup();
        env.ledger.write().mint_native(strategy_address(), WETH_SCALE);

        env.strategy
            .deposit(env.position, NATIVE_ASSET, WETH_SCALE)
            .unwrap();

        let comet = env.comet.read();
        assert_eq!(
            comet.collateral_balance_of(strategy_address(), weth()),
            WETH_SCALE
        );
        assert_eq!(env.ledger.read().native_balance_of(strategy_address()), 0);
    }

    #[test]
    fn native_round_trip_restores_beneficiary_balance() {
        let env = setup();
        env.ledger.write().mint_native(strategy_address(), WETH_SCALE);
        let before = env.ledger.read().native_balance_of(strategy_address());

        env.strategy
            .deposit(env.position, NATIVE_ASSET, WETH_SCALE)
            .unwrap();
        env.strategy
            .withdraw(env.position, NATIVE_ASSET, WETH_SCALE)
            .unwrap();

        assert_eq!(
            env.ledger.read().native_balance_of(strategy_address()),
            before
        );
    }

    #[test]
    fn native_withdraw_forwards_to_other_beneficiary() {
        let env = setup();
        let beneficiary = Address::from_low_u64(0x99);
        env.ledger.write().mint_native(strategy_address(), WETH_SCALE);
        env.strategy
            .deposit(env.position, NATIVE_ASSET, WETH_SCALE)
            .unwrap();

        env.strategy
            .withdraw_to(env.position, NATIVE_ASSET, WETH_SCALE, beneficiary)
            .unwrap();
        assert_eq!(env.ledger.read().native_balance_of(beneficiary), WETH_SCALE);
        assert_eq!(env.ledger.read().native_balance_of(strategy_address()), 0);
    }

    #[test]
    fn deposit_of_unlisted_asset_is_unsupported() {
        let env = setup();
        let stranger = Address::from_low_u64(0xBEEF);
        let err = env.strategy.deposit(env.position, stranger, 1).unwrap_err();
        assert_eq!(
            err,
            StrategyError::UnsupportedAsset {
                asset: stranger,
                role: AssetRole::Collateral,
            }
        );
    }

    #[test]
    fn deposit_survives_strict_approval_tokens() {
        let env = setup();
        env.ledger.write().set_strict_approval(weth());
        env.ledger.write().mint(weth(), strategy_address(), 2 * WETH_SCALE);

        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();
        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();
        assert_eq!(
            env.comet
                .read()
                .collateral_balance_of(strategy_address(), weth()),
            2 * WETH_SCALE
        );
    }

    #[test]
    fn borrow_of_non_base_asset_is_unsupported() {
        let env = setup();
        let err = env
            .strategy
            .borrow(env.position, weth(), 500 * USDC_SCALE)
            .unwrap_err();
        assert_eq!(
            err,
            StrategyError::UnsupportedAsset {
                asset: weth(),
                role: AssetRole::Base,
            }
        );
    }

    #[test]
    fn borrow_below_minimum_reports_the_bound() {
        let env = setup();
        env.ledger.write().mint(weth(), strategy_address(), WETH_SCALE);
        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();

        let err = env
            .strategy
            .borrow(env.position, usdc(), 50 * USDC_SCALE)
            .unwrap_err();
        assert_eq!(
            err,
            StrategyError::AmountOutOfBounds {
                asset: usdc(),
                requested: 50 * USDC_SCALE,
                min: 100 * USDC_SCALE,
                max: u128::MAX,
            }
        );
    }

    #[test]
    fn borrow_settles_through_withdraw_path() {
        let env = setup();
        env.ledger.write().mint(weth(), strategy_address(), WETH_SCALE);
        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();

        env.strategy
            .borrow(env.position, usdc(), 500 * USDC_SCALE)
            .unwrap();
        assert_eq!(
            env.ledger.read().balance_of(usdc(), strategy_address()),
            500 * USDC_SCALE
        );
        let debt = env.strategy.debt(env.position).unwrap();
        assert_eq!(debt.len(), 1);
        assert_eq!(debt[0].amount, 500 * USDC_SCALE);
    }

    #[test]
    fn repay_beyond_balance_reports_achievable_bound() {
        let env = setup();
        env.ledger.write().mint(weth(), strategy_address(), WETH_SCALE);
        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();
        env.strategy
            .borrow(env.position, usdc(), 500 * USDC_SCALE)
            .unwrap();

        // Drain custody down to 200 USDC, then try to repay 400.
        env.ledger
            .write()
            .transfer(usdc(), strategy_address(), Address::from_low_u64(0x99), 300 * USDC_SCALE)
            .unwrap();
        let err = env
            .strategy
            .repay(env.position, usdc(), 400 * USDC_SCALE)
            .unwrap_err();
        assert_eq!(
            err,
            StrategyError::AmountOutOfBounds {
                asset: usdc(),
                requested: 400 * USDC_SCALE,
                min: 0,
                max: 200 * USDC_SCALE,
            }
        );
    }

    #[test]
    fn repay_bound_is_capped_by_outstanding_borrow() {
        let env = setup();
        env.ledger.write().mint(weth(), strategy_address(), WETH_SCALE);
        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();
        env.strategy
            .borrow(env.position, usdc(), 100 * USDC_SCALE)
            .unwrap();

        // Custody holds 100 borrowed + 500 minted = 600, debt is only 100.
        env.ledger
            .write()
            .mint(usdc(), strategy_address(), 500 * USDC_SCALE);
        let err = env
            .strategy
            .repay(env.position, usdc(), 700 * USDC_SCALE)
            .unwrap_err();
        assert_eq!(
            err,
            StrategyError::AmountOutOfBounds {
                asset: usdc(),
                requested: 700 * USDC_SCALE,
                min: 0,
                max: 100 * USDC_SCALE,
            }
        );
    }

    #[test]
    fn repay_settles_through_deposit_path() {
        let env = setup();
        env.ledger.write().mint(weth(), strategy_address(), WETH_SCALE);
        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();
        env.strategy
            .borrow(env.position, usdc(), 500 * USDC_SCALE)
            .unwrap();

        env.strategy
            .repay(env.position, usdc(), 500 * USDC_SCALE)
            .unwrap();
        assert!(env.strategy.debt(env.position).unwrap().is_empty());
    }

    #[test]
    fn repay_of_non_base_asset_is_unsupported() {
        let env = setup();
        let err = env.strategy.repay(env.position, weth(), 1).unwrap_err();
        assert!(matches!(err, StrategyError::UnsupportedAsset { .. }));
    }

    #[test]
    fn assets_enumerates_only_held_slots() {
        let env = setup();
        assert!(env.strategy.assets(env.position).unwrap().is_empty());

        env.ledger.write().mint(weth(), strategy_address(), WETH_SCALE);
        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();
        let held = env.strategy.assets(env.position).unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].asset, weth());
        assert_eq!(held[0].amount, WETH_SCALE);
    }

    #[test]
    fn debt_health_tracks_borrowing() {
        let env = setup();
        env.ledger.write().mint(weth(), strategy_address(), WETH_SCALE);
        env.strategy.deposit(env.position, weth(), WETH_SCALE).unwrap();
        env.strategy
            .borrow(env.position, usdc(), 500 * USDC_SCALE)
            .unwrap();

        let health = env.strategy.debt_health(env.position).unwrap();
        assert_eq!(health.current, 500 * PRICE_SCALE);
        assert!(health.current <= health.max);
        assert!(health.max <= health.liquidatable);
    }
}
