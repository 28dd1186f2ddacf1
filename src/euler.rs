//! Pool-style lending market model (e-token/d-token).
//!
//! Each activated underlying asset has an e-token handle for supplied
//! collateral and a d-token handle for borrowed debt, plus a collateral
//! factor expressed in basis points.

use crate::errors::{AssetRole, StrategyError, StrategyResult};
use crate::token::TokenLedger;
use crate::types::Address;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Markets registry handle shared between strategies.
pub type SharedEulerMarkets = Arc<RwLock<EulerMarkets>>;

#[derive(Debug, Clone)]
struct MarketEntry {
    etoken: Address,
    dtoken: Address,
    /// Collateral factor in basis points
    collateral_factor: u128,
    /// holder -> supplied underlying
    supplied: HashMap<Address, u128>,
    /// holder -> borrowed underlying
    borrowed: HashMap<Address, u128>,
}

/// In-process pool-style markets registry.
#[derive(Debug, Clone)]
pub struct EulerMarkets {
    address: Address,
    /// underlying -> market entry, in activation order
    underlyings: Vec<Address>,
    entries: HashMap<Address, MarketEntry>,
    /// etoken -> underlying
    by_etoken: HashMap<Address, Address>,
    /// dtoken -> underlying
    by_dtoken: HashMap<Address, Address>,
}

impl EulerMarkets {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            underlyings: Vec::new(),
            entries: HashMap::new(),
            by_etoken: HashMap::new(),
            by_dtoken: HashMap::new(),
        }
    }

    /// Wrap the registry in a shared handle.
    pub fn shared(self) -> SharedEulerMarkets {
        Arc::new(RwLock::new(self))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Activate a market for `underlying` with the given token handles.
    pub fn activate_market(
        &mut self,
        underlying: Address,
        etoken: Address,
        dtoken: Address,
        collateral_factor: u128,
    ) -> StrategyResult<()> {
        if self.entries.contains_key(&underlying) {
            return Err(StrategyError::AssetAlreadyListed(underlying));
        }
        self.underlyings.push(underlying);
        self.entries.insert(
            underlying,
            MarketEntry {
                etoken,
                dtoken,
                collateral_factor,
                supplied: HashMap::new(),
                borrowed: HashMap::new(),
            },
        );
        self.by_etoken.insert(etoken, underlying);
        self.by_dtoken.insert(dtoken, underlying);
        Ok(())
    }

    pub fn underlying_to_etoken(&self, underlying: Address) -> StrategyResult<Address> {
        self.entries
            .get(&underlying)
            .map(|entry| entry.etoken)
            .ok_or(StrategyError::UnsupportedAsset {
                asset: underlying,
                role: AssetRole::Collateral,
            })
    }

    pub fn underlying_to_dtoken(&self, underlying: Address) -> StrategyResult<Address> {
        self.entries
            .get(&underlying)
            .map(|entry| entry.dtoken)
            .ok_or(StrategyError::UnsupportedAsset {
                asset: underlying,
                role: AssetRole::Base,
            })
    }

    /// All e-token handles in activation order.
    pub fn all_etokens(&self) -> Vec<Address> {
        self.underlyings
            .iter()
            .map(|u| self.entries[u].etoken)
            .collect()
    }

    /// All d-token handles in activation order.
    pub fn all_dtokens(&self) -> Vec<Address> {
        self.underlyings
            .iter()
            .map(|u| self.entries[u].dtoken)
            .collect()
    }

    /// Collateral factor of an e-token, in basis points.
    pub fn collateral_factor(&self, etoken: Address) -> StrategyResult<u128> {
        let underlying = self.underlying_of_etoken(etoken)?;
        Ok(self.entries[&underlying].collateral_factor)
    }

    pub fn underlying_of_etoken(&self, etoken: Address) -> StrategyResult<Address> {
        self.by_etoken
            .get(&etoken)
            .copied()
            .ok_or(StrategyError::UnknownAsset(etoken))
    }

    pub fn underlying_of_dtoken(&self, dtoken: Address) -> StrategyResult<Address> {
        self.by_dtoken
            .get(&dtoken)
            .copied()
            .ok_or(StrategyError::UnknownAsset(dtoken))
    }

    /// Supplied underlying balance behind an e-token holding.
    pub fn balance_of_underlying(&self, etoken: Address, account: Address) -> StrategyResult<u128> {
        let underlying = self.underlying_of_etoken(etoken)?;
        Ok(self.entries[&underlying]
            .supplied
            .get(&account)
            .copied()
            .unwrap_or(0))
    }

    /// Outstanding debt behind a d-token holding.
    pub fn debt_balance_of(&self, dtoken: Address, account: Address) -> StrategyResult<u128> {
        let underlying = self.underlying_of_dtoken(dtoken)?;
        Ok(self.entries[&underlying]
            .borrowed
            .get(&account)
            .copied()
            .unwrap_or(0))
    }

    /// Deposit underlying against an e-token, pulling tokens from `from`
    /// and crediting `dst`.
    pub fn deposit(
        &mut self,
        ledger: &mut TokenLedger,
        etoken: Address,
        from: Address,
        dst: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        let underlying = self.underlying_of_etoken(etoken)?;
        ledger.transfer_from(underlying, self.address, from, self.address, amount)?;
        let entry = self.entries.get_mut(&underlying).expect("activated market");
        *entry.supplied.entry(dst).or_insert(0) += amount;
        Ok(())
    }

    /// Withdraw supplied underlying from `src` to `to`.
    pub fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        etoken: Address,
        src: Address,
        to: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        let underlying = self.underlying_of_etoken(etoken)?;
        let entry = self.entries.get_mut(&underlying).expect("activated market");
        let held = entry.supplied.get(&src).copied().unwrap_or(0);
        if held < amount {
            return Err(StrategyError::InsufficientBalance {
                asset: underlying,
                required: amount,
                available: held,
            });
        }
        entry.supplied.insert(src, held - amount);
        ledger.transfer(underlying, self.address, to, amount)
    }

    /// Borrow underlying against a d-token, sending tokens to `to`.
    pub fn borrow(
        &mut self,
        ledger: &mut TokenLedger,
        dtoken: Address,
        account: Address,
        to: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        let underlying = self.underlying_of_dtoken(dtoken)?;
        let entry = self.entries.get_mut(&underlying).expect("activated market");
        *entry.borrowed.entry(account).or_insert(0) += amount;
        ledger.transfer(underlying, self.address, to, amount)
    }

    /// Repay debt against a d-token, pulling tokens from `from`.
    pub fn repay(
        &mut self,
        ledger: &mut TokenLedger,
        dtoken: Address,
        from: Address,
        account: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        let underlying = self.underlying_of_dtoken(dtoken)?;
        ledger.transfer_from(underlying, self.address, from, self.address, amount)?;
        let entry = self.entries.get_mut(&underlying).expect("activated market");
        let owed = entry.borrowed.get(&account).copied().unwrap_or(0);
        entry.borrowed.insert(account, owed.saturating_sub(amount));
        Ok(())
    }
}
