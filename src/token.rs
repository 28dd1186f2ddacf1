//! Shared token ledger.
//!
//! Models the fungible-token environment the strategy layer operates in:
//! per-token balances, per-spender allowances, native-currency balances,
//! and 1:1 wrap/unwrap against a configured wrapped-native token. Markets,
//! routers and lenders all move value through one ledger, the way contracts
//! on a chain share the underlying token state.
//!
//! Tokens flagged as strict-approval reject a nonzero-to-nonzero allowance
//! change and must be reset to zero first, mirroring the approval semantics
//! some real tokens enforce.

use crate::errors::{StrategyError, StrategyResult};
use crate::types::Address;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Ledger handle shared between the strategy layer and market models.
pub type SharedLedger = Arc<RwLock<TokenLedger>>;

/// In-process model of the token environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLedger {
    /// (token, owner) -> balance
    balances: HashMap<(Address, Address), u128>,
    /// (token, owner, spender) -> remaining allowance
    allowances: HashMap<(Address, Address, Address), u128>,
    /// owner -> native balance
    native: HashMap<Address, u128>,
    /// Tokens requiring zero-then-set approval
    strict_approval: HashSet<Address>,
    /// The wrapped representation of the native asset
    wrapped_native: Address,
}

impl TokenLedger {
    /// Create a ledger with the given wrapped-native token address.
    pub fn new(wrapped_native: Address) -> Self {
        Self {
            balances: HashMap::new(),
            allowances: HashMap::new(),
            native: HashMap::new(),
            strict_approval: HashSet::new(),
            wrapped_native,
        }
    }

    /// Create a shared handle around a fresh ledger.
    pub fn shared(wrapped_native: Address) -> SharedLedger {
        Arc::new(RwLock::new(Self::new(wrapped_native)))
    }

    /// Address of the wrapped-native token.
    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    /// Mark a token as requiring zero-then-set approval.
    pub fn set_strict_approval(&mut self, token: Address) {
        self.strict_approval.insert(token);
    }

    /// Credit `amount` of `token` to `to`.
    pub fn mint(&mut self, token: Address, to: Address, amount: u128) {
        *self.balances.entry((token, to)).or_insert(0) += amount;
    }

    /// Credit native currency to `to`.
    pub fn mint_native(&mut self, to: Address, amount: u128) {
        *self.native.entry(to).or_insert(0) += amount;
    }

    /// Token balance of `owner`.
    pub fn balance_of(&self, token: Address, owner: Address) -> u128 {
        self.balances.get(&(token, owner)).copied().unwrap_or(0)
    }

    /// Native balance of `owner`.
    pub fn native_balance_of(&self, owner: Address) -> u128 {
        self.native.get(&owner).copied().unwrap_or(0)
    }

    /// Remaining allowance granted by `owner` to `spender`.
    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> u128 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    /// Set the allowance granted by `owner` to `spender`.
    ///
    /// Strict-approval tokens reject a nonzero-to-nonzero change.
    pub fn approve(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        if self.strict_approval.contains(&token)
            && amount != 0
            && self.allowance(token, owner, spender) != 0
        {
            return Err(StrategyError::NonZeroApproval(token));
        }
        self.allowances.insert((token, owner, spender), amount);
        Ok(())
    }

    /// Move tokens directly from `from` to `to`.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(StrategyError::InsufficientBalance {
                asset: token,
                required: amount,
                available,
            });
        }
        self.balances.insert((token, from), available - amount);
        *self.balances.entry((token, to)).or_insert(0) += amount;
        Ok(())
    }

    /// Move tokens from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        let granted = self.allowance(token, from, spender);
        if granted < amount {
            return Err(StrategyError::InsufficientAllowance {
                asset: token,
                owner: from,
                spender,
                required: amount,
                granted,
            });
        }
        self.transfer(token, from, to, amount)?;
        self.allowances
            .insert((token, from, spender), granted - amount);
        Ok(())
    }

    /// Move native currency from `from` to `to`.
    pub fn transfer_native(
        &mut self,
        from: Address,
        to: Address,
        amount: u128,
    ) -> StrategyResult<()> {
        let available = self.native_balance_of(from);
        if available < amount {
            return Err(StrategyError::InsufficientBalance {
                asset: crate::types::NATIVE_ASSET,
                required: amount,
                available,
            });
        }
        self.native.insert(from, available - amount);
        *self.native.entry(to).or_insert(0) += amount;
        Ok(())
    }

    /// Wrap native currency 1:1 into the wrapped token. Returns the wrapped
    /// quantity.
    pub fn wrap(&mut self, owner: Address, amount: u128) -> StrategyResult<u128> {
        let available = self.native_balance_of(owner);
        if available < amount {
            return Err(StrategyError::InsufficientBalance {
                asset: crate::types::NATIVE_ASSET,
                required: amount,
                available,
            });
        }
        self.native.insert(owner, available - amount);
        *self.balances.entry((self.wrapped_native, owner)).or_insert(0) += amount;
        Ok(amount)
    }

    /// Unwrap the wrapped token 1:1 back into native currency.
    pub fn unwrap(&mut self, owner: Address, amount: u128) -> StrategyResult<()> {
        let wrapped = self.wrapped_native;
        let available = self.balance_of(wrapped, owner);
        if available < amount {
            return Err(StrategyError::InsufficientBalance {
                asset: wrapped,
                required: amount,
                available,
            });
        }
        self.balances.insert((wrapped, owner), available - amount);
        *self.native.entry(owner).or_insert(0) += amount;
        Ok(())
    }
}
