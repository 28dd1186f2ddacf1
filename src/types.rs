//! Core identifier and value types shared across the strategy layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 20-byte account or token identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

/// Sentinel address marking the chain-native asset.
///
/// Every deposit/withdraw/borrow path normalizes this to the configured
/// wrapped representation before touching an external market.
pub const NATIVE_ASSET: Address = Address([0xee; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Build an address from a low 64-bit value (big-endian in the tail).
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Address(bytes)
    }

    /// Raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this address is the native-asset sentinel.
    pub fn is_native(&self) -> bool {
        *self == NATIVE_ASSET
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A collateral or debt holding: query output only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    /// Asset identifier
    pub asset: Address,
    /// Held amount in the asset's own scale
    pub amount: u128,
}

/// Derived risk triple for a position.
///
/// `current` is the position's utilization, `max` the borrow-capacity
/// threshold, `liquidatable` the liquidation threshold. All three are
/// recomputed from market state on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtHealth {
    pub current: u128,
    pub max: u128,
    pub liquidatable: u128,
}

/// Capability tags implemented by a strategy.
///
/// Interface-support checks are a static set membership test over these
/// tags; no dynamic dispatch is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Report,
}
