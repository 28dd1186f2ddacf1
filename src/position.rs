//! Position accessor.
//!
//! A position is an opaque 32-byte identifier. Single-market strategies
//! encode the market handle's address directly, left-padded with zeroes;
//! the accessor decodes it and rejects anything outside the strategy's one
//! resolvable market.

use crate::errors::{StrategyError, StrategyResult};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque position identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionId(pub [u8; 32]);

impl PositionId {
    /// Identifier for a position held against `market`.
    pub fn for_market(market: Address) -> Self {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(market.as_bytes());
        PositionId(bytes)
    }

    /// Decode the encoded market address, if the identifier is well formed.
    pub fn market(&self) -> Option<Address> {
        if self.0[..12].iter().any(|b| *b != 0) {
            return None;
        }
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&self.0[12..]);
        Some(Address(addr))
    }
}

impl fmt::Debug for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Resolve a position identifier against a strategy's single market.
pub fn resolve_market(position: PositionId, supported: Address) -> StrategyResult<Address> {
    match position.market() {
        Some(market) if market == supported => Ok(market),
        _ => Err(StrategyError::UnsupportedPosition(position)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_market_encoding() {
        let market = Address::from_low_u64(0xC0FFEE);
        let position = PositionId::for_market(market);
        assert_eq!(position.market(), Some(market));
        assert_eq!(resolve_market(position, market).unwrap(), market);
    }

    #[test]
    fn rejects_foreign_market() {
        let position = PositionId::for_market(Address::from_low_u64(1));
        let err = resolve_market(position, Address::from_low_u64(2)).unwrap_err();
        assert_eq!(err, StrategyError::UnsupportedPosition(position));
    }

    #[test]
    fn rejects_nonzero_padding() {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        bytes[12..].copy_from_slice(Address::from_low_u64(1).as_bytes());
        let position = PositionId(bytes);
        assert_eq!(position.market(), None);
        assert!(matches!(
            resolve_market(position, Address::from_low_u64(1)),
            Err(StrategyError::UnsupportedPosition(_))
        ));
    }
}
