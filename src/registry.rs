//! Asset registry adapter.
//!
//! Per-market lookup of asset handles and their risk parameters, plus the
//! held-asset enumeration over a position's `assets_in` bitmask.

use crate::comet::{AssetInfo, Comet};
use crate::errors::{AssetRole, StrategyError, StrategyResult};
use crate::types::{Address, AssetAmount};

/// Lazy enumeration of occupied collateral slots.
///
/// Finds the first set bit, clears it, and yields the slot offset;
/// terminates when the mask reaches zero. Finite and non-restartable: a
/// consumed iterator yields nothing further.
#[derive(Debug, Clone)]
pub struct HeldAssets {
    mask: u16,
}

impl HeldAssets {
    pub fn new(mask: u16) -> Self {
        Self { mask }
    }
}

impl Iterator for HeldAssets {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.mask == 0 {
            return None;
        }
        let offset = self.mask.trailing_zeros() as u8;
        self.mask &= !(1 << offset);
        Some(offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.mask.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for HeldAssets {}

/// Risk parameters of a configured collateral asset, or `UnsupportedAsset`
/// when the market does not list it in that role.
pub fn collateral_slot(comet: &Comet, asset: Address) -> StrategyResult<AssetInfo> {
    comet
        .get_asset_info_by_address(asset)
        .ok_or(StrategyError::UnsupportedAsset {
            asset,
            role: AssetRole::Collateral,
        })
}

/// All collateral holdings of `account`, sized to the exact count of
/// occupied slots. A market with nothing held produces an empty vector.
pub fn held_collateral(comet: &Comet, account: Address) -> StrategyResult<Vec<AssetAmount>> {
    let mask = comet.user_basic(account).assets_in;
    let slots = HeldAssets::new(mask);
    let mut held = Vec::with_capacity(slots.len());
    for offset in slots {
        let info = comet.get_asset_info(offset)?;
        held.push(AssetAmount {
            asset: info.asset,
            amount: comet.collateral_balance_of(account, info.asset),
        });
    }
    Ok(held)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comet::CometConfig;
    use crate::math::{FACTOR_SCALE, PRICE_SCALE};
    use crate::token::TokenLedger;

    #[test]
    fn held_assets_walks_set_bits_in_order() {
        let offsets: Vec<u8> = HeldAssets::new(0b1010_0110).collect();
        assert_eq!(offsets, vec![1, 2, 5, 7]);
    }

    #[test]
    fn held_assets_is_empty_for_zero_mask() {
        assert_eq!(HeldAssets::new(0).count(), 0);
    }

    #[test]
    fn held_assets_len_matches_popcount() {
        let slots = HeldAssets::new(0b1111);
        assert_eq!(slots.len(), 4);
    }

    #[test]
    fn held_assets_is_not_restartable() {
        let mut slots = HeldAssets::new(0b1);
        assert_eq!(slots.next(), Some(0));
        assert_eq!(slots.next(), None);
        assert_eq!(slots.next(), None);
    }

    fn two_asset_market() -> (Comet, Address, Address) {
        let market = Address::from_low_u64(0xC0);
        let wbtc = Address::from_low_u64(0xA3);
        let weth = Address::from_low_u64(0xA2);
        let mut comet = Comet::new(CometConfig {
            address: market,
            base_token: Address::from_low_u64(0xA1),
            base_token_price_feed: Address::from_low_u64(0xF1),
            base_scale: 1_000_000,
            base_borrow_min: 0,
        });
        comet
            .add_asset(
                weth,
                Address::from_low_u64(0xF2),
                1_000_000_000_000_000_000,
                7 * FACTOR_SCALE / 10,
                8 * FACTOR_SCALE / 10,
            )
            .unwrap();
        comet
            .add_asset(
                wbtc,
                Address::from_low_u64(0xF3),
                100_000_000,
                6 * FACTOR_SCALE / 10,
                7 * FACTOR_SCALE / 10,
            )
            .unwrap();
        comet.set_price(Address::from_low_u64(0xF1), PRICE_SCALE);
        comet.set_price(Address::from_low_u64(0xF2), 2000 * PRICE_SCALE);
        comet.set_price(Address::from_low_u64(0xF3), 60_000 * PRICE_SCALE);
        (comet, weth, wbtc)
    }

    #[test]
    fn collateral_slot_rejects_unlisted_asset() {
        let (comet, _, _) = two_asset_market();
        let stranger = Address::from_low_u64(0xDEAD);
        let err = collateral_slot(&comet, stranger).unwrap_err();
        assert_eq!(
            err,
            StrategyError::UnsupportedAsset {
                asset: stranger,
                role: AssetRole::Collateral,
            }
        );
    }

    #[test]
    fn held_collateral_counts_only_occupied_slots() {
        let (mut comet, _weth, wbtc) = two_asset_market();
        let account = Address::from_low_u64(0x10);
        let mut ledger = TokenLedger::new(Address::from_low_u64(0xE7));
        ledger.mint(wbtc, account, 100_000_000);
        ledger
            .approve(wbtc, account, comet.address(), 100_000_000)
            .unwrap();
        comet
            .supply_to(&mut ledger, account, account, wbtc, 100_000_000)
            .unwrap();

        let held = held_collateral(&comet, account).unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].asset, wbtc);
        assert_eq!(held[0].amount, 100_000_000);
    }

    #[test]
    fn held_collateral_is_empty_for_untouched_account() {
        let (comet, _, _) = two_asset_market();
        let held = held_collateral(&comet, Address::from_low_u64(0x99)).unwrap();
        assert!(held.is_empty());
    }
}
