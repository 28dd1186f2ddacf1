//! Strategy Error Types

use crate::position::PositionId;
use crate::types::Address;
use std::fmt;
use thiserror::Error;

/// Result type for strategy operations
pub type StrategyResult<T> = Result<T, StrategyError>;

/// Role an asset plays within a market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    /// The market's base/debt asset
    Base,
    /// A configured collateral asset
    Collateral,
}

impl fmt::Display for AssetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRole::Base => write!(f, "base"),
            AssetRole::Collateral => write!(f, "collateral"),
        }
    }
}

/// Errors that can occur in strategy operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    // Operation errors
    #[error("asset {asset} is not supported as {role} by this market")]
    UnsupportedAsset { asset: Address, role: AssetRole },

    #[error("amount {requested} out of bounds for {asset}: valid range [{min}, {max}]")]
    AmountOutOfBounds {
        asset: Address,
        requested: u128,
        min: u128,
        max: u128,
    },

    #[error("flash loan initiator {initiator} does not match caller {caller}")]
    InvalidInitiator { initiator: Address, caller: Address },

    #[error("swap failed: {0}")]
    SwapFailed(String),

    #[error("unsupported position {0}")]
    UnsupportedPosition(PositionId),

    // Arithmetic errors
    #[error("value {0} exceeds the signed range")]
    SignedOverflow(u128),

    #[error("negative value {0} cannot be converted to unsigned")]
    NegativeAmount(i128),

    #[error("negative liquidity {0} while computing debt health")]
    NegativeLiquidity(i128),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    // Token errors
    #[error("insufficient balance of {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: Address,
        required: u128,
        available: u128,
    },

    #[error(
        "insufficient allowance of {asset} from {owner} to {spender}: \
         required {required}, granted {granted}"
    )]
    InsufficientAllowance {
        asset: Address,
        owner: Address,
        spender: Address,
        required: u128,
        granted: u128,
    },

    #[error("approval for strict token {0} must be reset to zero first")]
    NonZeroApproval(Address),

    // Market errors
    #[error("unknown asset {0}")]
    UnknownAsset(Address),

    #[error("price feed {0} is not configured")]
    UnknownPriceFeed(Address),

    #[error("account would be undercollateralized: debt {debt}, borrow capacity {capacity}")]
    Undercollateralized { debt: u128, capacity: u128 },

    #[error("collateral factors {borrow} > {liquidate} violate market configuration")]
    InvalidCollateralFactors { borrow: u128, liquidate: u128 },

    #[error("asset {0} is already listed")]
    AssetAlreadyListed(Address),

    #[error("no asset configured at slot {0}")]
    UnknownAssetSlot(u8),

    #[error("all collateral asset slots are in use")]
    AssetSlotsExhausted,

    // Flash loan errors
    #[error("flash loan of {asset} not repaid: owed {owed}, available {available}")]
    LoanNotRepaid {
        asset: Address,
        owed: u128,
        available: u128,
    },

    #[error("malformed callback data: expected {expected} items, got {got}")]
    MalformedCallData { expected: usize, got: usize },

    // Router errors
    #[error("swap deadline {deadline} passed at {now}")]
    DeadlineExpired { deadline: u64, now: u64 },
}
