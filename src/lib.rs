//! crossmargin: collateral/debt strategy layer
//!
//! A stateless strategy layer over external lending markets: one account
//! ("position") deposits collateral, borrows, repays, and withdraws against
//! comet-style and pool-style markets, and can swap its collateral through a
//! flash-loan-financed atomic sequence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      strategy layer                          │
//! │  ┌───────────────┐  ┌───────────────┐  ┌─────────────────┐  │
//! │  │ CometStrategy │  │ PoolStrategy  │  │ CollateralSwap  │  │
//! │  │ deposit/with- │  │ e-token/      │  │ flash-loan      │  │
//! │  │ draw/borrow/  │  │ d-token ops   │  │ swap callback   │  │
//! │  │ repay/report  │  │               │  │                 │  │
//! │  └───────┬───────┘  └───────┬───────┘  └────────┬────────┘  │
//! │          │   position · registry · health        │          │
//! ├──────────┼───────────────────┼───────────────────┼──────────┤
//! │          ▼                   ▼                   ▼          │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │          external collaborators (modeled)           │    │
//! │  │   TokenLedger · Comet · EulerMarkets ·              │    │
//! │  │   ExactInputRouter · FlashLender                    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The layer holds no state of its own between calls beyond immutable
//! configuration; all balances live with the market models, shared through
//! one token ledger.

pub mod comet;
pub mod errors;
pub mod euler;
pub mod flash;
pub mod health;
pub mod math;
pub mod pool_strategy;
pub mod position;
pub mod registry;
pub mod router;
pub mod strategy;
pub mod token;
pub mod types;

// Re-export main types
pub use comet::{AssetInfo, Comet, CometConfig, SharedComet, TotalsBasic, UserBasic};
pub use errors::{AssetRole, StrategyError, StrategyResult};
pub use euler::{EulerMarkets, SharedEulerMarkets};
pub use flash::{CollateralSwap, FlashLender, FlashLoan, SwapParams};
pub use pool_strategy::PoolStrategy;
pub use position::PositionId;
pub use registry::HeldAssets;
pub use router::{ExactInputParams, ExactInputRouter, Rate, SharedRouter};
pub use strategy::CometStrategy;
pub use token::{SharedLedger, TokenLedger};
pub use types::{Address, AssetAmount, Capability, DebtHealth, NATIVE_ASSET};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::comet::{Comet, CometConfig, SharedComet};
    pub use crate::errors::{AssetRole, StrategyError, StrategyResult};
    pub use crate::euler::EulerMarkets;
    pub use crate::flash::{CollateralSwap, FlashLender, SwapParams};
    pub use crate::pool_strategy::PoolStrategy;
    pub use crate::position::PositionId;
    pub use crate::router::{ExactInputRouter, Rate};
    pub use crate::strategy::CometStrategy;
    pub use crate::token::TokenLedger;
    pub use crate::types::{Address, AssetAmount, Capability, DebtHealth, NATIVE_ASSET};
}
