//! Pure computation engine for L-DCA replays.
//!
//! Synchronous and side-effect free apart from logging: every call owns its
//! own [`PositionLedger`], so simulations can run concurrently.

use crate::domain::Decimal;
use thiserror::Error;

pub mod ldca;
pub mod position_ledger;
pub mod rounding;

pub use ldca::{
    simulate, validate_candles, LdcaResult, SellSizeMode, SimulatedOrder, SimulationParams,
};
pub use position_ledger::{liquidation_price, CandleEffects, LeveragedPosition, PositionLedger};
pub use rounding::{RoundingError, SizeRounder, StepRounder};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),
    /// No order was ever filled, so averages and profit ratios are undefined.
    #[error("no orders were placed during the simulation")]
    NoOrdersPlaced,
    #[error("order size rounding failed: {0}")]
    Rounding(#[from] RoundingError),
    #[error("simulation invariant violated: {0}")]
    Invariant(String),
    #[error("arithmetic overflow computing {0}")]
    Overflow(String),
}

/// Turn a checked arithmetic result into a [`SimulationError::Overflow`].
pub(crate) fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal, SimulationError> {
    value.ok_or_else(|| SimulationError::Overflow(what.to_string()))
}
