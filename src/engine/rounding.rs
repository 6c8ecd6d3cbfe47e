//! Order-size rounding to exchange lot sizes.

use crate::domain::Decimal;
use rust_decimal::RoundingStrategy;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundingError {
    #[error("lot size must be positive, got {0}")]
    InvalidStep(Decimal),
    #[error("size {0} is below the minimum order size {1}")]
    BelowMinimum(Decimal, Decimal),
    #[error("rounding failed: {0}")]
    Other(String),
}

/// Turns an intended order size (in base units) into an exchange-compliant size.
pub trait SizeRounder {
    fn round(&self, size: Decimal) -> Result<Decimal, RoundingError>;
}

/// Plain functions and closures are infallible rounders.
impl<F> SizeRounder for F
where
    F: Fn(Decimal) -> Decimal,
{
    fn round(&self, size: Decimal) -> Result<Decimal, RoundingError> {
        Ok(self(size))
    }
}

/// Rounds to a multiple of a fixed lot size.
#[derive(Debug, Clone, Copy)]
pub struct StepRounder {
    step: Decimal,
    strategy: RoundingStrategy,
    min_size: Option<Decimal>,
}

impl StepRounder {
    /// Rounds half away from zero to the nearest lot.
    pub fn new(step: Decimal) -> Result<Self, RoundingError> {
        if !step.is_positive() {
            return Err(RoundingError::InvalidStep(step));
        }
        Ok(Self {
            step,
            strategy: RoundingStrategy::MidpointAwayFromZero,
            min_size: None,
        })
    }

    /// Always rounds down to a whole lot.
    pub fn floor(step: Decimal) -> Result<Self, RoundingError> {
        Ok(Self {
            strategy: RoundingStrategy::ToZero,
            ..Self::new(step)?
        })
    }

    pub fn with_min_size(mut self, min_size: Decimal) -> Self {
        self.min_size = Some(min_size);
        self
    }

    pub fn step(&self) -> Decimal {
        self.step
    }
}

impl SizeRounder for StepRounder {
    fn round(&self, size: Decimal) -> Result<Decimal, RoundingError> {
        let rounded = size
            .round_to_step(self.step, self.strategy)
            .ok_or_else(|| RoundingError::Other(format!("cannot round {} to {}", size, self.step)))?;
        match self.min_size {
            Some(min) if rounded < min => Err(RoundingError::BelowMinimum(rounded, min)),
            _ => Ok(rounded),
        }
    }
}
