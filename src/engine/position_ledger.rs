use crate::domain::{Candle, Decimal, Side, TimeMs};
use chrono::Duration;

use super::{checked, SimulationError};

/// One open leveraged position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeveragedPosition {
    pub side: Side,
    pub entry_price: Decimal,
    /// Quote amount put at risk; lost in full on liquidation.
    pub initial_margin: Decimal,
    pub base_amount: Decimal,
    /// Notional in quote at entry (`base_amount * entry_price`).
    pub quote_amount: Decimal,
    pub liquidation_price: Decimal,
    pub open_time: TimeMs,
    /// None until the first rollover fee has been charged.
    pub last_rollover_fee_paid: Option<TimeMs>,
}

impl LeveragedPosition {
    /// Open a position at `entry_price`, deriving margin and liquidation price from `leverage`.
    pub fn open(
        side: Side,
        entry_price: Decimal,
        base_amount: Decimal,
        leverage: Decimal,
        open_time: TimeMs,
    ) -> Result<Self, SimulationError> {
        let quote_amount = checked(base_amount.checked_mul(entry_price), "position notional")?;
        let initial_margin = quote_amount
            .checked_div(leverage)
            .ok_or_else(|| SimulationError::InvalidConfig("leverage is zero".to_string()))?;
        Ok(Self {
            side,
            entry_price,
            initial_margin,
            base_amount,
            quote_amount,
            liquidation_price: liquidation_price(side, entry_price, leverage)?,
            open_time,
            last_rollover_fee_paid: None,
        })
    }

    /// Borrowed part of the notional; rollover fees are charged on it.
    pub fn borrowed_amount(&self) -> Decimal {
        self.quote_amount - self.initial_margin
    }

    /// When the next rollover fee falls due.
    pub fn next_rollover_payment(&self, rollover_period: Duration) -> TimeMs {
        self.last_rollover_fee_paid
            .unwrap_or(self.open_time)
            .saturating_add(rollover_period)
    }

    /// Whether this candle's range reaches the liquidation price.
    pub fn is_liquidated_by(&self, candle: &Candle) -> bool {
        match self.side {
            Side::Buy => candle.low <= self.liquidation_price,
            Side::Sell => candle.high >= self.liquidation_price,
        }
    }

    /// Profit if the position were closed at `price`.
    pub fn profit_at(&self, price: Decimal) -> Result<Decimal, SimulationError> {
        let value = checked(self.base_amount.checked_mul(price), "position value")?;
        let profit = match self.side {
            Side::Buy => value.checked_sub(self.quote_amount),
            Side::Sell => self.quote_amount.checked_sub(value),
        };
        checked(profit, "position profit")
    }
}

/// `entry * (1 - 1/leverage)` for longs, `entry * (1 + 1/leverage)` for shorts.
pub fn liquidation_price(
    side: Side,
    entry_price: Decimal,
    leverage: Decimal,
) -> Result<Decimal, SimulationError> {
    let margin_ratio = Decimal::one()
        .checked_div(leverage)
        .ok_or_else(|| SimulationError::InvalidConfig("leverage is zero".to_string()))?;
    let factor = match side {
        Side::Buy => Decimal::one() - margin_ratio,
        Side::Sell => Decimal::one() + margin_ratio,
    };
    checked(entry_price.checked_mul(factor), "liquidation price")
}

/// What one candle did to the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandleEffects {
    /// Sum of rollover fees charged on this candle (quote).
    pub rollover_fee_charged: Decimal,
    /// Positions removed because the candle crossed their liquidation price.
    pub liquidated: Vec<LeveragedPosition>,
}

/// Open leveraged positions of a single simulation run.
#[derive(Debug, Default)]
pub struct PositionLedger {
    positions: Vec<LeveragedPosition>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
        }
    }

    pub fn add_position(&mut self, position: LeveragedPosition) {
        self.positions.push(position);
    }

    pub fn positions(&self) -> &[LeveragedPosition] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Charge rollover fees due within `(prev_candle_time, candle.open_time]`, then
    /// remove and return every position the candle liquidates.
    ///
    /// Fees are charged before the liquidation check, so a position can pay a fee
    /// and be liquidated on the same candle.
    pub fn apply_candle(
        &mut self,
        candle: &Candle,
        prev_candle_time: TimeMs,
        side: Side,
        rollover_fee: Decimal,
        rollover_period: Duration,
    ) -> Result<CandleEffects, SimulationError> {
        if let Some(position) = self.positions.iter().find(|p| p.side != side) {
            return Err(SimulationError::Invariant(format!(
                "ledger holds a {} position opened at {} while applying {} side",
                position.side, position.open_time, side
            )));
        }

        let mut effects = CandleEffects::default();

        if !rollover_fee.is_zero() {
            for position in self.positions.iter_mut() {
                let due = position.next_rollover_payment(rollover_period);
                if prev_candle_time < due && due <= candle.open_time {
                    let fee = checked(
                        position.borrowed_amount().checked_mul(rollover_fee),
                        "rollover fee",
                    )?;
                    position.last_rollover_fee_paid = Some(due);
                    effects.rollover_fee_charged =
                        checked(effects.rollover_fee_charged.checked_add(fee), "rollover fee")?;
                }
            }
        }

        // Collect first, remove after the scan.
        let liquidated_idx: Vec<usize> = self
            .positions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_liquidated_by(candle))
            .map(|(i, _)| i)
            .collect();

        for idx in liquidated_idx.into_iter().rev() {
            effects.liquidated.push(self.positions.remove(idx));
        }
        effects.liquidated.reverse();

        Ok(effects)
    }

    /// Drain the remaining open positions, in opening order.
    pub fn into_positions(self) -> Vec<LeveragedPosition> {
        self.positions
    }
}
