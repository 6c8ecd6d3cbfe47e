use crate::domain::decimal::exact;
use crate::domain::{Candle, Decimal, Side, Symbol, SymbolPair, TimeMs};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::position_ledger::{LeveragedPosition, PositionLedger};
use super::rounding::SizeRounder;
use super::{checked, SimulationError};

/// How `quote_size` is turned into a base size for spot sell orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellSizeMode {
    /// `quote_size` is taken as the base amount to sell.
    #[default]
    QuoteAsBase,
    /// `quote_size / price`, mirroring the buy side.
    Convert,
}

/// Inputs of one simulation run, besides the candles and the rounder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub symbol_pair: SymbolPair,
    pub side: Side,
    /// Fee ratio per order, e.g. 0.001 for 0.1%.
    pub trade_fee: Decimal,
    /// Order size in quote (see [`SellSizeMode`] for spot sells).
    pub quote_size: Decimal,
    #[serde(with = "duration_ms")]
    pub period: Duration,
    /// 1 means spot, anything above opens leveraged positions.
    pub leverage: Decimal,
    /// Fee ratio on the borrowed amount per rollover period.
    pub rollover_fee: Decimal,
    #[serde(with = "duration_ms")]
    pub rollover_period: Duration,
    #[serde(default)]
    pub sell_size_mode: SellSizeMode,
}

impl SimulationParams {
    /// Spot buy with no rollover; tweak fields from there.
    pub fn spot(symbol_pair: SymbolPair, quote_size: Decimal, period: Duration) -> Self {
        Self {
            symbol_pair,
            side: Side::Buy,
            trade_fee: Decimal::zero(),
            quote_size,
            period,
            leverage: Decimal::one(),
            rollover_fee: Decimal::zero(),
            rollover_period: Duration::hours(4),
            sell_size_mode: SellSizeMode::default(),
        }
    }

    pub fn is_leveraged(&self) -> bool {
        self.leverage > Decimal::one()
    }

    /// Reject parameters the engine cannot run with.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.leverage < Decimal::one() {
            return Err(invalid(format!("leverage must be >= 1, got {}", self.leverage)));
        }
        if self.period <= Duration::zero() {
            return Err(invalid("order period must be positive".to_string()));
        }
        if !self.quote_size.is_positive() {
            return Err(invalid(format!("quote size must be positive, got {}", self.quote_size)));
        }
        if self.trade_fee.is_negative() {
            return Err(invalid(format!("trade fee must be >= 0, got {}", self.trade_fee)));
        }
        if self.rollover_fee.is_negative() {
            return Err(invalid(format!(
                "rollover fee must be >= 0, got {}",
                self.rollover_fee
            )));
        }
        if !self.rollover_fee.is_zero() && self.rollover_period <= Duration::zero() {
            return Err(invalid("rollover period must be positive".to_string()));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> SimulationError {
    SimulationError::InvalidConfig(msg)
}

/// Candles must be non-empty, strictly ascending and priced above zero.
pub fn validate_candles(candles: &[Candle]) -> Result<(), SimulationError> {
    if candles.is_empty() {
        return Err(invalid("candle series is empty".to_string()));
    }
    for (i, candle) in candles.iter().enumerate() {
        if !candle.open.is_positive() || !candle.close.is_positive() || !candle.low.is_positive() {
            return Err(invalid(format!(
                "candle {} at {} has a non-positive price",
                i, candle.open_time
            )));
        }
        if i > 0 && candle.open_time <= candles[i - 1].open_time {
            return Err(invalid(format!(
                "candle {} at {} is not after the previous candle",
                i, candle.open_time
            )));
        }
    }
    Ok(())
}

/// Summary of a finished run. Built once, never mutated.
///
/// Decimal fields serialize as exact strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdcaResult {
    #[serde(with = "exact")]
    pub final_price: Decimal,
    #[serde(with = "exact")]
    pub final_base_balance: Decimal,
    #[serde(with = "exact")]
    pub final_quote_balance: Decimal,
    #[serde(with = "exact")]
    pub total_trade_fees: Decimal,
    pub fee_symbol: Symbol,
    #[serde(with = "exact")]
    pub average_order_price: Decimal,
    /// Mark-to-market value; for leveraged runs the equity after closing everything.
    #[serde(with = "exact")]
    pub total_value: Decimal,
    #[serde(with = "exact")]
    pub total_invested_amount: Decimal,
    #[serde(with = "exact")]
    pub profit_percent: Decimal,
    #[serde(with = "exact")]
    pub total_rollover_fees: Decimal,
    /// Every simulated order, in placement order.
    pub orders: Vec<SimulatedOrder>,
    pub positions_liquidated: usize,
    /// Positions closed at the final price rather than liquidated.
    pub positions_closed_at_end: usize,
}

impl LdcaResult {
    pub fn orders_placed(&self) -> usize {
        self.orders.len()
    }
}

/// One simulated order fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedOrder {
    pub time: TimeMs,
    #[serde(with = "exact")]
    pub price: Decimal,
    #[serde(with = "exact")]
    pub base_amount: Decimal,
    #[serde(with = "exact")]
    pub quote_amount: Decimal,
    /// In base for spot buys, in quote otherwise.
    #[serde(with = "exact")]
    pub fee: Decimal,
}

#[derive(Debug)]
struct SimulationState {
    base_balance: Decimal,
    quote_balance: Decimal,
    trade_fees: Decimal,
    rollover_fees: Decimal,
    total_initial_margin: Decimal,
    base_traded: Decimal,
    quote_traded: Decimal,
    next_order_time: TimeMs,
    orders: Vec<SimulatedOrder>,
    positions_liquidated: usize,
    ledger: PositionLedger,
}

impl SimulationState {
    fn new() -> Self {
        Self {
            base_balance: Decimal::zero(),
            quote_balance: Decimal::zero(),
            trade_fees: Decimal::zero(),
            rollover_fees: Decimal::zero(),
            total_initial_margin: Decimal::zero(),
            base_traded: Decimal::zero(),
            quote_traded: Decimal::zero(),
            next_order_time: TimeMs::MIN,
            orders: Vec::new(),
            positions_liquidated: 0,
            ledger: PositionLedger::new(),
        }
    }
}

/// Replay `candles`, placing one simulated order every `params.period`.
///
/// Orders fill at the candle mid price. In leveraged mode every candle first
/// goes through the position ledger (rollover fees, then liquidations) before
/// a new position may be opened on it. Open positions are closed at the last
/// close when the series ends.
pub fn simulate<R: SizeRounder + ?Sized>(
    candles: &[Candle],
    rounder: &R,
    params: &SimulationParams,
) -> Result<LdcaResult, SimulationError> {
    params.validate()?;
    validate_candles(candles)?;

    let leveraged = params.is_leveraged();
    let mut state = SimulationState::new();
    let mut prev_candle_time = TimeMs::MIN;

    info!(
        pair = %params.symbol_pair,
        side = %params.side,
        candles = candles.len(),
        quote_size = %params.quote_size,
        leverage = %params.leverage,
        period_ms = params.period.num_milliseconds(),
        "Starting L-DCA simulation"
    );

    for candle in candles {
        if leveraged {
            apply_ledger(&mut state, candle, prev_candle_time, params)?;
        }

        if candle.open_time >= state.next_order_time {
            if leveraged {
                place_leveraged_order(&mut state, candle, rounder, params)?;
            } else {
                place_spot_order(&mut state, candle, rounder, params)?;
            }
            state.next_order_time = candle.open_time.saturating_add(params.period);
        }

        prev_candle_time = candle.open_time;
    }

    // Non-empty after validation.
    let final_price = candles[candles.len() - 1].close;

    if state.base_traded.is_zero() {
        return Err(SimulationError::NoOrdersPlaced);
    }

    let result = if leveraged {
        finalize_leveraged(state, final_price, params)?
    } else {
        finalize_spot(state, final_price, params)?
    };

    info!(
        final_price = %result.final_price,
        base = %result.final_base_balance,
        quote = %result.final_quote_balance,
        trade_fees = %result.total_trade_fees,
        rollover_fees = %result.total_rollover_fees,
        invested = %result.total_invested_amount,
        profit_percent = %result.profit_percent,
        orders = result.orders_placed(),
        liquidated = result.positions_liquidated,
        "L-DCA simulation finished"
    );

    Ok(result)
}

fn apply_ledger(
    state: &mut SimulationState,
    candle: &Candle,
    prev_candle_time: TimeMs,
    params: &SimulationParams,
) -> Result<(), SimulationError> {
    let effects = state.ledger.apply_candle(
        candle,
        prev_candle_time,
        params.side,
        params.rollover_fee,
        params.rollover_period,
    )?;

    if !effects.rollover_fee_charged.is_zero() {
        let fee = effects.rollover_fee_charged;
        state.rollover_fees = checked(state.rollover_fees.checked_add(fee), "rollover fees")?;
        state.quote_balance = checked(state.quote_balance.checked_sub(fee), "quote balance")?;
        debug!(
            time = %candle.open_time,
            fee = %fee,
            quote_balance = %state.quote_balance,
            "Rollover fee charged"
        );
    }

    for position in &effects.liquidated {
        let trigger_price = match position.side {
            Side::Buy => candle.low,
            Side::Sell => candle.high,
        };
        state.positions_liquidated += 1;
        warn!(
            time = %candle.open_time,
            opened = %position.open_time,
            entry_price = %position.entry_price,
            liquidation_price = %position.liquidation_price,
            trigger_price = %trigger_price,
            margin_lost = %position.initial_margin,
            "Position liquidated"
        );
    }

    Ok(())
}

fn fill_price(candle: &Candle) -> Result<Decimal, SimulationError> {
    checked(candle.mid_price(), "mid price")
}

fn round_size<R: SizeRounder + ?Sized>(
    rounder: &R,
    intended: Decimal,
    price: Decimal,
) -> Result<(Decimal, Decimal), SimulationError> {
    let base_amount = rounder.round(intended)?;
    let quote_amount = checked(base_amount.checked_mul(price), "order notional")?;
    Ok((base_amount, quote_amount))
}

fn place_spot_order<R: SizeRounder + ?Sized>(
    state: &mut SimulationState,
    candle: &Candle,
    rounder: &R,
    params: &SimulationParams,
) -> Result<(), SimulationError> {
    let price = fill_price(candle)?;
    let intended = match (params.side, params.sell_size_mode) {
        (Side::Buy, _) | (Side::Sell, SellSizeMode::Convert) => {
            checked(params.quote_size.checked_div(price), "order size")?
        }
        (Side::Sell, SellSizeMode::QuoteAsBase) => params.quote_size,
    };
    let (base_amount, quote_amount) = round_size(rounder, intended, price)?;

    // Buys pay the fee in base, sells in quote.
    let fee = match params.side {
        Side::Buy => {
            let fee = checked(params.trade_fee.checked_mul(base_amount), "trade fee")?;
            let received = checked(base_amount.checked_sub(fee), "base balance")?;
            state.base_balance = checked(state.base_balance.checked_add(received), "base balance")?;
            state.quote_balance =
                checked(state.quote_balance.checked_sub(quote_amount), "quote balance")?;
            fee
        }
        Side::Sell => {
            let fee = checked(params.trade_fee.checked_mul(quote_amount), "trade fee")?;
            let received = checked(quote_amount.checked_sub(fee), "quote balance")?;
            state.base_balance =
                checked(state.base_balance.checked_sub(base_amount), "base balance")?;
            state.quote_balance =
                checked(state.quote_balance.checked_add(received), "quote balance")?;
            fee
        }
    };

    record_fill(
        state,
        SimulatedOrder {
            time: candle.open_time,
            price,
            base_amount,
            quote_amount,
            fee,
        },
        params,
    )
}

fn place_leveraged_order<R: SizeRounder + ?Sized>(
    state: &mut SimulationState,
    candle: &Candle,
    rounder: &R,
    params: &SimulationParams,
) -> Result<(), SimulationError> {
    let price = fill_price(candle)?;
    let exposure = checked(params.quote_size.checked_mul(params.leverage), "exposure")?;
    let intended = checked(exposure.checked_div(price), "order size")?;
    let (base_amount, quote_amount) = round_size(rounder, intended, price)?;

    let position = LeveragedPosition::open(
        params.side,
        price,
        base_amount,
        params.leverage,
        candle.open_time,
    )?;
    let fee = checked(params.trade_fee.checked_mul(quote_amount), "trade fee")?;

    let committed = checked(position.initial_margin.checked_add(fee), "margin")?;
    state.quote_balance = checked(state.quote_balance.checked_sub(committed), "quote balance")?;
    state.total_initial_margin = checked(
        state.total_initial_margin.checked_add(position.initial_margin),
        "total margin",
    )?;

    debug!(
        time = %candle.open_time,
        margin = %position.initial_margin,
        liquidation_price = %position.liquidation_price,
        open_positions = state.ledger.len() + 1,
        "Leveraged position opened"
    );
    state.ledger.add_position(position);

    record_fill(
        state,
        SimulatedOrder {
            time: candle.open_time,
            price,
            base_amount,
            quote_amount,
            fee,
        },
        params,
    )
}

fn record_fill(
    state: &mut SimulationState,
    fill: SimulatedOrder,
    params: &SimulationParams,
) -> Result<(), SimulationError> {
    state.trade_fees = checked(state.trade_fees.checked_add(fill.fee), "trade fees")?;
    state.base_traded = checked(state.base_traded.checked_add(fill.base_amount), "base traded")?;
    state.quote_traded =
        checked(state.quote_traded.checked_add(fill.quote_amount), "quote traded")?;

    info!(
        time = %fill.time,
        side = %params.side,
        price = %fill.price,
        base = %fill.base_amount,
        quote = %fill.quote_amount,
        fee = %fill.fee,
        base_balance = %state.base_balance,
        quote_balance = %state.quote_balance,
        "Order placed"
    );
    state.orders.push(fill);
    Ok(())
}

fn no_orders() -> SimulationError {
    SimulationError::NoOrdersPlaced
}

/// `100 * numerator / denominator`; a zero denominator means nothing was invested.
fn percent_of(numerator: Decimal, denominator: Decimal) -> Result<Decimal, SimulationError> {
    if denominator.is_zero() {
        return Err(no_orders());
    }
    let scaled = checked(Decimal::hundred().checked_mul(numerator), "profit percent")?;
    checked(scaled.checked_div(denominator), "profit percent")
}

fn finalize_spot(
    state: SimulationState,
    final_price: Decimal,
    params: &SimulationParams,
) -> Result<LdcaResult, SimulationError> {
    let average_order_price = state
        .quote_traded
        .checked_div(state.base_traded)
        .ok_or_else(no_orders)?;

    let (fee_symbol, total_value, invested) = match params.side {
        Side::Buy => {
            let base_value =
                checked(state.base_balance.checked_mul(final_price), "total value")?;
            (
                params.symbol_pair.base.clone(),
                checked(base_value.checked_add(state.quote_balance), "total value")?,
                -state.quote_balance,
            )
        }
        Side::Sell => {
            let quote_in_base = checked(state.quote_balance.checked_div(final_price), "total value")?;
            (
                params.symbol_pair.quote.clone(),
                checked(quote_in_base.checked_add(state.base_balance), "total value")?,
                -state.base_balance,
            )
        }
    };

    let profit_percent = percent_of(total_value, invested)?;

    Ok(LdcaResult {
        final_price,
        final_base_balance: state.base_balance,
        final_quote_balance: state.quote_balance,
        total_trade_fees: state.trade_fees,
        fee_symbol,
        average_order_price,
        total_value,
        total_invested_amount: invested,
        profit_percent,
        total_rollover_fees: state.rollover_fees,
        orders: state.orders,
        positions_liquidated: state.positions_liquidated,
        positions_closed_at_end: 0,
    })
}

fn finalize_leveraged(
    state: SimulationState,
    final_price: Decimal,
    params: &SimulationParams,
) -> Result<LdcaResult, SimulationError> {
    let average_order_price = state
        .quote_traded
        .checked_div(state.base_traded)
        .ok_or_else(no_orders)?;

    let mut quote_balance = state.quote_balance;
    let open_positions = state.ledger.into_positions();
    for position in &open_positions {
        let profit = position.profit_at(final_price)?;
        let returned = checked(position.initial_margin.checked_add(profit), "closing value")?;
        quote_balance = checked(quote_balance.checked_add(returned), "quote balance")?;
        debug!(
            opened = %position.open_time,
            entry_price = %position.entry_price,
            final_price = %final_price,
            profit = %profit,
            "Position closed at final price"
        );
    }

    // The running quote balance is net of committed margin.
    let margin = state.total_initial_margin;
    let equity = checked(margin.checked_add(quote_balance), "equity")?;
    let profit_percent = percent_of(equity - margin, margin)?;

    Ok(LdcaResult {
        final_price,
        final_base_balance: state.base_balance,
        final_quote_balance: quote_balance,
        total_trade_fees: state.trade_fees,
        fee_symbol: params.symbol_pair.quote.clone(),
        average_order_price,
        total_value: equity,
        total_invested_amount: margin,
        profit_percent,
        total_rollover_fees: state.rollover_fees,
        orders: state.orders,
        positions_liquidated: state.positions_liquidated,
        positions_closed_at_end: open_positions.len(),
    })
}

mod duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = i64::deserialize(d)?;
        Duration::try_milliseconds(ms)
            .ok_or_else(|| serde::de::Error::custom(format!("duration of {} ms out of range", ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn flat(i: i64, price: &str) -> Candle {
        let p = d(price);
        Candle::new(TimeMs::new(i * 60_000), p, p, p, p)
    }

    fn params() -> SimulationParams {
        SimulationParams::spot(SymbolPair::new("BTC", "USDT"), d("100"), Duration::minutes(1))
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        let mut p = params();
        p.leverage = d("0.5");
        assert!(matches!(p.validate(), Err(SimulationError::InvalidConfig(_))));

        let mut p = params();
        p.period = Duration::zero();
        assert!(p.validate().is_err());

        let mut p = params();
        p.quote_size = Decimal::zero();
        assert!(p.validate().is_err());

        let mut p = params();
        p.trade_fee = d("-0.001");
        assert!(p.validate().is_err());

        let mut p = params();
        p.rollover_fee = d("0.001");
        p.rollover_period = Duration::zero();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_candles() {
        assert!(validate_candles(&[]).is_err());
        assert!(validate_candles(&[flat(1, "10"), flat(1, "10")]).is_err());
        assert!(validate_candles(&[flat(0, "0")]).is_err());
        assert!(validate_candles(&[flat(0, "10"), flat(1, "11")]).is_ok());
    }

    #[test]
    fn test_first_candle_always_orders() {
        let rounder = |size: Decimal| size;
        let result = simulate(&[flat(0, "50")], &rounder, &params()).unwrap();
        assert_eq!(result.orders_placed(), 1);
        assert_eq!(result.orders[0].time, TimeMs::new(0));
        assert_eq!(result.final_base_balance, d("2"));
        assert_eq!(result.final_quote_balance, d("-100"));
        assert_eq!(result.average_order_price, d("50"));
        assert_eq!(result.profit_percent, Decimal::zero());
    }

    #[test]
    fn test_zero_rounded_size_fails_fast() {
        let rounder = |_size: Decimal| Decimal::zero();
        let err = simulate(&[flat(0, "50")], &rounder, &params()).unwrap_err();
        assert!(matches!(err, SimulationError::NoOrdersPlaced));
    }

    #[test]
    fn test_params_json_rejects_out_of_range_duration() {
        let mut json = serde_json::to_value(params()).unwrap();
        json["period"] = serde_json::json!(i64::MIN);
        assert!(serde_json::from_value::<SimulationParams>(json).is_err());
    }

    #[test]
    fn test_params_json_uses_milliseconds() {
        let json = serde_json::to_value(params()).unwrap();
        assert_eq!(json["period"], serde_json::json!(60_000));
        assert_eq!(json["sell_size_mode"], serde_json::json!("quote_as_base"));
    }
}
