use chrono::Duration;
use ldca_sim::engine::{LeveragedPosition, PositionLedger};
use ldca_sim::{Candle, Decimal, Side, TimeMs};

const MINUTE: i64 = 60_000;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn candle(minute: i64, high: &str, low: &str) -> Candle {
    Candle::new(TimeMs::new(minute * MINUTE), d(low), d(high), d(low), d(high))
}

/// 10x long at 100 for 10 BTC: margin 100, borrowed 900, liquidation at 90.
fn long_at(minute: i64) -> LeveragedPosition {
    LeveragedPosition::open(Side::Buy, d("100"), d("10"), d("10"), TimeMs::new(minute * MINUTE)).unwrap()
}

fn prev(minute: i64) -> TimeMs {
    TimeMs::new(minute * MINUTE)
}

#[test]
fn test_long_liquidated_when_low_reaches_liquidation_price() {
    let mut ledger = PositionLedger::new();
    ledger.add_position(long_at(0));

    let effects = ledger
        .apply_candle(&candle(1, "95", "90.01"), prev(0), Side::Buy, Decimal::zero(), Duration::minutes(6))
        .unwrap();
    assert!(effects.liquidated.is_empty());
    assert_eq!(ledger.len(), 1);

    let effects = ledger
        .apply_candle(&candle(2, "95", "90"), prev(1), Side::Buy, Decimal::zero(), Duration::minutes(6))
        .unwrap();
    assert_eq!(effects.liquidated, vec![long_at(0)]);
    assert!(ledger.is_empty());
}

#[test]
fn test_liquidated_position_never_reappears() {
    let mut ledger = PositionLedger::new();
    ledger.add_position(long_at(0));
    let survivor = LeveragedPosition::open(Side::Buy, d("80"), d("10"), d("10"), prev(1)).unwrap();
    ledger.add_position(survivor.clone());

    let effects = ledger
        .apply_candle(&candle(2, "90", "85"), prev(1), Side::Buy, Decimal::zero(), Duration::minutes(6))
        .unwrap();
    assert_eq!(effects.liquidated.len(), 1);
    assert_eq!(effects.liquidated[0].open_time, prev(0));

    for minute in 3..10 {
        let effects = ledger
            .apply_candle(
                &candle(minute, "90", "85"),
                prev(minute - 1),
                Side::Buy,
                Decimal::zero(),
                Duration::minutes(6),
            )
            .unwrap();
        assert!(effects.liquidated.is_empty());
    }
    assert_eq!(ledger.positions(), &[survivor]);
}

#[test]
fn test_short_liquidated_when_high_reaches_liquidation_price() {
    let mut ledger = PositionLedger::new();
    let short = LeveragedPosition::open(Side::Sell, d("100"), d("2"), d("5"), prev(0)).unwrap();
    assert_eq!(short.liquidation_price, d("120"));
    ledger.add_position(short);

    let effects = ledger
        .apply_candle(&candle(1, "119.99", "80"), prev(0), Side::Sell, Decimal::zero(), Duration::minutes(6))
        .unwrap();
    assert!(effects.liquidated.is_empty());

    let effects = ledger
        .apply_candle(&candle(2, "120", "110"), prev(1), Side::Sell, Decimal::zero(), Duration::minutes(6))
        .unwrap();
    assert_eq!(effects.liquidated.len(), 1);
    assert!(ledger.is_empty());
}

#[test]
fn test_multiple_liquidations_keep_opening_order() {
    let mut ledger = PositionLedger::new();
    for minute in 0..4 {
        ledger.add_position(long_at(minute));
    }

    let effects = ledger
        .apply_candle(&candle(5, "100", "50"), prev(4), Side::Buy, Decimal::zero(), Duration::minutes(6))
        .unwrap();
    let opened: Vec<TimeMs> = effects.liquidated.iter().map(|p| p.open_time).collect();
    assert_eq!(opened, vec![prev(0), prev(1), prev(2), prev(3)]);
    assert!(ledger.is_empty());
}

#[test]
fn test_rollover_fee_charged_inside_window() {
    let mut ledger = PositionLedger::new();
    ledger.add_position(long_at(0));
    let fee = d("0.002");
    let period = Duration::minutes(6);

    for minute in 1..6 {
        let effects = ledger
            .apply_candle(&candle(minute, "101", "99"), prev(minute - 1), Side::Buy, fee, period)
            .unwrap();
        assert!(effects.rollover_fee_charged.is_zero());
    }

    let effects = ledger
        .apply_candle(&candle(6, "101", "99"), prev(5), Side::Buy, fee, period)
        .unwrap();
    assert_eq!(effects.rollover_fee_charged, d("1.8"));
    assert_eq!(ledger.positions()[0].last_rollover_fee_paid, Some(prev(6)));
}

#[test]
fn test_rollover_fee_not_charged_twice_for_same_candle() {
    let mut ledger = PositionLedger::new();
    ledger.add_position(long_at(0));
    let fee = d("0.002");
    let period = Duration::minutes(6);
    let c = candle(6, "101", "99");

    let first = ledger.apply_candle(&c, prev(5), Side::Buy, fee, period).unwrap();
    let second = ledger.apply_candle(&c, prev(5), Side::Buy, fee, period).unwrap();
    let third = ledger.apply_candle(&c, prev(6), Side::Buy, fee, period).unwrap();

    assert_eq!(first.rollover_fee_charged, d("1.8"));
    assert!(second.rollover_fee_charged.is_zero());
    assert!(third.rollover_fee_charged.is_zero());
}

#[test]
fn test_rollover_charges_one_period_per_candle_after_gap() {
    let mut ledger = PositionLedger::new();
    ledger.add_position(long_at(0));
    let fee = d("0.002");
    let period = Duration::minutes(6);

    // A candle 20 minutes later only covers the first due time.
    let effects = ledger
        .apply_candle(&candle(20, "101", "99"), prev(0), Side::Buy, fee, period)
        .unwrap();
    assert_eq!(effects.rollover_fee_charged, d("1.8"));
    assert_eq!(ledger.positions()[0].last_rollover_fee_paid, Some(prev(6)));
}

#[test]
fn test_rollover_fee_and_liquidation_on_same_candle() {
    let mut ledger = PositionLedger::new();
    ledger.add_position(long_at(0));

    let effects = ledger
        .apply_candle(&candle(6, "100", "89"), prev(5), Side::Buy, d("0.002"), Duration::minutes(6))
        .unwrap();
    assert_eq!(effects.rollover_fee_charged, d("1.8"));
    assert_eq!(effects.liquidated.len(), 1);
    assert_eq!(effects.liquidated[0].last_rollover_fee_paid, Some(prev(6)));
    assert!(ledger.is_empty());
}

#[test]
fn test_zero_rollover_fee_leaves_payment_time_unset() {
    let mut ledger = PositionLedger::new();
    ledger.add_position(long_at(0));

    let effects = ledger
        .apply_candle(&candle(6, "101", "99"), prev(5), Side::Buy, Decimal::zero(), Duration::minutes(6))
        .unwrap();
    assert!(effects.rollover_fee_charged.is_zero());
    assert_eq!(ledger.positions()[0].last_rollover_fee_paid, None);
}
