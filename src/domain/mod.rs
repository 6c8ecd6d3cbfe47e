//! Domain types for the L-DCA simulator and budget reports.
//!
//! This module provides:
//! - Exact numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Symbol, SymbolPair, Side
//! - Candles and candle widths
//! - Budget snapshots and budget reports

pub mod budget;
pub mod candle;
pub mod decimal;
pub mod primitives;

pub use budget::{BudgetReport, BudgetSnapshot};
pub use candle::{Candle, CandleWidth};
pub use decimal::Decimal;
pub use primitives::{Side, Symbol, SymbolPair, SymbolPairParseError, TimeMs};
