//! Cumulative budget report rendering.
//!
//! The accumulator only keeps the append-only list of [`BudgetReport`]s. The
//! column set is derived from the full list on every render, so an asset that
//! first shows up in a later report simply adds a column.

use crate::domain::{BudgetReport, BudgetSnapshot, Decimal, Symbol, TimeMs};
use chrono::Duration;
use std::collections::BTreeSet;

pub mod csv_writer;

pub use csv_writer::{to_csv_string, write_csv, ReportError};

/// Fixed leading columns of every rendered report.
pub const FIXED_COLUMNS: [&str; 5] = ["time", "period", "value", "delta", "profit"];

/// A rendered report: one header row plus data rows of equal width.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    /// Index of a header column by name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Cell by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column(column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(|s| s.as_str())
    }
}

/// Append-only store of budget reports.
#[derive(Debug, Clone, Default)]
pub struct ReportAccumulator {
    reports: Vec<BudgetReport>,
}

impl ReportAccumulator {
    pub fn new() -> Self {
        Self {
            reports: Vec::new(),
        }
    }

    pub fn push(&mut self, report: BudgetReport) {
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[BudgetReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn render(&self) -> ReportTable {
        render(&self.reports)
    }
}

/// Header label of a fee column.
pub fn fee_column(symbol: &Symbol) -> String {
    format!("fee {}", symbol)
}

/// Render every report received so far into a table.
///
/// Row 0 is the initial budget of the first report; each report then adds
/// one row with its final budget. Missing assets render as blank cells.
pub fn render(reports: &[BudgetReport]) -> ReportTable {
    let assets = asset_columns(reports);
    let fee_assets = fee_columns(reports);

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(assets.iter().map(|s| s.to_string()));
    header.extend(fee_assets.iter().map(fee_column));

    let Some(first) = reports.first() else {
        return ReportTable {
            header,
            rows: Vec::new(),
        };
    };

    let mut rows = Vec::with_capacity(reports.len() + 1);

    let mut row = vec![
        first.start_time.to_string(),
        format_elapsed(Duration::zero()),
        first.initial_value.to_string(),
        Decimal::zero().to_string(),
        Decimal::zero().to_string(),
    ];
    row.extend(budget_cells(&first.initial_budget, &assets));
    row.extend(fee_assets.iter().map(|_| String::new()));
    rows.push(row);

    let mut previous_value = first.initial_value;
    for report in reports {
        let mut row = vec![
            report.end_time.to_string(),
            format_elapsed(elapsed(first.start_time, report.end_time)),
            report.final_value.to_string(),
            (report.final_value - previous_value).to_string(),
            report.total_profit.to_string(),
        ];
        row.extend(budget_cells(&report.final_budget, &assets));
        match &report.fees_paid {
            Some(fees) => row.extend(budget_cells(fees, &fee_assets)),
            None => row.extend(fee_assets.iter().map(|_| String::new())),
        }
        rows.push(row);
        previous_value = report.final_value;
    }

    ReportTable { header, rows }
}

/// Union of all assets in any initial or final budget, sorted by symbol.
fn asset_columns(reports: &[BudgetReport]) -> Vec<Symbol> {
    let set: BTreeSet<&Symbol> = reports
        .iter()
        .flat_map(|r| r.initial_budget.symbols().chain(r.final_budget.symbols()))
        .collect();
    set.into_iter().cloned().collect()
}

fn fee_columns(reports: &[BudgetReport]) -> Vec<Symbol> {
    let set: BTreeSet<&Symbol> = reports
        .iter()
        .filter_map(|r| r.fees_paid.as_ref())
        .flat_map(|fees| fees.symbols())
        .collect();
    set.into_iter().cloned().collect()
}

fn budget_cells<'a>(
    snapshot: &'a BudgetSnapshot,
    columns: &'a [Symbol],
) -> impl Iterator<Item = String> + 'a {
    columns.iter().map(move |symbol| {
        snapshot
            .get(symbol)
            .map(|amount| amount.to_string())
            .unwrap_or_default()
    })
}

fn elapsed(start: TimeMs, end: TimeMs) -> Duration {
    end.since(start)
}

/// `D.HH:MM:SS`, with a leading `-` for negative spans.
pub fn format_elapsed(span: Duration) -> String {
    let sign = if span < Duration::zero() { "-" } else { "" };
    let total = span.num_seconds().abs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{}{}.{:02}:{:02}:{:02}", sign, days, hours, minutes, seconds)
}
