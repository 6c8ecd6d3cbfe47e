//! Budget snapshots and per-interval budget reports.

use crate::domain::{Decimal, Symbol, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time holdings: asset symbol -> amount. Iterates in symbol order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetSnapshot(BTreeMap<Symbol, Decimal>);

impl BudgetSnapshot {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert; a repeated symbol overwrites the earlier amount.
    pub fn with(mut self, symbol: &str, amount: Decimal) -> Self {
        self.0.insert(Symbol::new(symbol), amount);
        self
    }

    pub fn insert(&mut self, symbol: Symbol, amount: Decimal) {
        self.0.insert(symbol, amount);
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Decimal> {
        self.0.get(symbol).copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Decimal)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Symbol, Decimal)> for BudgetSnapshot {
    fn from_iter<I: IntoIterator<Item = (Symbol, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Budget state over one reporting interval, as produced by the trading side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub start_time: TimeMs,
    pub end_time: TimeMs,
    /// Asset in which `initial_value`, `final_value` and `total_profit` are expressed.
    pub primary_asset: Symbol,
    pub initial_value: Decimal,
    pub final_value: Decimal,
    pub total_profit: Decimal,
    pub initial_budget: BudgetSnapshot,
    pub final_budget: BudgetSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees_paid: Option<BudgetSnapshot>,
}
