use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Order;
use crate::table::{Cell, Kind};

/// Which totals a grouped aggregation keeps.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMode {
    /// Revenue sum and order count (`revenue`, `orders`).
    #[default]
    Full,
    /// Revenue sum only.
    RevenueOnly,
}

impl AggregateMode {
    pub fn columns(self) -> Vec<(&'static str, Kind)> {
        match self {
            AggregateMode::Full => vec![("revenue", Kind::Float), ("orders", Kind::Int)],
            AggregateMode::RevenueOnly => vec![("revenue", Kind::Float)],
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Totals {
    pub revenue: f64,
    pub orders: i64,
}

impl Totals {
    pub fn cells(&self, mode: AggregateMode) -> Vec<Cell> {
        match mode {
            AggregateMode::Full => vec![self.revenue.into(), self.orders.into()],
            AggregateMode::RevenueOnly => vec![self.revenue.into()],
        }
    }
}

/// Groups orders by the key paired with each of them.
///
/// Only key combinations present in the input show up in the result; nothing is zero-filled.
/// Keys come out in ascending order.
pub fn aggregate<'a, K: Ord>(keyed: impl IntoIterator<Item = (K, &'a Order)>) -> BTreeMap<K, Totals> {
    let mut groups: BTreeMap<K, Totals> = BTreeMap::new();
    for (key, order) in keyed {
        let totals = groups.entry(key).or_default();
        totals.revenue += order.revenue;
        totals.orders += 1;
    }
    groups
}
