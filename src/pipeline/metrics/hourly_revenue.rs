use anyhow::Result;
use chrono::Timelike;
use serde::{Deserialize, Serialize};

use super::{HOURLY_REVENUE, HOURLY_REVENUE_STORE};
use crate::model::Order;
use crate::pipeline::{aggregate, AggregateMode, MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

fn hour(order: &Order) -> Option<u32> {
    order.time.map(|time| time.hour())
}

/// Store revenue per hour of day.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct HourlyRevenueStore {}

impl ToTables for HourlyRevenueStore {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        let groups = aggregate(
            input
                .snapshot
                .store_orders()
                .map(|order| ((order.date, hour(order)), order)),
        );
        let mode = AggregateMode::RevenueOnly;
        let mut columns = vec![("date", Kind::Date), ("hour", Kind::Int)];
        columns.extend(mode.columns());
        let mut table = Table::new(HOURLY_REVENUE_STORE, columns);
        for ((date, hour), totals) in groups {
            let mut row = vec![Cell::from(date), hour.into()];
            row.extend(totals.cells(mode));
            table.push(row);
        }
        Ok(vec![table])
    }
}

/// Member-order revenue and order count per channel and hour of day.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct HourlyRevenue {}

impl ToTables for HourlyRevenue {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![hourly_revenue(input.snapshot.member_orders())])
    }
}

pub fn hourly_revenue(orders: &[Order]) -> Table {
    let groups = aggregate(
        orders
            .iter()
            .map(|order| ((order.date, order.channel.as_str(), hour(order)), order)),
    );
    let mode = AggregateMode::Full;
    let mut columns = vec![("date", Kind::Date), ("channel", Kind::Text), ("hour", Kind::Int)];
    columns.extend(mode.columns());
    let mut table = Table::new(HOURLY_REVENUE, columns);
    for ((date, channel, hour), totals) in groups {
        let mut row = vec![Cell::from(date), channel.into(), hour.into()];
        row.extend(totals.cells(mode));
        table.push(row);
    }
    table
}
