use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::REVENUE_OVERVIEW;
use crate::model::{Member, Order};
use crate::pipeline::{aggregate, MetricInput, ToTables, Totals};
use crate::table::{Kind, Table};

/// Member and non-member revenue per day and channel, with new and cumulative member counts.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RevenueOverview {}

impl ToTables for RevenueOverview {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![revenue_overview(&input.snapshot.orders, &input.snapshot.members)])
    }
}

pub fn revenue_overview(orders: &[Order], members: &[Member]) -> Table {
    let member = aggregate(
        orders
            .iter()
            .filter(|order| order.is_member)
            .map(|order| ((order.date, order.channel.as_str()), order)),
    );
    let not_member = aggregate(
        orders
            .iter()
            .filter(|order| !order.is_member)
            .map(|order| ((order.date, order.channel.as_str()), order)),
    );
    let mut registered: BTreeMap<(NaiveDate, &str), i64> = BTreeMap::new();
    for m in members {
        if let Some(date) = m.register_date {
            *registered.entry((date, m.channel.as_str())).or_default() += 1;
        }
    }

    // outer join of the three sides, missing cells count as zero
    let keys: BTreeSet<(NaiveDate, &str)> = member
        .keys()
        .chain(not_member.keys())
        .chain(registered.keys())
        .copied()
        .collect();

    // prefix sum runs per channel in date order
    let mut by_channel: Vec<(&str, NaiveDate)> = keys.iter().map(|(date, channel)| (*channel, *date)).collect();
    by_channel.sort();
    let mut cumulative: BTreeMap<(NaiveDate, &str), i64> = BTreeMap::new();
    let mut running: Option<(&str, i64)> = None;
    for (channel, date) in by_channel {
        let added = registered.get(&(date, channel)).copied().unwrap_or(0);
        let total = match running {
            Some((current, total)) if current == channel => total + added,
            _ => added,
        };
        running = Some((channel, total));
        cumulative.insert((date, channel), total);
    }

    let mut table = Table::new(
        REVENUE_OVERVIEW,
        [
            ("date", Kind::Date),
            ("channel", Kind::Text),
            ("member_revenue", Kind::Float),
            ("member_orders", Kind::Int),
            ("not_member_revenue", Kind::Float),
            ("not_member_orders", Kind::Int),
            ("new_member_count", Kind::Int),
            ("member_count", Kind::Int),
        ],
    );
    for key in keys {
        let m = member.get(&key).copied().unwrap_or_default();
        let n: Totals = not_member.get(&key).copied().unwrap_or_default();
        let (date, channel) = key;
        table.push(vec![
            date.into(),
            channel.into(),
            m.revenue.into(),
            m.orders.into(),
            n.revenue.into(),
            n.orders.into(),
            registered.get(&key).copied().unwrap_or(0).into(),
            cumulative.get(&key).copied().unwrap_or(0).into(),
        ]);
    }
    table
}
