use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::MEMBER_ORDER_INTERVAL;
use crate::model::Order;
use crate::pipeline::{MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

/// Days since each member's previous order, on any channel and on the same channel.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MemberOrderInterval {}

impl ToTables for MemberOrderInterval {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![member_order_interval(input.snapshot.member_orders())])
    }
}

struct Interval<'a> {
    order: &'a Order,
    all: Option<i64>,
    same_channel: Option<i64>,
}

pub fn member_order_interval(orders: &[Order]) -> Table {
    let mut history: Vec<&Order> = orders.iter().collect();
    history.sort_by_key(|&order| (order.member_id.as_deref(), order.date));

    let mut previous: HashMap<&str, NaiveDate> = HashMap::new();
    let mut previous_on_channel: HashMap<(&str, &str), NaiveDate> = HashMap::new();
    let mut intervals: Vec<Interval<'_>> = Vec::with_capacity(history.len());
    for order in history {
        let Some(member_id) = order.member_id.as_deref() else {
            intervals.push(Interval {
                order,
                all: None,
                same_channel: None,
            });
            continue;
        };
        let all = previous
            .insert(member_id, order.date)
            .map(|before| (order.date - before).num_days());
        let same_channel = previous_on_channel
            .insert((member_id, order.channel.as_str()), order.date)
            .map(|before| (order.date - before).num_days());
        intervals.push(Interval {
            order,
            all,
            same_channel,
        });
    }
    intervals.sort_by_key(|interval| {
        let order = interval.order;
        (order.date, order.member_id.as_deref())
    });

    let mut table = Table::new(
        MEMBER_ORDER_INTERVAL,
        [
            ("date", Kind::Date),
            ("channel", Kind::Text),
            ("member_id", Kind::Text),
            ("interval_all", Kind::Int),
            ("interval", Kind::Int),
        ],
    );
    for interval in intervals {
        table.push(vec![
            Cell::from(interval.order.date),
            interval.order.channel.as_str().into(),
            interval.order.member_id.as_deref().into(),
            interval.all.into(),
            interval.same_channel.into(),
        ]);
    }
    table
}
