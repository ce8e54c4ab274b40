use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DAILY_MEMBERS;
use crate::model::{Member, MemberCount, Order};
use crate::pipeline::{MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

/// Registered and purchasing members per day and channel, next to the cumulative member count.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DailyMembers {}

impl ToTables for DailyMembers {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![daily_members(
            input.snapshot.member_orders(),
            &input.snapshot.members,
            input.member_counts,
            input.snapshot.numeric_member_ids,
        )])
    }

    fn reads_member_counts(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct Day<'a> {
    registered: Vec<&'a str>,
    consumed: Vec<&'a str>,
    member_count: Option<i64>,
}

pub fn daily_members(orders: &[Order], members: &[Member], counts: &[MemberCount], numeric_ids: bool) -> Table {
    let mut days: BTreeMap<(NaiveDate, &str), Day<'_>> = BTreeMap::new();
    for m in members {
        if let Some(date) = m.register_date {
            days.entry((date, m.channel.as_str()))
                .or_default()
                .registered
                .push(m.member_id.as_str());
        }
    }
    for order in orders {
        if let Some(member_id) = order.member_id.as_deref() {
            let consumed = &mut days.entry((order.date, order.channel.as_str())).or_default().consumed;
            if !consumed.contains(&member_id) {
                consumed.push(member_id);
            }
        }
    }
    for count in counts {
        days.entry((count.date, count.channel.as_str()))
            .or_default()
            .member_count = Some(count.member_count);
    }

    let mut table = Table::new(
        DAILY_MEMBERS,
        [
            ("date", Kind::Date),
            ("channel", Kind::Text),
            ("member_count", Kind::Int),
            ("registered_members", Kind::Text),
            ("consumed_members", Kind::Text),
        ],
    );
    for ((date, channel), day) in days {
        table.push(vec![
            Cell::from(date),
            channel.into(),
            day.member_count.into(),
            render_list(&day.registered, numeric_ids).into(),
            render_list(&day.consumed, numeric_ids).into(),
        ]);
    }
    table
}

/// Literal list text such as `[1, 2]` or `['a1', 'b2']`; an empty list is `[]`.
///
/// Numeric ids are written bare. Text ids are quoted like a Python `repr`: single
/// quotes, or double quotes when the id holds a single quote and no double quote.
pub fn render_list(ids: &[&str], numeric: bool) -> String {
    let items = ids
        .iter()
        .map(|id| if numeric { id.to_string() } else { quote(id) })
        .collect::<Vec<String>>()
        .join(", ");
    format!("[{items}]")
}

fn quote(id: &str) -> String {
    let delimiter = if id.contains('\'') && !id.contains('"') { '"' } else { '\'' };
    let mut quoted = String::with_capacity(id.len() + 2);
    quoted.push(delimiter);
    for c in id.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c == delimiter => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push(delimiter);
    quoted
}
