use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::REGION_REVENUE;
use crate::model::{Member, Order};
use crate::pipeline::{aggregate, AggregateMode, MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

/// Member-order revenue by shipping address and by the buyer's home address.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RegionRevenue {}

impl ToTables for RegionRevenue {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![region_revenue(
            input.snapshot.member_orders(),
            &input.snapshot.members,
        )])
    }
}

pub fn region_revenue(orders: &[Order], members: &[Member]) -> Table {
    let shipping = aggregate(orders.iter().map(|order| {
        (
            (order.date, order.is_online(), order.city.as_deref(), order.region.as_deref()),
            order,
        )
    }));

    let homes: HashMap<&str, &Member> = members.iter().map(|m| (m.member_id.as_str(), m)).collect();
    let home = aggregate(orders.iter().filter_map(|order| {
        let member = homes.get(order.member_id.as_deref()?)?;
        // members without a home address only drop out of this breakdown
        let (city, region) = (member.city.as_deref()?, member.region.as_deref()?);
        Some(((order.date, order.is_online(), Some(city), Some(region)), order))
    }));

    let mode = AggregateMode::Full;
    let mut columns = vec![
        ("date", Kind::Date),
        ("is_online", Kind::Bool),
        ("city", Kind::Text),
        ("region", Kind::Text),
    ];
    columns.extend(mode.columns());
    columns.push(("type", Kind::Text));

    let mut table = Table::new(REGION_REVENUE, columns);
    for (kind, groups) in [("shipping", shipping), ("member", home)] {
        for ((date, is_online, city, region), totals) in groups {
            let mut row = vec![Cell::from(date), is_online.into(), city.into(), region.into()];
            row.extend(totals.cells(mode));
            row.push(kind.into());
            table.push(row);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::fixtures::*;
    use crate::pipeline::metrics::testing::*;

    fn shipped(id: &str, channel: &str, revenue: f64, member_id: &str, city: &str) -> Order {
        let mut order = order(id, "2024-03-01", channel, revenue, Some(member_id));
        order.city = Some(city.to_string());
        order.region = Some(format!("{city}-region"));
        order
    }

    fn resident(id: &str, city: Option<&str>) -> Member {
        let mut m = member(id, "2023-01-01", "0");
        m.city = city.map(str::to_string);
        m.region = city.map(|c| format!("{c}-region"));
        m
    }

    fn total(table: &Table, kind: &str) -> f64 {
        find(table, "type", &Cell::Text(kind.to_string()))
            .into_iter()
            .filter_map(|row| match get(table, row, "revenue") {
                Cell::Float(value) => Some(*value),
                _ => None,
            })
            .sum()
    }

    #[test]
    fn both_breakdowns_are_tagged_and_unique() {
        let orders = vec![
            shipped("1", "0", 10.0, "a", "Taipei"),
            shipped("2", "0", 20.0, "a", "Taipei"),
            shipped("3", "4", 5.0, "b", "Tainan"),
        ];
        let members = vec![resident("a", Some("Kaohsiung")), resident("b", Some("Kaohsiung"))];
        let table = region_revenue(&orders, &members);
        assert_unique_keys(&table, &["type", "date", "is_online", "city", "region"]);
        assert_eq!(
            table.project(&["type", "is_online", "city", "orders"]),
            vec![
                vec![Cell::from("shipping"), false.into(), "Taipei".into(), 2_i64.into()],
                vec![Cell::from("shipping"), true.into(), "Tainan".into(), 1_i64.into()],
                vec![Cell::from("member"), false.into(), "Kaohsiung".into(), 2_i64.into()],
                vec![Cell::from("member"), true.into(), "Kaohsiung".into(), 1_i64.into()],
            ]
        );
        assert_eq!(total(&table, "shipping"), 35.0);
        assert_eq!(total(&table, "member"), 35.0);
    }

    #[test]
    fn member_without_home_address_is_only_dropped_from_member_breakdown() {
        let orders = vec![shipped("1", "0", 10.0, "a", "Taipei"), shipped("2", "0", 7.0, "b", "Taipei")];
        let members = vec![resident("a", None), resident("b", Some("Hsinchu"))];
        let table = region_revenue(&orders, &members);
        assert_eq!(total(&table, "shipping"), 17.0);
        assert_eq!(total(&table, "member"), 7.0);
    }
}
