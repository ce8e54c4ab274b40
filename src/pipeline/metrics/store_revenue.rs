use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::STORE_REVENUE;
use crate::model::Order;
use crate::pipeline::{aggregate, AggregateMode, MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

/// Daily revenue of each physical store; the order's source code names the store.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StoreRevenue {}

impl ToTables for StoreRevenue {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![store_revenue(input.snapshot.store_orders())])
    }
}

pub fn store_revenue<'a>(store_orders: impl IntoIterator<Item = &'a Order>) -> Table {
    let groups = aggregate(
        store_orders
            .into_iter()
            .map(|order| ((order.date, order.source.as_deref()), order)),
    );
    let mode = AggregateMode::RevenueOnly;
    let mut columns = vec![("date", Kind::Date), ("store_id", Kind::Text)];
    columns.extend(mode.columns());
    let mut table = Table::new(STORE_REVENUE, columns);
    for ((date, store_id), totals) in groups {
        let mut row = vec![Cell::from(date), store_id.into()];
        row.extend(totals.cells(mode));
        table.push(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::fixtures::*;
    use crate::model::Snapshot;
    use crate::pipeline::metrics::testing::*;

    #[test]
    fn only_store_orders_are_counted() {
        let mut first = order("1", "2024-02-01", "0", 8.0, None);
        first.source = Some("S01".to_string());
        let mut second = order("2", "2024-02-01", "0", 2.0, Some("m"));
        second.source = Some("S01".to_string());
        let mut online = order("3", "2024-02-01", "7", 100.0, None);
        online.source = Some("S01".to_string());
        let mut other_store = order("4", "2024-02-01", "0", 5.0, None);
        other_store.source = Some("S02".to_string());
        let mut next_day = order("5", "2024-02-02", "0", 1.0, None);
        next_day.source = Some("S01".to_string());
        let snapshot = Snapshot::new(vec![first, second, online, other_store, next_day], vec![], vec![], vec![]);

        let table = StoreRevenue::default()
            .to_tables(&MetricInput::new(&snapshot))
            .unwrap()
            .remove(0);
        assert_unique_keys(&table, &["date", "store_id"]);
        assert_eq!(
            table.rows,
            vec![
                vec![
                    Cell::Date(date("2024-02-01")),
                    Cell::Text("S01".to_string()),
                    Cell::Float(10.0)
                ],
                vec![
                    Cell::Date(date("2024-02-01")),
                    Cell::Text("S02".to_string()),
                    Cell::Float(5.0)
                ],
                vec![
                    Cell::Date(date("2024-02-02")),
                    Cell::Text("S01".to_string()),
                    Cell::Float(1.0)
                ],
            ]
        );
    }
}
