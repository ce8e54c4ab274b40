use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::SOURCE_REVENUE;
use crate::model::Order;
use crate::pipeline::{aggregate, AggregateMode, MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

/// Labels given to store orders, which carry no source code of their own.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceLabels {
    pub member: String,
    pub non_member: String,
}

impl Default for SourceLabels {
    fn default() -> Self {
        SourceLabels {
            member: "member".to_string(),
            non_member: "non-member".to_string(),
        }
    }
}

/// Revenue per acquisition source: online member orders by source code, store orders by membership.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SourceRevenue {
    #[serde(default)]
    pub labels: SourceLabels,
}

impl ToTables for SourceRevenue {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![source_revenue(
            input.snapshot.member_orders(),
            &input.snapshot.orders,
            &self.labels,
        )])
    }
}

pub fn source_revenue(member_orders: &[Order], orders: &[Order], labels: &SourceLabels) -> Table {
    let online = member_orders
        .iter()
        .filter(|order| order.is_online())
        .map(|order| ((order.date, true, order.source.as_deref()), order));
    let store = orders.iter().filter(|order| !order.is_online()).map(|order| {
        let label = if order.is_member {
            &labels.member
        } else {
            &labels.non_member
        };
        ((order.date, false, Some(label.as_str())), order)
    });
    // is_online keeps the two halves apart, so one grouping covers both
    let groups = aggregate(online.chain(store));

    let mode = AggregateMode::RevenueOnly;
    let mut columns = vec![("date", Kind::Date), ("is_online", Kind::Bool), ("source", Kind::Text)];
    columns.extend(mode.columns());
    let mut table = Table::new(SOURCE_REVENUE, columns);
    for ((date, is_online, source), totals) in groups {
        let mut row = vec![Cell::from(date), is_online.into(), source.into()];
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
    fn online_by_source_and_store_by_membership() {
        let mut ad = order("1", "2024-05-01", "2", 50.0, Some("a"));
        ad.source = Some("ads".to_string());
        let mut ad_again = order("2", "2024-05-01", "3", 25.0, Some("b"));
        ad_again.source = Some("ads".to_string());
        let snapshot = Snapshot::new(
            vec![
                ad,
                ad_again,
                order("3", "2024-05-01", "2", 99.0, None),
                order("4", "2024-05-01", "0", 10.0, Some("a")),
                order("5", "2024-05-01", "0", 12.0, None),
                order("6", "2024-05-01", "0", 3.0, None),
            ],
            vec![],
            vec![],
            vec![],
        );
        let step = SourceRevenue::default();
        let tables = step.to_tables(&MetricInput::new(&snapshot)).unwrap();
        let table = &tables[0];
        assert_unique_keys(table, &["date", "is_online", "source"]);
        assert_eq!(
            table.project(&["is_online", "source", "revenue"]),
            vec![
                vec![Cell::from(false), "member".into(), 10.0.into()],
                vec![Cell::from(false), "non-member".into(), 15.0.into()],
                vec![Cell::from(true), "ads".into(), 75.0.into()],
            ]
        );
    }

    #[test]
    fn labels_are_configurable() {
        let labels: SourceLabels =
            serde_json::from_value(serde_json::json!({"member": "會員", "non_member": "非會員"})).unwrap();
        let orders = vec![order("1", "2024-05-01", "0", 1.0, None)];
        let table = source_revenue(&[], &orders, &labels);
        assert_eq!(table.column("source"), vec![&Cell::Text("非會員".to_string())]);
    }
}
