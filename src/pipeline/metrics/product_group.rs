use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::PRODUCT_GROUP;
use crate::model::Purchase;
use crate::pipeline::{MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupLabels {
    pub not_purchased: String,
    pub hot: String,
    pub growing: String,
    pub niche: String,
}

impl Default for GroupLabels {
    fn default() -> Self {
        GroupLabels {
            not_purchased: "not purchased".to_string(),
            hot: "hot".to_string(),
            growing: "growing".to_string(),
            niche: "niche".to_string(),
        }
    }
}

/// Labels every catalog product as not purchased, hot, growing or niche, first match wins.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ProductGroup {
    /// Length of the trailing window, ending at the latest purchase date.
    pub lookback_months: u32,
    /// Share of purchased products, by trailing sales, labeled hot.
    pub hot_percent: usize,
    /// Length of the current and prior periods compared for growth.
    pub growth_days: u64,
    /// Current over prior period sales needed to count as growing.
    pub growth_ratio: f64,
    pub labels: GroupLabels,
}

impl Default for ProductGroup {
    fn default() -> Self {
        ProductGroup {
            lookback_months: 12,
            hot_percent: 20,
            growth_days: 90,
            growth_ratio: 1.5,
            labels: GroupLabels::default(),
        }
    }
}

impl ToTables for ProductGroup {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        Ok(vec![self.product_group(
            &input.snapshot.purchases,
            &input.snapshot.products,
        )])
    }
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

fn sales_by_product<'a>(purchases: impl Iterator<Item = &'a Purchase>) -> BTreeMap<&'a str, f64> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for purchase in purchases {
        *totals.entry(purchase.product_id.as_str()).or_default() += purchase.sales;
    }
    totals
}

impl ProductGroup {
    pub fn product_group(&self, purchases: &[Purchase], products: &[String]) -> Table {
        let mut table = Table::new(PRODUCT_GROUP, [("product_id", Kind::Text), ("group", Kind::Text)]);
        let labels = self.classify(purchases, products);
        for (product, label) in products.iter().zip(labels) {
            table.push(vec![Cell::from(product.as_str()), label.into()]);
        }
        table
    }

    /// One label per catalog product, in catalog order.
    pub fn classify(&self, purchases: &[Purchase], products: &[String]) -> Vec<&str> {
        let Some(latest) = purchases.iter().map(|purchase| purchase.date).max() else {
            return vec![self.labels.not_purchased.as_str(); products.len()];
        };
        let year_start = latest
            .checked_sub_months(Months::new(self.lookback_months))
            .unwrap_or(NaiveDate::MIN);
        let trailing: Vec<&Purchase> = purchases.iter().filter(|p| p.date > year_start).collect();

        let purchased: Vec<(&str, f64)> = sales_by_product(trailing.iter().copied())
            .into_iter()
            .filter(|(_, sales)| *sales > 0.0)
            .collect();

        // stable sort keeps product id order among equal totals
        let mut ranked = purchased.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let hot_count = ranked.len() * self.hot_percent / 100;
        let hot: HashSet<&str> = ranked.iter().take(hot_count).map(|(id, _)| *id).collect();

        let current_start = days_before(latest, self.growth_days);
        let prior_start = days_before(current_start, self.growth_days);
        let current = sales_by_product(trailing.iter().copied().filter(|p| p.date > current_start));
        let prior = sales_by_product(
            trailing
                .iter()
                .copied()
                .filter(|p| p.date > prior_start && p.date <= current_start),
        );

        let purchased: HashSet<&str> = purchased.into_iter().map(|(id, _)| id).collect();
        products
            .iter()
            .map(|product| {
                let product = product.as_str();
                if !purchased.contains(product) {
                    &self.labels.not_purchased
                } else if hot.contains(product) {
                    &self.labels.hot
                } else if self.is_growing(current.get(product).copied(), prior.get(product).copied()) {
                    &self.labels.growing
                } else {
                    &self.labels.niche
                }
            })
            .map(String::as_str)
            .collect()
    }

    fn is_growing(&self, current: Option<f64>, prior: Option<f64>) -> bool {
        // a product without prior sales is measured against one unit
        let baseline = prior.filter(|sales| *sales > 0.0).unwrap_or(1.0);
        current.unwrap_or(0.0) / baseline >= self.growth_ratio
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::model::fixtures::*;
    use crate::pipeline::metrics::testing::*;

    fn catalog(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn no_purchases_means_nothing_was_purchased() {
        let step = ProductGroup::default();
        assert_eq!(step.classify(&[], &catalog(&["a", "b"])), vec!["not purchased", "not purchased"]);
    }

    #[test]
    fn old_sales_do_not_count_for_the_trailing_year() {
        let purchases = vec![
            purchase("1", "2022-01-01", "old", 1000.0),
            purchase("2", "2024-01-01", "new", 2.0),
        ];
        let step = ProductGroup::default();
        let labels = step.classify(&purchases, &catalog(&["old", "new", "never"]));
        assert_eq!(labels, vec!["not purchased", "growing", "not purchased"]);
    }

    #[test]
    fn top_fifth_is_hot_and_ties_keep_id_order() {
        let ids = ["p1", "p10", "p2", "p3", "p4", "p5", "p6", "p7", "p8", "p9"];
        let purchases: Vec<Purchase> = ids
            .iter()
            .map(|product| {
                // p1..p4 share the highest total, only the first two fit in the top fifth
                let sales = if ["p1", "p2", "p3", "p4"].contains(product) { 100.0 } else { 1.0 };
                purchase(product, "2024-01-01", product, sales)
            })
            .collect();
        let step = ProductGroup::default();
        let labels = step.classify(&purchases, &catalog(&ids));
        assert_eq!(
            labels,
            vec!["hot", "niche", "hot", "growing", "growing", "niche", "niche", "niche", "niche", "niche"]
        );
    }

    #[rstest]
    #[case::doubled(Some(200.0), Some(100.0), true)]
    #[case::exactly_ratio(Some(150.0), Some(100.0), true)]
    #[case::flat(Some(120.0), Some(100.0), false)]
    #[case::new_product(Some(2.0), None, true)]
    #[case::tiny_new_product(Some(1.0), None, false)]
    #[case::stopped_selling(None, Some(100.0), false)]
    fn growth_against_prior_period(#[case] current: Option<f64>, #[case] prior: Option<f64>, #[case] expected: bool) {
        assert_eq!(ProductGroup::default().is_growing(current, prior), expected);
    }

    #[test]
    fn labels_are_exclusive_and_cover_the_catalog() {
        let purchases = vec![
            purchase("1", "2024-06-30", "hot", 900.0),
            purchase("2", "2024-06-30", "grow", 30.0),
            purchase("3", "2024-02-01", "grow", 10.0),
            purchase("4", "2024-06-30", "steady", 10.0),
            purchase("5", "2024-02-01", "steady", 10.0),
            purchase("6", "2024-06-30", "a", 1.0),
            purchase("7", "2024-02-01", "a", 1.0),
            purchase("8", "2024-06-30", "stray", 5.0),
        ];
        let products = catalog(&["hot", "grow", "steady", "a", "idle"]);
        let step = ProductGroup::default();
        let table = step.product_group(&purchases, &products);
        assert_eq!(table.len(), products.len());
        assert_unique_keys(&table, &["product_id"]);
        assert_eq!(
            table.project(&["product_id", "group"]),
            vec![
                vec![Cell::from("hot"), "hot".into()],
                vec![Cell::from("grow"), "growing".into()],
                vec![Cell::from("steady"), "niche".into()],
                vec![Cell::from("a"), "niche".into()],
                vec![Cell::from("idle"), "not purchased".into()],
            ]
        );
    }

    #[test]
    fn thresholds_come_from_configuration() {
        let step: ProductGroup = serde_json::from_value(json!({
            "hot_percent": 100,
            "labels": {"not_purchased": "未購買", "hot": "熱銷", "growing": "成長", "niche": "小眾"}
        }))
        .unwrap();
        assert_eq!(step.growth_days, 90);
        let purchases = vec![purchase("1", "2024-01-01", "a", 1.0)];
        assert_eq!(step.classify(&purchases, &catalog(&["a", "b"])), vec!["熱銷", "未購買"]);
    }
}
