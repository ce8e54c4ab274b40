use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::Purchase;
use crate::pipeline::{MetricInput, ToTables};
use crate::table::{Cell, Kind, Table};

/// Granularity at which purchased line items are identified.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Product,
    Brand,
    Category,
    Business,
}

impl Family {
    pub const ALL: [Family; 4] = [Family::Product, Family::Brand, Family::Category, Family::Business];

    pub fn name(self) -> &'static str {
        match self {
            Family::Product => "product",
            Family::Brand => "brand",
            Family::Category => "category",
            Family::Business => "business",
        }
    }

    pub fn id_column(self) -> &'static str {
        match self {
            Family::Product => "product_id",
            Family::Brand => "brand_id",
            Family::Category => "category_id",
            Family::Business => "business_id",
        }
    }

    pub fn pair_columns(self) -> [&'static str; 2] {
        match self {
            Family::Product => ["product_1", "product_2"],
            Family::Brand => ["brand_1", "brand_2"],
            Family::Category => ["category_1", "category_2"],
            Family::Business => ["business_1", "business_2"],
        }
    }

    pub fn id(self, purchase: &Purchase) -> Option<&str> {
        match self {
            Family::Product => Some(purchase.product_id.as_str()),
            Family::Brand => purchase.brand_id.as_deref(),
            Family::Category => purchase.category_id.as_deref(),
            Family::Business => purchase.business_id.as_deref(),
        }
    }

    pub fn sales_table(self) -> String {
        format!("{}_sales", self.name())
    }

    pub fn concurrent_table(self) -> String {
        format!("{}_concurrent", self.name())
    }
}

fn all_families() -> Vec<Family> {
    Family::ALL.to_vec()
}

/// Sales and co-purchase tables for each configured family.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProductSales {
    #[serde(default = "all_families")]
    pub families: Vec<Family>,
}

impl Default for ProductSales {
    fn default() -> Self {
        ProductSales {
            families: all_families(),
        }
    }
}

impl ToTables for ProductSales {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>> {
        let purchases = &input.snapshot.purchases;
        Ok(self
            .families
            .iter()
            .flat_map(|family| [family_sales(purchases, *family), co_purchases(purchases, *family)])
            .collect())
    }
}

#[derive(Default)]
struct Sales<'a> {
    sales: f64,
    orders: HashSet<&'a str>,
    buyers: HashSet<&'a str>,
}

/// Sales sum, distinct orders and distinct buyers per (date, is_online, family id).
pub fn family_sales(purchases: &[Purchase], family: Family) -> Table {
    let mut groups: BTreeMap<(NaiveDate, bool, &str), Sales<'_>> = BTreeMap::new();
    for purchase in purchases {
        let Some(id) = family.id(purchase) else {
            continue;
        };
        let group = groups.entry((purchase.date, purchase.is_online(), id)).or_default();
        group.sales += purchase.sales;
        group.orders.insert(purchase.order_id.as_str());
        if let Some(buyer) = purchase.member_id.as_deref() {
            group.buyers.insert(buyer);
        }
    }

    let mut table = Table::new(
        family.sales_table(),
        [
            ("date", Kind::Date),
            ("is_online", Kind::Bool),
            (family.id_column(), Kind::Text),
            ("sales", Kind::Float),
            ("orders", Kind::Int),
            ("buyers_count", Kind::Int),
        ],
    );
    for ((date, is_online, id), group) in groups {
        table.push(vec![
            Cell::from(date),
            is_online.into(),
            id.into(),
            group.sales.into(),
            group.orders.len().into(),
            group.buyers.len().into(),
        ]);
    }
    table
}

/// Counts how often each unordered pair of distinct family ids shares an order.
///
/// Pairs are emitted smaller id first, so `(a, b)` and `(b, a)` always land on the same key.
pub fn co_purchases(purchases: &[Purchase], family: Family) -> Table {
    let mut baskets: BTreeMap<(NaiveDate, bool, &str), BTreeSet<&str>> = BTreeMap::new();
    for purchase in purchases {
        if let Some(id) = family.id(purchase) {
            baskets
                .entry((purchase.date, purchase.is_online(), purchase.order_id.as_str()))
                .or_default()
                .insert(id);
        }
    }

    let mut pairs: BTreeMap<(NaiveDate, bool, &str, &str), i64> = BTreeMap::new();
    for ((date, is_online, _), ids) in &baskets {
        let ids: Vec<&str> = ids.iter().copied().collect();
        for (i, first) in ids.iter().enumerate() {
            for second in &ids[i + 1..] {
                *pairs.entry((*date, *is_online, *first, *second)).or_default() += 1;
            }
        }
    }

    let [first_column, second_column] = family.pair_columns();
    let mut table = Table::new(
        family.concurrent_table(),
        [
            ("date", Kind::Date),
            ("is_online", Kind::Bool),
            (first_column, Kind::Text),
            (second_column, Kind::Text),
            ("orders", Kind::Int),
        ],
    );
    for ((date, is_online, first, second), orders) in pairs {
        table.push(vec![
            Cell::from(date),
            is_online.into(),
            first.into(),
            second.into(),
            orders.into(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::model::fixtures::*;
    use crate::pipeline::metrics::testing::*;

    fn basket(order_id: &str, products: &[&str]) -> Vec<Purchase> {
        products
            .iter()
            .map(|product| {
                let mut line = purchase(order_id, "2024-04-01", product, 10.0);
                line.brand_id = Some(format!("brand-{}", &product[..1]));
                line.member_id = Some(format!("buyer-{order_id}"));
                line
            })
            .collect()
    }

    #[test]
    fn three_products_give_three_canonical_pairs() {
        let purchases = basket("1", &["C", "A", "B"]);
        let table = co_purchases(&purchases, Family::Product);
        assert_eq!(
            table.project(&["product_1", "product_2", "orders"]),
            vec![
                vec![Cell::from("A"), "B".into(), Cell::Int(1)],
                vec![Cell::from("A"), "C".into(), Cell::Int(1)],
                vec![Cell::from("B"), "C".into(), Cell::Int(1)],
            ]
        );
    }

    #[test]
    fn pairs_are_counted_across_orders_and_singletons_skipped() {
        let mut purchases = basket("1", &["B", "A"]);
        purchases.extend(basket("2", &["A", "B", "A"]));
        purchases.extend(basket("3", &["A"]));
        let table = co_purchases(&purchases, Family::Product);
        assert_unique_keys(&table, &["date", "is_online", "product_1", "product_2"]);
        assert_eq!(
            table.project(&["product_1", "product_2", "orders"]),
            vec![vec![Cell::from("A"), "B".into(), Cell::Int(2)]]
        );
    }

    #[test]
    fn same_family_id_twice_is_not_a_pair() {
        // both products share brand "brand-A"
        let purchases = basket("1", &["A1", "A2"]);
        assert!(co_purchases(&purchases, Family::Brand).is_empty());
        assert_eq!(co_purchases(&purchases, Family::Product).len(), 1);
    }

    #[test]
    fn sales_count_distinct_orders_and_buyers() {
        let mut purchases = basket("1", &["A", "A"]);
        purchases.extend(basket("2", &["A"]));
        let mut anonymous = purchase("3", "2024-04-01", "A", 5.0);
        anonymous.member_id = None;
        purchases.push(anonymous);
        let table = family_sales(&purchases, Family::Product);
        assert_unique_keys(&table, &["date", "is_online", "product_id"]);
        assert_eq!(
            table.project(&["product_id", "sales", "orders", "buyers_count"]),
            vec![vec![Cell::from("A"), Cell::Float(35.0), Cell::Int(3), Cell::Int(2)]]
        );
    }

    #[test]
    fn sales_keys_are_unique_per_family() {
        let mut purchases = basket("1", &["A1", "A2", "B1"]);
        purchases.extend(basket("2", &["A1", "B2"]));
        let mut in_store = purchase("3", "2024-04-01", "A1", 4.0);
        in_store.channel = "0".to_string();
        in_store.brand_id = Some("brand-A".to_string());
        purchases.push(in_store);
        for family in [Family::Product, Family::Brand] {
            let table = family_sales(&purchases, family);
            assert_unique_keys(&table, &["date", "is_online", family.id_column()]);
        }
        let brands = family_sales(&purchases, Family::Brand);
        assert_eq!(
            brands.project(&["is_online", "brand_id", "orders"]),
            vec![
                vec![Cell::Bool(false), "brand-A".into(), Cell::Int(1)],
                vec![Cell::Bool(true), "brand-A".into(), Cell::Int(2)],
                vec![Cell::Bool(true), "brand-B".into(), Cell::Int(2)],
            ]
        );
    }

    #[test]
    fn uncatalogued_products_are_skipped_for_catalog_families() {
        let purchases = vec![purchase("1", "2024-04-01", "X", 3.0)];
        assert!(family_sales(&purchases, Family::Category).is_empty());
        assert_eq!(family_sales(&purchases, Family::Product).len(), 1);
    }

    #[rstest]
    #[case::product(Family::Product, "product_sales", "product_concurrent", "product_id")]
    #[case::business(Family::Business, "business_sales", "business_concurrent", "business_id")]
    fn family_names_tables_and_columns(
        #[case] family: Family,
        #[case] sales: &str,
        #[case] concurrent: &str,
        #[case] column: &str,
    ) {
        assert_eq!(family.sales_table(), sales);
        assert_eq!(family.concurrent_table(), concurrent);
        assert_eq!(family.id_column(), column);
    }
}
