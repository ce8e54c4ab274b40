use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::Source;

/// Channel identifier of physical stores; every other value is an online storefront.
pub const STORE_CHANNEL: &str = "0";

pub fn is_online(channel: &str) -> bool {
    channel != STORE_CHANNEL
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub channel: String,
    pub is_member: bool,
    pub revenue: f64,
    pub source: Option<String>,
    pub member_id: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
}

impl Order {
    pub fn is_online(&self) -> bool {
        is_online(&self.channel)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Member {
    pub member_id: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub register_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub channel: String,
}

/// One purchased line item, enriched with the catalog identifiers of its product.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Purchase {
    pub order_id: String,
    pub date: NaiveDate,
    pub sales: f64,
    pub product_id: String,
    pub member_id: Option<String>,
    pub channel: String,
    pub brand_id: Option<String>,
    pub category_id: Option<String>,
    pub business_id: Option<String>,
}

impl Purchase {
    pub fn is_online(&self) -> bool {
        is_online(&self.channel)
    }
}

/// Cumulative member count per (date, channel), read back from the revenue overview.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemberCount {
    pub date: NaiveDate,
    pub channel: String,
    pub member_count: i64,
}

/// Everything a metrics run reads, loaded once and shared read-only by every metric.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub members: Vec<Member>,
    pub purchases: Vec<Purchase>,
    pub products: Vec<String>,
    /// Member ids come from an integer column and render without quotes.
    pub numeric_member_ids: bool,
    member_orders: Vec<Order>,
}

impl Snapshot {
    pub fn new(
        orders: Vec<Order>,
        members: Vec<Member>,
        purchases: Vec<Purchase>,
        products: Vec<String>,
    ) -> Self {
        let member_orders = orders.iter().filter(|order| order.is_member).cloned().collect();
        Snapshot {
            orders,
            members,
            purchases,
            products,
            numeric_member_ids: false,
            member_orders,
        }
    }

    pub async fn load<S: Source + ?Sized>(source: &S) -> Result<Self> {
        let orders = source.load_orders().await?;
        info!(rows = orders.len(), "loaded orders");
        let members = source.load_members().await?;
        info!(rows = members.len(), "loaded members");
        let purchases = source.load_purchases().await?;
        info!(rows = purchases.len(), "loaded purchases");
        let products = source.load_products().await?;
        info!(rows = products.len(), "loaded product catalog");
        let mut snapshot = Snapshot::new(orders, members, purchases, products);
        snapshot.numeric_member_ids = source.member_ids_numeric().await?;
        Ok(snapshot)
    }

    /// Orders placed by members.
    pub fn member_orders(&self) -> &[Order] {
        &self.member_orders
    }

    pub fn store_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|order| !order.is_online())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    pub fn order(order_id: &str, day: &str, channel: &str, revenue: f64, member_id: Option<&str>) -> Order {
        Order {
            order_id: order_id.to_string(),
            date: date(day),
            time: NaiveTime::from_hms_opt(10, 30, 0),
            channel: channel.to_string(),
            is_member: member_id.is_some(),
            revenue,
            source: None,
            member_id: member_id.map(str::to_string),
            city: None,
            region: None,
        }
    }

    pub fn member(member_id: &str, registered: &str, channel: &str) -> Member {
        Member {
            member_id: member_id.to_string(),
            city: None,
            region: None,
            register_date: Some(date(registered)),
            gender: None,
            birth_date: None,
            channel: channel.to_string(),
        }
    }

    pub fn purchase(order_id: &str, day: &str, product_id: &str, sales: f64) -> Purchase {
        Purchase {
            order_id: order_id.to_string(),
            date: date(day),
            sales,
            product_id: product_id.to_string(),
            member_id: None,
            channel: "1".to_string(),
            brand_id: None,
            category_id: None,
            business_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::fixtures::*;
    use super::*;

    #[test]
    fn member_orders_view_is_derived_once() {
        let snapshot = Snapshot::new(
            vec![
                order("1", "2024-01-01", "0", 10.0, Some("m1")),
                order("2", "2024-01-01", "0", 20.0, None),
                order("3", "2024-01-02", "7", 30.0, Some("m2")),
            ],
            vec![],
            vec![],
            vec![],
        );
        let ids: Vec<&str> = snapshot.member_orders().iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(snapshot.store_orders().count(), 2);
    }
}
