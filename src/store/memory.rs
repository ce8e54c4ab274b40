use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::model::{Member, MemberCount, Order, Purchase};
use crate::pipeline::metrics::REVENUE_OVERVIEW;
use crate::store::{Sink, Source};
use crate::table::{Cell, Table};

/// Store kept entirely in memory, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub orders: Vec<Order>,
    pub members: Vec<Member>,
    pub purchases: Vec<Purchase>,
    pub products: Vec<String>,
    pub numeric_member_ids: bool,
    failing_table: Option<String>,
    tables: Mutex<BTreeMap<String, Table>>,
}

impl MemoryStore {
    pub fn new(
        orders: Vec<Order>,
        members: Vec<Member>,
        purchases: Vec<Purchase>,
        products: Vec<String>,
    ) -> Self {
        MemoryStore {
            orders,
            members,
            purchases,
            products,
            ..Default::default()
        }
    }

    /// Makes every write to `name` fail, to exercise aborted runs.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing_table = Some(name.to_string());
        self
    }

    pub fn table(&self, name: &str) -> Option<Table> {
        self.tables.lock().ok()?.get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .lock()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Source for MemoryStore {
    async fn load_orders(&self) -> Result<Vec<Order>> {
        Ok(self.orders.clone())
    }

    async fn load_members(&self) -> Result<Vec<Member>> {
        Ok(self.members.clone())
    }

    async fn load_purchases(&self) -> Result<Vec<Purchase>> {
        Ok(self.purchases.clone())
    }

    async fn load_products(&self) -> Result<Vec<String>> {
        Ok(self.products.clone())
    }

    async fn member_ids_numeric(&self) -> Result<bool> {
        Ok(self.numeric_member_ids)
    }

    async fn read_member_counts(&self) -> Result<Vec<MemberCount>> {
        let overview = self
            .table(REVENUE_OVERVIEW)
            .ok_or_else(|| anyhow!("{REVENUE_OVERVIEW} has not been written yet"))?;
        let mut counts = Vec::new();
        for row in overview.project(&["date", "channel", "member_count"]) {
            match (
                row.first().and_then(Cell::as_date),
                row.get(1).and_then(Cell::as_str),
                row.get(2).and_then(Cell::as_int),
            ) {
                (Some(date), Some(channel), Some(member_count)) => counts.push(MemberCount {
                    date,
                    channel: channel.to_string(),
                    member_count,
                }),
                _ => continue,
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl Sink for MemoryStore {
    async fn write_full(&self, table: &Table) -> Result<()> {
        if self.failing_table.as_deref() == Some(table.name.as_str()) {
            bail!("writing {} failed", table.name);
        }
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        tables.insert(table.name.clone(), table.clone());
        Ok(())
    }
}
