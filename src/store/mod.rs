pub(crate) mod memory;
pub use memory::MemoryStore;
pub(crate) mod postgres;
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Member, MemberCount, Order, Purchase};
use crate::table::Table;

/// Read side of a metrics run: the raw datasets plus read-back of earlier outputs.
#[async_trait]
pub trait Source: Send + Sync {
    async fn load_orders(&self) -> Result<Vec<Order>>;

    /// Active members only.
    async fn load_members(&self) -> Result<Vec<Member>>;

    /// Line items joined to the product catalog; catalog ids stay `None` when the product is unknown.
    async fn load_purchases(&self) -> Result<Vec<Purchase>>;

    /// Distinct product ids of the catalog.
    async fn load_products(&self) -> Result<Vec<String>>;

    /// Whether member ids are stored as integers rather than text.
    async fn member_ids_numeric(&self) -> Result<bool>;

    /// Cumulative member counts from the already written revenue overview.
    async fn read_member_counts(&self) -> Result<Vec<MemberCount>>;
}

/// Write side of a metrics run.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Replaces the whole content of `table.name` with `table.rows`.
    async fn write_full(&self, table: &Table) -> Result<()>;
}
