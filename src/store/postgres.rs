use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Transaction};
use tracing::{debug, info};

use crate::model::{Member, MemberCount, Order, Purchase};
use crate::pipeline::metrics::REVENUE_OVERVIEW;
use crate::store::{Sink, Source};
use crate::table::{Column, Kind, Table};

// Postgres caps a statement at 65535 bind parameters.
const MAX_PARAMETERS: usize = u16::MAX as usize;
const MAX_ROWS_PER_INSERT: usize = 1000;
const INTEGER_TYPES: [&str; 3] = ["smallint", "integer", "bigint"];

/// Source and sink bound to one open transaction, so a run commits or rolls back as a whole.
pub struct PgStore<'t> {
    tx: Transaction<'t>,
    source_schema: String,
    metric_schema: String,
}

impl<'t> PgStore<'t> {
    pub fn new(tx: Transaction<'t>, source_schema: &str, metric_schema: &str) -> Self {
        PgStore {
            tx,
            source_schema: quote_ident(source_schema),
            metric_schema: quote_ident(metric_schema),
        }
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("committing metrics run")
    }

    async fn query(&self, sql: &str, what: &str) -> Result<Vec<Row>> {
        debug!(sql, "querying {what}");
        self.tx
            .query(sql, &[])
            .await
            .with_context(|| format!("loading {what}"))
    }
}

#[async_trait]
impl Source for PgStore<'_> {
    async fn load_orders(&self) -> Result<Vec<Order>> {
        let sql = orders_sql(&self.source_schema);
        self.query(&sql, "orders")
            .await?
            .iter()
            .map(|row| -> Result<Order> {
                Ok(Order {
                    order_id: row.try_get("order_id")?,
                    date: row.try_get("date")?,
                    time: row.try_get("time")?,
                    channel: row.try_get("website_name")?,
                    is_member: row.try_get::<_, Option<bool>>("is_member")?.unwrap_or(false),
                    revenue: row.try_get::<_, Option<f64>>("revenue")?.unwrap_or(0.0),
                    source: row.try_get("source")?,
                    member_id: row.try_get("member_id")?,
                    city: row.try_get("city")?,
                    region: row.try_get("region")?,
                })
            })
            .collect()
    }

    async fn load_members(&self) -> Result<Vec<Member>> {
        let sql = members_sql(&self.source_schema);
        self.query(&sql, "members")
            .await?
            .iter()
            .map(|row| -> Result<Member> {
                Ok(Member {
                    member_id: row.try_get("member_id")?,
                    city: row.try_get("city")?,
                    region: row.try_get("region")?,
                    register_date: row.try_get("register_date")?,
                    gender: row.try_get("gender")?,
                    birth_date: row.try_get("birth_date")?,
                    channel: row.try_get("website_name")?,
                })
            })
            .collect()
    }

    async fn load_purchases(&self) -> Result<Vec<Purchase>> {
        let sql = purchases_sql(&self.source_schema);
        self.query(&sql, "purchases")
            .await?
            .iter()
            .map(|row| -> Result<Purchase> {
                Ok(Purchase {
                    order_id: row.try_get("order_id")?,
                    date: row.try_get("date")?,
                    sales: row.try_get::<_, Option<f64>>("sales")?.unwrap_or(0.0),
                    product_id: row.try_get("product_id")?,
                    member_id: row.try_get("member_id")?,
                    channel: row.try_get("website_name")?,
                    brand_id: row.try_get("brand_id")?,
                    category_id: row.try_get("category_id")?,
                    business_id: row.try_get("business_id")?,
                })
            })
            .collect()
    }

    async fn load_products(&self) -> Result<Vec<String>> {
        let sql = products_sql(&self.source_schema);
        self.query(&sql, "product catalog")
            .await?
            .iter()
            .map(|row| -> Result<String> { Ok(row.try_get("product_id")?) })
            .collect()
    }

    async fn member_ids_numeric(&self) -> Result<bool> {
        let sql = format!(
            "SELECT pg_typeof(member_id)::text AS id_type FROM {}.member_info LIMIT 1",
            self.source_schema
        );
        let rows = self.query(&sql, "member id type").await?;
        match rows.first() {
            Some(row) => {
                let id_type: String = row.try_get("id_type")?;
                Ok(INTEGER_TYPES.contains(&id_type.as_str()))
            }
            None => Ok(false),
        }
    }

    async fn read_member_counts(&self) -> Result<Vec<MemberCount>> {
        let sql = format!(
            "SELECT date::date AS date, channel::text AS channel, member_count::int8 AS member_count \
             FROM {}.{}",
            self.metric_schema,
            quote_ident(REVENUE_OVERVIEW)
        );
        let mut counts = Vec::new();
        for row in self.query(&sql, "member counts").await? {
            if let Some(member_count) = row.try_get::<_, Option<i64>>("member_count")? {
                counts.push(MemberCount {
                    date: row.try_get("date")?,
                    channel: row.try_get("channel")?,
                    member_count,
                });
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl Sink for PgStore<'_> {
    async fn write_full(&self, table: &Table) -> Result<()> {
        let target = format!("{}.{}", self.metric_schema, quote_ident(&table.name));
        self.tx
            .batch_execute(&format!("TRUNCATE TABLE {target}"))
            .await
            .with_context(|| format!("truncating {target}"))?;

        let width = table.columns.len();
        if width > 0 && !table.is_empty() {
            let rows_per_statement = (MAX_PARAMETERS / width).clamp(1, MAX_ROWS_PER_INSERT);
            for chunk in table.rows.chunks(rows_per_statement) {
                let statement = insert_statement(&target, &table.columns, chunk.len());
                let params = chunk
                    .iter()
                    .flatten()
                    .map(|cell| cell as &(dyn ToSql + Sync))
                    .collect::<Vec<_>>();
                self.tx
                    .execute(&statement, &params)
                    .await
                    .with_context(|| format!("appending to {target}"))?;
            }
        }
        info!(table = %target, rows = table.len(), columns = width, "table replaced");
        Ok(())
    }
}

// Rows missing a key column are skipped at the source rather than failing the run.
fn orders_sql(schema: &str) -> String {
    format!(
        "SELECT order_id::text AS order_id, date::date AS date, time::time AS time, \
         website_name::text AS website_name, is_member, revenue::float8 AS revenue, \
         source::text AS source, member_id::text AS member_id, city::text AS city, \
         region::text AS region \
         FROM {schema}.order_record \
         WHERE order_id IS NOT NULL AND date IS NOT NULL AND website_name IS NOT NULL"
    )
}

fn members_sql(schema: &str) -> String {
    format!(
        "SELECT member_id::text AS member_id, city::text AS city, region::text AS region, \
         register_date::date AS register_date, gender::text AS gender, \
         birth_date::date AS birth_date, website_name::text AS website_name \
         FROM {schema}.member_info \
         WHERE is_member = true AND member_id IS NOT NULL AND website_name IS NOT NULL"
    )
}

fn purchases_sql(schema: &str) -> String {
    format!(
        "SELECT p.order_id::text AS order_id, p.date::date AS date, p.sales::float8 AS sales, \
         p.product_id::text AS product_id, p.member_id::text AS member_id, \
         p.website_name::text AS website_name, b.brand_id::text AS brand_id, \
         b.category_id::text AS category_id, b.business_id::text AS business_id \
         FROM {schema}.purchase_record AS p \
         LEFT JOIN {schema}.product_info AS b ON p.product_id = b.product_id \
         WHERE p.order_id IS NOT NULL AND p.date IS NOT NULL AND p.product_id IS NOT NULL \
         AND p.website_name IS NOT NULL"
    )
}

fn products_sql(schema: &str) -> String {
    format!(
        "SELECT DISTINCT product_id::text AS product_id \
         FROM {schema}.product_info \
         WHERE product_id IS NOT NULL \
         ORDER BY product_id"
    )
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// Numeric parameters are cast explicitly so they also fit NUMERIC columns,
// which have no binary encoding on our side.
fn placeholder(index: usize, kind: Kind) -> String {
    match kind {
        Kind::Int => format!("${index}::int8"),
        Kind::Float => format!("${index}::float8"),
        Kind::Bool | Kind::Text | Kind::Date => format!("${index}"),
    }
}

fn insert_statement(target: &str, columns: &[Column], rows: usize) -> String {
    let width = columns.len();
    let names = columns
        .iter()
        .map(|column| quote_ident(&column.name))
        .collect::<Vec<String>>()
        .join(", ");
    let values = (0..rows)
        .map(|row| {
            let placeholders = columns
                .iter()
                .enumerate()
                .map(|(offset, column)| placeholder(row * width + offset + 1, column.kind))
                .collect::<Vec<String>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<String>>()
        .join(", ");
    format!("INSERT INTO {target} ({names}) VALUES {values}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain("metric", r#""metric""#)]
    #[case::with_quote(r#"we"ird"#, r#""we""ird""#)]
    fn identifiers_are_quoted(#[case] ident: &str, #[case] expected: &str) {
        assert_eq!(quote_ident(ident), expected);
    }

    #[test]
    fn insert_numbers_placeholders_row_major() {
        let table = Table::new("t", [("a", Kind::Text), ("b", Kind::Date)]);
        assert_eq!(
            insert_statement(r#""metric"."t""#, &table.columns, 2),
            r#"INSERT INTO "metric"."t" ("a", "b") VALUES ($1, $2), ($3, $4)"#
        );
    }

    #[rstest]
    #[case::orders(orders_sql(r#""info""#), &["order_id", "date", "website_name"])]
    #[case::members(members_sql(r#""info""#), &["member_id", "website_name"])]
    #[case::purchases(purchases_sql(r#""info""#), &["p.order_id", "p.date", "p.product_id", "p.website_name"])]
    #[case::products(products_sql(r#""info""#), &["product_id"])]
    fn key_columns_are_filtered_for_nulls(#[case] sql: String, #[case] keys: &[&str]) {
        assert!(sql.contains(r#"FROM "info"."#), "{sql}");
        for key in keys {
            assert!(sql.contains(&format!("{key} IS NOT NULL")), "{key} unfiltered in {sql}");
        }
    }

    #[test]
    fn numeric_placeholders_are_cast() {
        let table = Table::new(
            "t",
            [("id", Kind::Text), ("revenue", Kind::Float), ("orders", Kind::Int), ("online", Kind::Bool)],
        );
        assert_eq!(
            insert_statement(r#""metric"."t""#, &table.columns, 1),
            r#"INSERT INTO "metric"."t" ("id", "revenue", "orders", "online") VALUES ($1, $2::float8, $3::int8, $4)"#
        );
    }
}
