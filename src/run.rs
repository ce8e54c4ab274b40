use anyhow::{Context, Result};
use tokio_postgres::NoTls;
use tracing::{error, info, info_span, Instrument};

use crate::config::Settings;
use crate::pipeline::RunReport;
use crate::store::PgStore;

/// Runs the configured pipeline for one tenant inside a single transaction.
///
/// Nothing is committed unless every load and write succeeds.
pub async fn run_tenant(settings: &Settings, tenant: &str) -> Result<RunReport> {
    let url = settings.database_url(tenant)?;
    async move {
        let (mut client, connection) = tokio_postgres::connect(&url, NoTls)
            .await
            .with_context(|| format!("connecting to the database of tenant {tenant}"))?;
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                error!(%error, "database connection failed");
            }
        });

        let tx = client.transaction().await.context("opening transaction")?;
        let store = PgStore::new(tx, &settings.source_schema, &settings.metric_schema);
        let report = settings.pipeline.run(&store).await?;
        store.commit().await?;
        info!(tables = report.tables.len(), "metrics committed");
        Ok(report)
    }
    .instrument(info_span!("metrics_run", tenant))
    .await
}
