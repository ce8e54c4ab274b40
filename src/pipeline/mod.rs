pub(crate) mod aggregate;
pub mod metrics;

use anyhow::{bail, Result};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use aggregate::{aggregate, AggregateMode, Totals};
pub use metrics::{
    DailyMembers, Family, HourlyRevenue, HourlyRevenueStore, MemberOrderInterval,
    MemberRevenueInfo, ProductGroup, ProductSales, RegionRevenue, RevenueOverview, SourceRevenue,
    StoreRevenue,
};

use crate::model::{MemberCount, Snapshot};
use crate::store::{Sink, Source};
use crate::table::Table;

/// What a metric step gets to read.
#[derive(Debug, Clone, Copy)]
pub struct MetricInput<'a> {
    pub snapshot: &'a Snapshot,
    /// Empty unless the step asked for a read-back.
    pub member_counts: &'a [MemberCount],
}

impl<'a> MetricInput<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        MetricInput {
            snapshot,
            member_counts: &[],
        }
    }
}

#[enum_dispatch]
pub trait ToTables {
    fn to_tables(&self, input: &MetricInput<'_>) -> Result<Vec<Table>>;

    /// Whether the step needs the revenue overview written earlier in the same run.
    fn reads_member_counts(&self) -> bool {
        false
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "name", rename_all = "snake_case")]
#[enum_dispatch(ToTables)]
pub enum MetricStep {
    RevenueOverview(RevenueOverview),
    RegionRevenue(RegionRevenue),
    SourceRevenue(SourceRevenue),
    StoreRevenue(StoreRevenue),
    HourlyRevenueStore(HourlyRevenueStore),
    HourlyRevenue(HourlyRevenue),
    MemberRevenueInfo(MemberRevenueInfo),
    MemberOrderInterval(MemberOrderInterval),
    DailyMembers(DailyMembers),
    ProductSales(ProductSales),
    ProductGroup(ProductGroup),
}

/// Ordered metric steps of one run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Pipeline(pub Vec<MetricStep>);

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline(vec![
            RevenueOverview::default().into(),
            RegionRevenue::default().into(),
            SourceRevenue::default().into(),
            StoreRevenue::default().into(),
            HourlyRevenueStore::default().into(),
            HourlyRevenue::default().into(),
            MemberRevenueInfo::default().into(),
            MemberOrderInterval::default().into(),
            DailyMembers::default().into(),
            ProductSales::default().into(),
            ProductGroup::default().into(),
        ])
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub name: String,
    pub rows: usize,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
}

impl Pipeline {
    /// Rejects pipelines where a read-back would see the previous run's revenue overview,
    /// either because `revenue_overview` comes later or because it is missing.
    pub fn validate(&self) -> Result<()> {
        let overview = self
            .0
            .iter()
            .position(|step| matches!(step, MetricStep::RevenueOverview(_)));
        for (position, step) in self.0.iter().enumerate() {
            if !step.reads_member_counts() {
                continue;
            }
            match overview {
                None => bail!("step #{position} reads member counts but the pipeline has no revenue_overview step"),
                Some(overview) if overview > position => {
                    bail!("step #{position} reads member counts before revenue_overview is written")
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Loads the snapshot, then computes and writes every step in order.
    ///
    /// The first failing load, computation or write aborts the run; committing is left to the caller.
    pub async fn run<S: Source + Sink + ?Sized>(&self, store: &S) -> Result<RunReport> {
        let snapshot = Snapshot::load(store).await?;
        let mut report = RunReport::default();
        for step in &self.0 {
            let member_counts = if step.reads_member_counts() {
                store.read_member_counts().await?
            } else {
                Vec::new()
            };
            let input = MetricInput {
                snapshot: &snapshot,
                member_counts: &member_counts,
            };
            debug!(?step, "computing metric");
            for table in step.to_tables(&input)? {
                store.write_full(&table).await?;
                report.tables.push(TableReport {
                    name: table.name.clone(),
                    rows: table.len(),
                });
            }
        }
        info!(tables = report.tables.len(), "metrics run finished");
        Ok(report)
    }
}
