pub mod config;
pub mod model;
pub mod pipeline;
mod run;
pub mod store;
pub mod table;

pub use config::{InvalidTenant, Settings};
pub use pipeline::{MetricStep, Pipeline, RunReport, TableReport};
pub use run::run_tenant;
