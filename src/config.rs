use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;

/// Path of the JSON settings file.
pub const CONFIG_ENV: &str = "TENANT_METRICS_CONFIG";
/// Overrides `database_url` from the settings file.
pub const DATABASE_URL_ENV: &str = "TENANT_METRICS_DATABASE_URL";

const TENANT_PLACEHOLDER: &str = "{tenant}";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP trigger listens on.
    pub listen: String,
    /// Connection string template; `{tenant}` is replaced by the tenant id.
    pub database_url: String,
    pub source_schema: String,
    pub metric_schema: String,
    pub pipeline: Pipeline,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listen: "0.0.0.0:8080".to_string(),
            database_url: "postgres://postgres@localhost/{tenant}".to_string(),
            source_schema: "info".to_string(),
            metric_schema: "metric".to_string(),
            pipeline: Pipeline::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTenant(pub String);

impl fmt::Display for InvalidTenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid tenant id {:?}", self.0)
    }
}

impl std::error::Error for InvalidTenant {}

impl Settings {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let settings: Settings = serde_json::from_value(value).context("parsing settings")?;
        settings.pipeline.validate()?;
        Ok(settings)
    }

    /// Reads the settings file, if any, then applies environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut settings = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Settings::load(Path::new(&path))?,
            None => Settings::default(),
        };
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            settings.database_url = url;
        }
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Settings::from_json(value)
    }

    /// Connection string of one tenant.
    pub fn database_url(&self, tenant: &str) -> Result<String, InvalidTenant> {
        let valid = !tenant.is_empty()
            && tenant
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(InvalidTenant(tenant.to_string()));
        }
        Ok(self.database_url.replace(TENANT_PLACEHOLDER, tenant))
    }
}
