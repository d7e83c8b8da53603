use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};

pub const DATA_DIR_ENV: &str = "RISKDASH_DATA_DIR";
pub const PERIOD_ENV: &str = "RISKDASH_PERIOD";
pub const BIND_ENV: &str = "RISKDASH_BIND";

/// Runtime settings for one dashboard build.
///
/// Every field has a default matching the layout of the risk dump export, so
/// an empty TOML file (or no file at all) yields a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub period: String,
    pub currency: String,
    pub datasets: DatasetFiles,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetFiles {
    pub loans: String,
    pub installments: String,
    pub verifications: String,
    pub orders: String,
    pub missed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("risk_dumps"),
            period: "current_month".to_string(),
            currency: "QAR".to_string(),
            datasets: DatasetFiles::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for DatasetFiles {
    fn default() -> Self {
        Self {
            loans: "historical_loans_PL.csv".to_string(),
            installments: "PL_Installments_Report_daily.csv".to_string(),
            verifications: "verifications_PL.csv".to_string(),
            orders: "healthy_book.csv".to_string(),
            missed: "PL_Missed_Report_daily.csv".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load the configuration from an optional TOML file and apply the
    /// `RISKDASH_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(period) = lookup(PERIOD_ENV) {
            self.period = period;
        }
        if let Some(bind) = lookup(BIND_ENV) {
            self.server.bind = bind;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.period.trim().is_empty() {
            return Err(DashboardError::InvalidConfig(
                "reporting period must not be empty".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(DashboardError::InvalidConfig(
                "data_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn loans_path(&self) -> PathBuf {
        self.data_dir.join(&self.datasets.loans)
    }

    pub fn installments_path(&self) -> PathBuf {
        self.data_dir.join(&self.datasets.installments)
    }

    pub fn verifications_path(&self) -> PathBuf {
        self.data_dir.join(&self.datasets.verifications)
    }

    pub fn orders_path(&self) -> PathBuf {
        self.data_dir.join(&self.datasets.orders)
    }

    pub fn missed_path(&self) -> PathBuf {
        self.data_dir.join(&self.datasets.missed)
    }
}
