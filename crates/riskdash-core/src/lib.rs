pub mod aggregate;
pub mod charts;
pub mod config;
pub mod error;
pub mod html;
pub mod loader;
pub mod metrics;
pub mod report;

pub use config::{DashboardConfig, DatasetFiles, ServerConfig};
pub use error::{DashboardError, Result};
pub use report::{Dashboard, DashboardData};
