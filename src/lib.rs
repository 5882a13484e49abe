pub mod adapters;
pub mod analytics;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{http::LcrClient, storage::LocalStorage};
pub use app::pipelines::{AnalyzePipeline, ReportPipeline};
pub use config::{Profile, UnitRegistry};
pub use core::{aggregator::HistoricalReportAggregator, etl::EtlEngine};
pub use utils::error::{EtlError, Result};
