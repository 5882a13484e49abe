pub mod aggregator;
pub mod etl;
pub mod flatten;
pub mod metrics;

pub use crate::domain::model::{Report, ReportingPeriod, Unit};
pub use crate::domain::ports::{ConfigProvider, Pipeline, ReportSource, Storage};
pub use crate::domain::table::{AggregatedTable, FlattenedRow};
pub use crate::utils::error::Result;
