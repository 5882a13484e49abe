use crate::core::metrics::DerivedMetric;
use crate::domain::model::{Report, ReportingPeriod, Unit};
use crate::domain::table::AggregatedTable;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Output and analytics settings the report pipeline reads.
pub trait ConfigProvider: Send + Sync {
    fn report_title(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_filename(&self) -> String;
    fn start_year(&self) -> i32;
    fn metrics(&self) -> &[DerivedMetric];
    fn charts_enabled(&self) -> bool;
    /// Bundle the outputs into this zip archive instead of writing loose files.
    fn archive_filename(&self) -> Option<&str>;
}

/// Where quarterly reports come from. Implemented by the portal client and by
/// in-memory fakes in tests.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Periods for which the unit has a quarterly report, in source order.
    async fn available_periods(&self, unit: &Unit) -> Result<Vec<ReportingPeriod>>;

    async fn quarterly_report(&self, unit: &Unit, period: &ReportingPeriod) -> Result<Report>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Output: Send;

    async fn extract(&self) -> Result<AggregatedTable>;
    async fn transform(&self, table: AggregatedTable) -> Result<Self::Output>;
    async fn load(&self, result: Self::Output) -> Result<String>;
}
