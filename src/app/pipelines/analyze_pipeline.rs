use crate::app::pipelines::report_pipeline::{
    build_output, charts_filename, write_outputs, ReportOutput,
};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::domain::table::AggregatedTable;
use crate::utils::error::{EtlError, Result};

/// Rebuilds metrics and chart data from a previously downloaded CSV without
/// touching the portal.
pub struct AnalyzePipeline<S: Storage, C: ConfigProvider> {
    input: String,
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> AnalyzePipeline<S, C> {
    /// `input` is a path inside `storage`.
    pub fn new(input: String, storage: S, config: C) -> Self {
        Self {
            input,
            storage,
            config,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for AnalyzePipeline<S, C> {
    type Output = ReportOutput;

    async fn extract(&self) -> Result<AggregatedTable> {
        tracing::info!("📂 Reading {}", self.input);
        let data = self.storage.read_file(&self.input).await?;
        AggregatedTable::read_csv(data.as_slice())
    }

    async fn transform(&self, table: AggregatedTable) -> Result<ReportOutput> {
        if table.is_empty() {
            return Err(EtlError::ProcessingError {
                message: format!("{} has no rows to analyze", self.input),
            });
        }
        build_output(&self.config, table)
    }

    async fn load(&self, result: ReportOutput) -> Result<String> {
        let charts = result.charts.as_ref().ok_or_else(|| EtlError::ConfigError {
            message: "charts are disabled in the profile (load.charts = false)".to_string(),
        })?;
        let files = vec![(charts_filename(&self.input), serde_json::to_vec_pretty(charts)?)];
        write_outputs(&self.storage, &self.config, files).await
    }
}
