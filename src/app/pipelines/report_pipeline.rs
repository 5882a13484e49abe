use crate::analytics::{build_chart_bundle, ChartBundle};
use crate::core::aggregator::HistoricalReportAggregator;
use crate::core::metrics::apply_metrics;
use crate::domain::model::Unit;
use crate::domain::ports::{ConfigProvider, Pipeline, ReportSource, Storage};
use crate::domain::table::AggregatedTable;
use crate::utils::error::Result;
use std::io::Write;
use std::path::Path;
use zip::write::{SimpleFileOptions, ZipWriter};

/// The aggregated table with derived metrics, ready to be written.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub table: AggregatedTable,
    pub csv_output: String,
    pub charts: Option<ChartBundle>,
}

/// `Oak Hills Stake.csv` -> `Oak Hills Stake.charts.json`
pub fn charts_filename(csv_filename: &str) -> String {
    let stem = Path::new(csv_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(csv_filename);
    format!("{}.charts.json", stem)
}

pub(crate) fn build_output<C: ConfigProvider>(
    config: &C,
    mut table: AggregatedTable,
) -> Result<ReportOutput> {
    apply_metrics(&mut table, config.metrics());
    let csv_output = table.to_csv_string()?;
    let charts = config
        .charts_enabled()
        .then(|| build_chart_bundle(&table, config.report_title(), config.start_year()));

    Ok(ReportOutput {
        table,
        csv_output,
        charts,
    })
}

/// Writes the given files, either loose or bundled into the configured archive.
/// Returns the path of the main artifact.
pub(crate) async fn write_outputs<S: Storage, C: ConfigProvider>(
    storage: &S,
    config: &C,
    files: Vec<(String, Vec<u8>)>,
) -> Result<String> {
    if let Some(archive) = config.archive_filename() {
        tracing::debug!("Creating ZIP file with {} files", files.len());

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &files {
                zip.start_file(name.as_str(), SimpleFileOptions::default())?;
                zip.write_all(data)?;
            }
            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        storage.write_file(archive, &zip_data).await?;
        return Ok(format!("{}/{}", config.output_path(), archive));
    }

    let mut primary = None;
    for (name, data) in &files {
        storage.write_file(name, data).await?;
        primary.get_or_insert_with(|| name.clone());
    }
    Ok(format!(
        "{}/{}",
        config.output_path(),
        primary.unwrap_or_default()
    ))
}

/// Downloads the quarterly history for every unit and writes the table
/// (and chart data) to storage.
pub struct ReportPipeline<R: ReportSource, S: Storage, C: ConfigProvider> {
    aggregator: HistoricalReportAggregator<R>,
    units: Vec<Unit>,
    storage: S,
    config: C,
}

impl<R: ReportSource, S: Storage, C: ConfigProvider> ReportPipeline<R, S, C> {
    pub fn new(
        aggregator: HistoricalReportAggregator<R>,
        units: Vec<Unit>,
        storage: S,
        config: C,
    ) -> Self {
        Self {
            aggregator,
            units,
            storage,
            config,
        }
    }
}

#[async_trait::async_trait]
impl<R: ReportSource, S: Storage, C: ConfigProvider> Pipeline for ReportPipeline<R, S, C> {
    type Output = ReportOutput;

    async fn extract(&self) -> Result<AggregatedTable> {
        tracing::info!("📡 Downloading quarterly reports for {} units", self.units.len());
        self.aggregator.aggregate(&self.units).await
    }

    async fn transform(&self, table: AggregatedTable) -> Result<ReportOutput> {
        build_output(&self.config, table)
    }

    async fn load(&self, result: ReportOutput) -> Result<String> {
        let csv_filename = self.config.output_filename();
        let mut files = vec![(csv_filename.clone(), result.csv_output.into_bytes())];
        if let Some(charts) = &result.charts {
            files.push((charts_filename(&csv_filename), serde_json::to_vec_pretty(charts)?));
        }
        write_outputs(&self.storage, &self.config, files).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::{default_metrics, DerivedMetric};
    use crate::domain::model::{Report, ReportRow, ReportSection, ReportingPeriod};
    use crate::utils::error::EtlError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        metrics: Vec<DerivedMetric>,
        charts: bool,
        archive: Option<String>,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                metrics: default_metrics(),
                charts: true,
                archive: None,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn report_title(&self) -> &str {
            "Oak Hills Stake"
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn output_filename(&self) -> String {
            "Oak Hills Stake.csv".to_string()
        }

        fn start_year(&self) -> i32 {
            2022
        }

        fn metrics(&self) -> &[DerivedMetric] {
            &self.metrics
        }

        fn charts_enabled(&self) -> bool {
            self.charts
        }

        fn archive_filename(&self) -> Option<&str> {
            self.archive.as_deref()
        }
    }

    struct OnePeriodSource;

    #[async_trait]
    impl ReportSource for OnePeriodSource {
        async fn available_periods(&self, _unit: &Unit) -> Result<Vec<ReportingPeriod>> {
            Ok(vec![ReportingPeriod::new(2024, 1)?])
        }

        async fn quarterly_report(
            &self,
            _unit: &Unit,
            _period: &ReportingPeriod,
        ) -> Result<Report> {
            Ok(Report {
                sections: vec![ReportSection {
                    name_resource_id: Some("attendance".to_string()),
                    rows: vec![
                        ReportRow::new("total.members", 250.0, 300.0),
                        ReportRow::new("sacrament.attendance", 100.0, 250.0),
                    ],
                }],
            })
        }
    }

    fn pipeline(
        storage: MockStorage,
        config: MockConfig,
    ) -> ReportPipeline<OnePeriodSource, MockStorage, MockConfig> {
        ReportPipeline::new(
            HistoricalReportAggregator::new(OnePeriodSource),
            vec![Unit::new("Oak Hills", 123).unwrap()],
            storage,
            config,
        )
    }

    #[test]
    fn test_charts_filename() {
        assert_eq!(charts_filename("Oak Hills Stake.csv"), "Oak Hills Stake.charts.json");
        assert_eq!(charts_filename("report"), "report.charts.json");
    }

    #[tokio::test]
    async fn test_transform_adds_metric_columns() {
        let storage = MockStorage::new();
        let p = pipeline(storage, MockConfig::new());

        let table = p.extract().await.unwrap();
        let output = p.transform(table).await.unwrap();

        assert_eq!(output.table.rows()[0].value("sacrament.attendance.pct"), Some(0.4));
        let header = output.csv_output.lines().next().unwrap();
        assert!(header.starts_with(
            "year,quarter.num,quarter,unitId,unitName,total.members,total.members.potential"
        ));
        assert!(header.ends_with("melch.not.attending"));
        assert!(output.charts.is_some());
    }

    #[tokio::test]
    async fn test_load_writes_csv_and_charts() {
        let storage = MockStorage::new();
        let p = pipeline(storage.clone(), MockConfig::new());

        let table = p.extract().await.unwrap();
        let output = p.transform(table).await.unwrap();
        let path = p.load(output).await.unwrap();

        assert_eq!(path, "test_output/Oak Hills Stake.csv");
        let csv_bytes = storage.get_file("Oak Hills Stake.csv").await.unwrap();
        let csv = String::from_utf8(csv_bytes).unwrap();
        assert!(csv.contains("2024,1,2024-Q1,123,Oak Hills,250,300,100,250,0.4"));

        let charts_bytes = storage.get_file("Oak Hills Stake.charts.json").await.unwrap();
        let charts: serde_json::Value = serde_json::from_slice(&charts_bytes).unwrap();
        assert_eq!(charts["overview"]["title"], "Oak Hills Stake");
    }

    #[tokio::test]
    async fn test_load_without_charts() {
        let storage = MockStorage::new();
        let mut config = MockConfig::new();
        config.charts = false;
        let p = pipeline(storage.clone(), config);

        let table = p.extract().await.unwrap();
        let output = p.transform(table).await.unwrap();
        p.load(output).await.unwrap();

        assert!(storage.get_file("Oak Hills Stake.charts.json").await.is_none());
        assert!(storage.get_file("Oak Hills Stake.csv").await.is_some());
    }

    #[tokio::test]
    async fn test_load_into_archive() {
        let storage = MockStorage::new();
        let mut config = MockConfig::new();
        config.archive = Some("bundle.zip".to_string());
        let p = pipeline(storage.clone(), config);

        let table = p.extract().await.unwrap();
        let output = p.transform(table).await.unwrap();
        let path = p.load(output).await.unwrap();

        assert_eq!(path, "test_output/bundle.zip");
        let zip_bytes = storage.get_file("bundle.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();

        let mut file_names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        file_names.sort();
        assert_eq!(file_names, vec!["Oak Hills Stake.charts.json", "Oak Hills Stake.csv"]);
    }
}
