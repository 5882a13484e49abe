use crate::core::flatten::flatten_report;
use crate::domain::model::{ReportingPeriod, Unit};
use crate::domain::ports::ReportSource;
use crate::domain::table::{AggregatedTable, FlattenedRow, SkippedPeriod};
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};

/// What to do when fetching one period's report fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole aggregation on the first failed period.
    #[default]
    Abort,
    /// Record the period as skipped and continue. Authentication failures still abort.
    Skip,
}

/// Result of fetching and flattening a single period.
#[derive(Debug)]
pub enum PeriodOutcome {
    Fetched(FlattenedRow),
    Failed {
        period: ReportingPeriod,
        error: EtlError,
    },
}

/// Builds the historical quarterly table: for each unit, discover its
/// periods, then fetch and flatten each period's report. Requests run one at
/// a time, units in the given order and periods in source order.
pub struct HistoricalReportAggregator<S: ReportSource> {
    source: S,
    policy: FailurePolicy,
}

impl<S: ReportSource> HistoricalReportAggregator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn discover_periods(&self, unit: &Unit) -> Result<Vec<ReportingPeriod>> {
        tracing::info!("Getting available quarters for {}", unit);
        let periods = self.source.available_periods(unit).await?;
        tracing::debug!(
            "{} has {} reporting periods: {:?}",
            unit.name(),
            periods.len(),
            periods.iter().map(|p| p.to_string()).collect::<Vec<_>>()
        );
        Ok(periods)
    }

    pub async fn fetch_period(&self, unit: &Unit, period: ReportingPeriod) -> PeriodOutcome {
        match self.source.quarterly_report(unit, &period).await {
            Ok(report) => PeriodOutcome::Fetched(flatten_report(&report, unit, &period)),
            Err(error) => PeriodOutcome::Failed { period, error },
        }
    }

    async fn collect_unit(&self, unit: &Unit, table: &mut AggregatedTable) -> Result<()> {
        let periods = self.discover_periods(unit).await?;

        for period in periods {
            match self.fetch_period(unit, period).await {
                PeriodOutcome::Fetched(row) => table.push(row),
                PeriodOutcome::Failed { period, error } => {
                    let fatal = matches!(error, EtlError::AuthenticationError { .. });
                    if self.policy == FailurePolicy::Abort || fatal {
                        tracing::error!(
                            "Failed to fetch {} for {}: {}",
                            period,
                            unit.name(),
                            error
                        );
                        return Err(error);
                    }
                    tracing::warn!("Skipping {} for {}: {}", period, unit.name(), error);
                    table.skipped.push(SkippedPeriod {
                        unit: unit.clone(),
                        period,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub async fn aggregate(&self, units: &[Unit]) -> Result<AggregatedTable> {
        let mut table = AggregatedTable::new();

        for unit in units {
            let before = table.len();
            self.collect_unit(unit, &mut table).await?;
            tracing::info!("📥 {}: {} quarterly rows", unit.name(), table.len() - before);
        }

        if !table.skipped.is_empty() {
            tracing::warn!("{} periods were skipped", table.skipped.len());
        }
        Ok(table)
    }
}
