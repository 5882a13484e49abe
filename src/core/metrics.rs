use crate::domain::table::{potential_column, AggregatedTable, FlattenedRow};
use serde::{Deserialize, Serialize};

pub const SACRAMENT_ATTENDANCE: &str = "sacrament.attendance";
pub const MELCH_ATTENDING: &str = "melch.attending";
pub const ADULT_MALE_MELCH: &str = "adult.male.melch";
pub const WOMEN_ATTENDING: &str = "women.attending.meetings";
pub const YOUNG_MEN_ATTENDING: &str = "young.men.attending";
pub const YOUNG_WOMEN_ATTENDING: &str = "young.women.attending";
pub const CHILDREN_ATTENDING: &str = "children.attending.primary.2019.1";
pub const MEMBERS_SUBMITTING_NAMES: &str = "members.submitting.names";
pub const TOTAL_MEMBERS: &str = "total.members";
pub const MELCH_NOT_ATTENDING: &str = "melch.not.attending";

/// A column computed from the flattened report columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DerivedMetric {
    /// Sum of actual values over sum of potential values of `columns`.
    Ratio { name: String, columns: Vec<String> },
    /// `minuend - subtrahend`, both actual values.
    Difference {
        name: String,
        minuend: String,
        subtrahend: String,
    },
}

impl DerivedMetric {
    pub fn ratio(name: &str, columns: &[&str]) -> Self {
        DerivedMetric::Ratio {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DerivedMetric::Ratio { name, .. } | DerivedMetric::Difference { name, .. } => name,
        }
    }

    /// Absent when an input is absent, the denominator is zero, or the
    /// result is not finite.
    pub fn compute(&self, row: &FlattenedRow) -> Option<f64> {
        let value = match self {
            DerivedMetric::Ratio { columns, .. } => {
                let actual = sum_values(row, columns)?;
                let potential = sum_values(row, columns.iter().map(|c| potential_column(c)))?;
                if potential == 0.0 {
                    return None;
                }
                actual / potential
            }
            DerivedMetric::Difference {
                minuend,
                subtrahend,
                ..
            } => row.value(minuend)? - row.value(subtrahend)?,
        };
        value.is_finite().then_some(value)
    }
}

fn sum_values<I>(row: &FlattenedRow, columns: I) -> Option<f64>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut total = 0.0;
    for column in columns {
        total += row.value(column.as_ref())?;
    }
    Some(total)
}

/// Attendance fractions and the Melchizedek non-attendance count.
pub fn default_metrics() -> Vec<DerivedMetric> {
    vec![
        DerivedMetric::ratio("sacrament.attendance.pct", &[SACRAMENT_ATTENDANCE]),
        DerivedMetric::ratio("adults.attending.pct", &[MELCH_ATTENDING, WOMEN_ATTENDING]),
        DerivedMetric::ratio(
            "youth.attending.pct",
            &[YOUNG_MEN_ATTENDING, YOUNG_WOMEN_ATTENDING],
        ),
        DerivedMetric::ratio("children.attending.pct", &[CHILDREN_ATTENDING]),
        DerivedMetric::ratio("names.submitted.pct", &[MEMBERS_SUBMITTING_NAMES]),
        DerivedMetric::Difference {
            name: MELCH_NOT_ATTENDING.to_string(),
            minuend: ADULT_MALE_MELCH.to_string(),
            subtrahend: MELCH_ATTENDING.to_string(),
        },
    ]
}

pub fn apply_metrics(table: &mut AggregatedTable, metrics: &[DerivedMetric]) {
    for metric in metrics {
        table.add_column(metric.name(), |row| metric.compute(row));
        let filled = table
            .rows()
            .iter()
            .filter(|row| row.value(metric.name()).is_some())
            .count();
        tracing::debug!(
            "Derived '{}' for {}/{} rows",
            metric.name(),
            filled,
            table.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ReportingPeriod, Unit};

    fn row(values: &[(&str, Option<f64>)]) -> FlattenedRow {
        let unit = Unit::new("Oak Hills", 123).unwrap();
        let mut row = FlattenedRow::new(&unit, &ReportingPeriod::new(2024, 1).unwrap());
        for (column, value) in values {
            row.set(column, *value);
        }
        row
    }

    #[test]
    fn test_ratio_of_single_column() {
        let r = row(&[
            ("sacrament.attendance", Some(120.0)),
            ("sacrament.attendance.potential", Some(240.0)),
        ]);
        let metric = DerivedMetric::ratio("sacrament.attendance.pct", &[SACRAMENT_ATTENDANCE]);
        assert_eq!(metric.compute(&r), Some(0.5));
    }

    #[test]
    fn test_combined_ratio_sums_before_dividing() {
        let r = row(&[
            ("melch.attending", Some(20.0)),
            ("melch.attending.potential", Some(40.0)),
            ("women.attending.meetings", Some(40.0)),
            ("women.attending.meetings.potential", Some(60.0)),
        ]);
        let metric = DerivedMetric::ratio("adults", &[MELCH_ATTENDING, WOMEN_ATTENDING]);
        assert_eq!(metric.compute(&r), Some(0.6));
    }

    #[test]
    fn test_zero_or_absent_potential_is_absent() {
        let zero = row(&[
            ("children.attending.primary.2019.1", Some(0.0)),
            ("children.attending.primary.2019.1.potential", Some(0.0)),
        ]);
        let missing = row(&[("children.attending.primary.2019.1", Some(3.0))]);
        let metric = DerivedMetric::ratio("children", &[CHILDREN_ATTENDING]);

        assert_eq!(metric.compute(&zero), None);
        assert_eq!(metric.compute(&missing), None);
        assert_eq!(metric.compute(&row(&[])), None);
    }

    #[test]
    fn test_difference_metric() {
        let r = row(&[("adult.male.melch", Some(45.0)), ("melch.attending", Some(18.0))]);
        let metric = default_metrics()
            .into_iter()
            .find(|m| m.name() == MELCH_NOT_ATTENDING)
            .unwrap();
        assert_eq!(metric.compute(&r), Some(27.0));
    }

    #[test]
    fn test_apply_metrics_adds_every_column() {
        let mut table = AggregatedTable::new();
        table.push(row(&[
            ("sacrament.attendance", Some(100.0)),
            ("sacrament.attendance.potential", Some(0.0)),
        ]));
        table.push(row(&[
            ("sacrament.attendance", Some(100.0)),
            ("sacrament.attendance.potential", Some(200.0)),
        ]));

        apply_metrics(&mut table, &default_metrics());

        for metric in default_metrics() {
            assert!(table.has_column(metric.name()));
        }
        assert_eq!(table.rows()[0].value("sacrament.attendance.pct"), None);
        assert_eq!(table.rows()[1].value("sacrament.attendance.pct"), Some(0.5));
    }

    #[test]
    fn test_metrics_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            metrics: Vec<DerivedMetric>,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
[[metrics]]
kind = "ratio"
name = "ym.pct"
columns = ["young.men.attending"]

[[metrics]]
kind = "difference"
name = "gap"
minuend = "a"
subtrahend = "b"
"#,
        )
        .unwrap();

        assert_eq!(parsed.metrics[0], DerivedMetric::ratio("ym.pct", &[YOUNG_MEN_ATTENDING]));
        assert_eq!(parsed.metrics[1].name(), "gap");
    }
}
