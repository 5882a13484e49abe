use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A reporting unit (ward, branch or stake) as listed in the unit registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawUnit")]
pub struct Unit {
    name: String,
    number: u32,
}

#[derive(Deserialize)]
struct RawUnit {
    name: String,
    number: i64,
}

impl TryFrom<RawUnit> for Unit {
    type Error = EtlError;

    fn try_from(raw: RawUnit) -> Result<Self> {
        let number = u32::try_from(raw.number).map_err(|_| EtlError::InvalidUnitError {
            reason: format!("unit number {} for '{}' is out of range", raw.number, raw.name),
        })?;
        Unit::new(raw.name, number)
    }
}

impl Unit {
    pub fn new(name: impl Into<String>, number: u32) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EtlError::InvalidUnitError {
                reason: format!("unit {} has an empty name", number),
            });
        }
        if number == 0 {
            return Err(EtlError::InvalidUnitError {
                reason: format!("unit '{}' must have a positive number", name),
            });
        }
        Ok(Self { name, number })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit(Name: {}, Number: {})", self.name, self.number)
    }
}

/// One quarter of one year.
///
/// The portal lists periods as `2024-1`; the table and charts label them `2024-Q1`.
/// Both forms parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportingPeriod {
    year: i32,
    quarter: u8,
}

impl ReportingPeriod {
    pub fn new(year: i32, quarter: u8) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(EtlError::InvalidPeriodError {
                value: format!("{}-{}", year, quarter),
                reason: "quarter must be between 1 and 4".to_string(),
            });
        }
        Ok(Self { year, quarter })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u8 {
        self.quarter
    }
}

impl FromStr for ReportingPeriod {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| EtlError::InvalidPeriodError {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (year, quarter) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| invalid("expected YEAR-QUARTER"))?;
        let quarter = quarter
            .strip_prefix('Q')
            .or_else(|| quarter.strip_prefix('q'))
            .unwrap_or(quarter);

        let year: i32 = year.parse().map_err(|_| invalid("year is not an integer"))?;
        let quarter: u8 = quarter
            .parse()
            .map_err(|_| invalid("quarter is not an integer"))?;

        ReportingPeriod::new(year, quarter).map_err(|_| invalid("quarter must be between 1 and 4"))
    }
}

impl TryFrom<String> for ReportingPeriod {
    type Error = EtlError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ReportingPeriod> for String {
    fn from(period: ReportingPeriod) -> Self {
        period.to_string()
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}

/// Quarterly report body as returned by the portal. Only the parts the
/// flattener reads are modelled; everything else in the payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub sections: Vec<ReportSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    #[serde(default)]
    pub name_resource_id: Option<String>,
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub name_resource_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub actual_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub potential_value: Option<f64>,
}

impl ReportRow {
    pub fn new(id: &str, actual: f64, potential: f64) -> Self {
        Self {
            name_resource_id: Some(id.to_string()),
            actual_value: Some(actual),
            potential_value: Some(potential),
        }
    }
}

// Values arrive as numbers, numeric strings, or null depending on the row.
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parses_portal_form() {
        let period: ReportingPeriod = "2024-1".parse().unwrap();
        assert_eq!(period.year(), 2024);
        assert_eq!(period.quarter(), 1);
        assert_eq!(period.to_string(), "2024-Q1");
    }

    #[test]
    fn test_period_label_round_trip() {
        for label in ["2019-Q1", "2022-Q2", "2023-Q3", "2024-Q4"] {
            let period: ReportingPeriod = label.parse().unwrap();
            assert_eq!(period.to_string(), label);
        }
    }

    #[test]
    fn test_period_rejects_bad_input() {
        assert!("2024-Q5".parse::<ReportingPeriod>().is_err());
        assert!("2024-0".parse::<ReportingPeriod>().is_err());
        assert!("2024".parse::<ReportingPeriod>().is_err());
        assert!("year-Q1".parse::<ReportingPeriod>().is_err());
        assert!(ReportingPeriod::new(2024, 7).is_err());
    }

    #[test]
    fn test_period_deserializes_from_json_list() {
        let periods: Vec<ReportingPeriod> =
            serde_json::from_value(serde_json::json!(["2024-2", "2024-1"])).unwrap();
        assert_eq!(periods[0], ReportingPeriod::new(2024, 2).unwrap());
        assert_eq!(periods[1], ReportingPeriod::new(2024, 1).unwrap());
    }

    #[test]
    fn test_unit_rejects_invalid_input() {
        assert!(Unit::new("Oak Hills", 123).is_ok());
        assert!(Unit::new("", 123).is_err());
        assert!(Unit::new("Oak Hills", 0).is_err());

        let negative =
            serde_json::from_value::<Unit>(serde_json::json!({"name": "Oak Hills", "number": -4}));
        assert!(negative.is_err());
        let text =
            serde_json::from_value::<Unit>(serde_json::json!({"name": "Oak Hills", "number": "123"}));
        assert!(text.is_err());
    }

    #[test]
    fn test_report_tolerates_partial_rows() {
        let report: Report = serde_json::from_value(serde_json::json!({
            "sections": [
                {"nameResourceId": "membership", "rows": [
                    {"nameResourceId": "total.members", "actualValue": 250, "potentialValue": "300"},
                    {"nameResourceId": "new.members", "actualValue": null}
                ]},
                {"nameResourceId": "empty"}
            ]
        }))
        .unwrap();

        let rows = &report.sections[0].rows;
        assert_eq!(rows[0].actual_value, Some(250.0));
        assert_eq!(rows[0].potential_value, Some(300.0));
        assert_eq!(rows[1].actual_value, None);
        assert_eq!(rows[1].potential_value, None);
        assert!(report.sections[1].rows.is_empty());
    }
}
