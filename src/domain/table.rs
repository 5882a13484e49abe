use crate::domain::model::{ReportingPeriod, Unit};
use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;
use std::io::{Read, Write};

pub const YEAR_COLUMN: &str = "year";
pub const QUARTER_NUM_COLUMN: &str = "quarter.num";
pub const QUARTER_COLUMN: &str = "quarter";
pub const UNIT_ID_COLUMN: &str = "unitId";
pub const UNIT_NAME_COLUMN: &str = "unitName";

pub const CONTEXT_COLUMNS: [&str; 5] = [
    YEAR_COLUMN,
    QUARTER_NUM_COLUMN,
    QUARTER_COLUMN,
    UNIT_ID_COLUMN,
    UNIT_NAME_COLUMN,
];

pub const POTENTIAL_SUFFIX: &str = ".potential";

pub fn potential_column(resource_id: &str) -> String {
    format!("{}{}", resource_id, POTENTIAL_SUFFIX)
}

/// One (unit, period) row of the wide report table.
///
/// Value columns keep the order in which they were first written. Writing a
/// column again replaces its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedRow {
    pub year: i32,
    pub quarter_num: u8,
    pub quarter: String,
    pub unit_id: u32,
    pub unit_name: String,
    columns: Vec<String>,
    values: HashMap<String, Option<f64>>,
}

impl FlattenedRow {
    pub fn new(unit: &Unit, period: &ReportingPeriod) -> Self {
        Self {
            year: period.year(),
            quarter_num: period.quarter(),
            quarter: period.to_string(),
            unit_id: unit.number(),
            unit_name: unit.name().to_string(),
            columns: Vec::new(),
            values: HashMap::new(),
        }
    }

    /// Sets a value column and returns the previous value if the column was
    /// already present.
    pub fn set(&mut self, column: &str, value: Option<f64>) -> Option<Option<f64>> {
        match self.values.insert(column.to_string(), value) {
            Some(previous) => Some(previous),
            None => {
                self.columns.push(column.to_string());
                None
            }
        }
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn value_columns(&self) -> &[String] {
        &self.columns
    }

    /// Context columns plus value columns.
    pub fn column_count(&self) -> usize {
        CONTEXT_COLUMNS.len() + self.columns.len()
    }

    fn cell(&self, column: &str) -> String {
        match column {
            YEAR_COLUMN => self.year.to_string(),
            QUARTER_NUM_COLUMN => self.quarter_num.to_string(),
            QUARTER_COLUMN => self.quarter.clone(),
            UNIT_ID_COLUMN => self.unit_id.to_string(),
            UNIT_NAME_COLUMN => self.unit_name.clone(),
            other => self.value(other).map(format_number).unwrap_or_default(),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        String::new()
    }
}

/// A period whose fetch failed and was skipped under the `skip` failure policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPeriod {
    pub unit: Unit,
    pub period: ReportingPeriod,
    pub reason: String,
}

/// Rows for every requested unit and period, in fetch order. No deduplication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedTable {
    rows: Vec<FlattenedRow>,
    columns: Vec<String>,
    pub skipped: Vec<SkippedPeriod>,
}

impl AggregatedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: FlattenedRow) {
        for column in row.value_columns() {
            if !self.columns.contains(column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[FlattenedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of value columns across rows, in first-seen order.
    pub fn value_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Adds (or recomputes) a column from each row's existing values.
    pub fn add_column<F>(&mut self, column: &str, compute: F)
    where
        F: Fn(&FlattenedRow) -> Option<f64>,
    {
        for row in &mut self.rows {
            let value = compute(row);
            row.set(column, value);
        }
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    /// Keeps rows whose year is at least `start_year`.
    pub fn filter_from_year(&self, start_year: i32) -> Self {
        let mut filtered = Self {
            rows: Vec::new(),
            columns: self.columns.clone(),
            skipped: self.skipped.clone(),
        };
        filtered.rows = self
            .rows
            .iter()
            .filter(|row| row.year >= start_year)
            .cloned()
            .collect();
        filtered
    }

    /// Unit names in first-appearance order.
    pub fn unit_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in &self.rows {
            if !names.contains(&row.unit_name) {
                names.push(row.unit_name.clone());
            }
        }
        names
    }

    pub fn header(&self) -> Vec<String> {
        CONTEXT_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let header = self.header();
        csv_writer.write_record(&header)?;
        for row in &self.rows {
            csv_writer.write_record(header.iter().map(|column| row.cell(column)))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| EtlError::ProcessingError {
            message: format!("CSV output is not valid UTF-8: {}", e),
        })
    }

    /// Reads a table previously written by [`AggregatedTable::write_csv`].
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let position = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EtlError::ProcessingError {
                    message: format!("CSV is missing the '{}' column", name),
                })
        };
        let year_idx = position(YEAR_COLUMN)?;
        let quarter_idx = position(QUARTER_COLUMN)?;
        let unit_id_idx = position(UNIT_ID_COLUMN)?;
        let unit_name_idx = position(UNIT_NAME_COLUMN)?;

        let mut table = Self::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or_default().trim();

            let period: ReportingPeriod = field(quarter_idx).parse()?;
            if period.year().to_string() != field(year_idx) && !field(year_idx).is_empty() {
                tracing::warn!(
                    "Row {} has year {} but quarter {}; using the quarter",
                    line + 1,
                    field(year_idx),
                    period
                );
            }
            let unit_id: u32 = field(unit_id_idx)
                .parse()
                .map_err(|_| EtlError::ProcessingError {
                    message: format!(
                        "Row {}: unitId '{}' is not a number",
                        line + 1,
                        field(unit_id_idx)
                    ),
                })?;
            let unit = Unit::new(field(unit_name_idx), unit_id)?;

            let mut row = FlattenedRow::new(&unit, &period);
            for (idx, column) in headers.iter().enumerate() {
                if CONTEXT_COLUMNS.contains(&column) {
                    continue;
                }
                let value = field(idx).parse::<f64>().ok().filter(|v| v.is_finite());
                row.set(column, value);
            }
            table.push(row);
        }
        Ok(table)
    }
}
