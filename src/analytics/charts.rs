//! Chart data for the quarterly analytics.
//!
//! Charts are emitted as data (per-unit series plus standard lines) and drawn
//! by an external renderer.

use crate::core::metrics::{
    CHILDREN_ATTENDING, MELCH_ATTENDING, MELCH_NOT_ATTENDING, SACRAMENT_ATTENDANCE, TOTAL_MEMBERS,
    WOMEN_ATTENDING, YOUNG_MEN_ATTENDING, YOUNG_WOMEN_ATTENDING,
};
use crate::domain::table::AggregatedTable;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Minimum unit sizes that took effect in 2024.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitStandards {
    pub stake_membership: f64,
    pub stake_melch_leadership: f64,
    pub stake_active_adults: f64,
    pub stake_active_youth: f64,
    pub stake_wards: f64,
    pub ward_membership: f64,
    pub ward_melch_leadership: f64,
    pub ward_active_adults: f64,
    pub ward_active_youth: f64,
}

pub const STANDARDS_2024: UnitStandards = UnitStandards {
    stake_membership: 2000.0,
    stake_melch_leadership: 150.0,
    stake_active_adults: 500.0,
    stake_active_youth: 100.0,
    stake_wards: 5.0,
    ward_membership: 250.0,
    ward_melch_leadership: 20.0,
    ward_active_adults: 100.0,
    ward_active_youth: 20.0,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub variable: String,
    pub values: Vec<Option<f64>>,
}

/// One unit's quarters and a trace per plotted variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSeries {
    pub unit_name: String,
    pub quarters: Vec<String>,
    pub traces: Vec<Trace>,
}

/// Stacked bars per unit, laid out in a square grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridChart {
    pub title: String,
    pub grid_size: usize,
    pub min_line: Option<f64>,
    pub units: Vec<UnitSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub name: String,
    pub standard: Option<f64>,
    pub units: Vec<UnitSeries>,
}

/// One column per unit, one row per measure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnChart {
    pub title: String,
    pub rows: Vec<ChartRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBundle {
    pub generated_at: DateTime<Utc>,
    pub start_year: i32,
    pub standards: UnitStandards,
    pub charts: Vec<GridChart>,
    pub overview: ColumnChart,
}

pub fn unit_series(table: &AggregatedTable, variables: &[&str]) -> Vec<UnitSeries> {
    table
        .unit_names()
        .into_iter()
        .map(|unit_name| {
            let rows: Vec<_> = table
                .rows()
                .iter()
                .filter(|row| row.unit_name == unit_name)
                .collect();
            UnitSeries {
                quarters: rows.iter().map(|row| row.quarter.clone()).collect(),
                traces: variables
                    .iter()
                    .map(|variable| Trace {
                        variable: variable.to_string(),
                        values: rows.iter().map(|row| row.value(variable)).collect(),
                    })
                    .collect(),
                unit_name,
            }
        })
        .collect()
}

fn grid_size(units: usize) -> usize {
    (units as f64).sqrt().ceil() as usize
}

fn grid_chart(
    table: &AggregatedTable,
    title: &str,
    variables: &[&str],
    min_line: Option<f64>,
) -> GridChart {
    GridChart {
        title: title.to_string(),
        grid_size: grid_size(table.unit_names().len()),
        min_line,
        units: unit_series(table, variables),
    }
}

pub fn individual_charts(table: &AggregatedTable) -> Vec<GridChart> {
    let standards = STANDARDS_2024;
    vec![
        grid_chart(
            table,
            "Melchizedek Priesthood Attendance",
            &[MELCH_ATTENDING, MELCH_NOT_ATTENDING],
            Some(standards.ward_melch_leadership),
        ),
        grid_chart(table, "Primary Attendance", &[CHILDREN_ATTENDING], None),
        grid_chart(
            table,
            "Ward Membership",
            &[TOTAL_MEMBERS],
            Some(standards.ward_membership),
        ),
        grid_chart(
            table,
            "Active Adults",
            &[MELCH_ATTENDING, WOMEN_ATTENDING],
            Some(standards.ward_active_adults),
        ),
        grid_chart(
            table,
            "Active Youth",
            &[YOUNG_MEN_ATTENDING, YOUNG_WOMEN_ATTENDING],
            Some(standards.ward_active_youth),
        ),
    ]
}

pub fn overview_chart(table: &AggregatedTable, title: &str) -> ColumnChart {
    let standards = STANDARDS_2024;
    let rows: [(&str, &[&str], Option<f64>); 6] = [
        ("Membership", &[TOTAL_MEMBERS], Some(standards.ward_membership)),
        (
            "Melchizedek Priesthood",
            &[MELCH_ATTENDING],
            Some(standards.ward_melch_leadership),
        ),
        (
            "Adults",
            &[MELCH_ATTENDING, WOMEN_ATTENDING],
            Some(standards.ward_active_adults),
        ),
        (
            "Youth",
            &[YOUNG_MEN_ATTENDING, YOUNG_WOMEN_ATTENDING],
            Some(standards.ward_active_youth),
        ),
        ("Sacrament", &[SACRAMENT_ATTENDANCE], None),
        ("Primary", &[CHILDREN_ATTENDING], None),
    ];

    ColumnChart {
        title: title.to_string(),
        rows: rows
            .iter()
            .map(|(name, variables, standard)| ChartRow {
                name: name.to_string(),
                standard: *standard,
                units: unit_series(table, variables),
            })
            .collect(),
    }
}

/// Builds every chart from rows with `year >= start_year`.
pub fn build_chart_bundle(table: &AggregatedTable, title: &str, start_year: i32) -> ChartBundle {
    let recent = table.filter_from_year(start_year);
    tracing::info!(
        "📊 Building charts from {} of {} rows (since {})",
        recent.len(),
        table.len(),
        start_year
    );

    ChartBundle {
        generated_at: Utc::now(),
        start_year,
        standards: STANDARDS_2024,
        charts: individual_charts(&recent),
        overview: overview_chart(&recent, title),
    }
}
