use lcr_reports::core::aggregator::FailurePolicy;
use lcr_reports::core::metrics::apply_metrics;
use lcr_reports::domain::model::{ReportingPeriod, Unit};
use lcr_reports::domain::ports::ConfigProvider;
use lcr_reports::domain::table::{AggregatedTable, FlattenedRow};
use lcr_reports::Profile;

fn example_profile() -> Profile {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/profile.example.toml");
    Profile::from_file(path).unwrap()
}

#[test]
fn test_example_profile_loads() {
    let profile = example_profile();

    assert_eq!(profile.output_filename(), "Oak Hills Stake.csv");
    assert_eq!(profile.metrics().len(), 7);
    assert_eq!(profile.failure_policy(), FailurePolicy::Abort);
    assert!(!profile.json_logs());
    assert!(profile.archive_filename().is_none());

    let units = profile.load_units().unwrap();
    assert_eq!(units.len(), 3);
    assert_eq!(units.find(333333).unwrap().name(), "Pine Ridge Branch");
}

#[test]
fn test_example_profile_derives_every_attendance_ratio() {
    let profile = example_profile();

    let unit = Unit::new("Oak Hills 1st Ward", 111111).unwrap();
    let mut row = FlattenedRow::new(&unit, &ReportingPeriod::new(2024, 1).unwrap());
    for (column, value) in [
        ("melch.attending", 20.0),
        ("melch.attending.potential", 40.0),
        ("women.attending.meetings", 40.0),
        ("women.attending.meetings.potential", 60.0),
    ] {
        row.set(column, Some(value));
    }
    let mut table = AggregatedTable::new();
    table.push(row);

    apply_metrics(&mut table, profile.metrics());

    for column in [
        "sacrament.attendance.pct",
        "adults.attending.pct",
        "youth.attending.pct",
        "children.attending.pct",
        "names.submitted.pct",
        "melch.not.attending",
    ] {
        assert!(table.has_column(column), "missing {}", column);
    }
    assert_eq!(table.rows()[0].value("adults.attending.pct"), Some(0.6));
}
