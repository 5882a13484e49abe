use crate::domain::model::{Report, ReportingPeriod, Unit};
use crate::domain::table::{potential_column, FlattenedRow};

/// Flattens a quarterly report into one wide row.
///
/// Every row of every section becomes two columns named after its resource
/// id: the actual value and `<id>.potential`. A resource id that appears in
/// more than one section keeps the value from the last section. Column names
/// are not escaped, so a row whose id is itself `<other>.potential` lands in
/// the same column as `<other>`'s potential and the later write wins.
pub fn flatten_report(report: &Report, unit: &Unit, period: &ReportingPeriod) -> FlattenedRow {
    let mut flattened = FlattenedRow::new(unit, period);

    for section in &report.sections {
        for row in &section.rows {
            let Some(id) = row.name_resource_id.as_deref() else {
                tracing::debug!(
                    "Skipping row without nameResourceId in section {:?} ({}, {})",
                    section.name_resource_id,
                    unit.name(),
                    period
                );
                continue;
            };

            if flattened.set(id, row.actual_value).is_some() {
                // TODO: check real report data for whether repeated ids carry equal values
                tracing::warn!(
                    "Resource id '{}' repeats for {} {}; keeping the value from section {:?}",
                    id,
                    unit.name(),
                    period,
                    section.name_resource_id
                );
            }
            flattened.set(&potential_column(id), row.potential_value);
        }
    }

    flattened
}
