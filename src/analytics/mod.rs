pub mod charts;

pub use charts::{build_chart_bundle, ChartBundle, STANDARDS_2024};
