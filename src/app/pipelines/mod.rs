pub mod analyze_pipeline;
pub mod report_pipeline;

pub use analyze_pipeline::AnalyzePipeline;
pub use report_pipeline::{ReportOutput, ReportPipeline};
