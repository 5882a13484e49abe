use crate::domain::ports::Pipeline;
use crate::utils::error::Result;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting report run...");

        // Extract
        let table = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} rows with {} value columns",
            table.len(),
            table.value_columns().len()
        );

        // Transform
        let output = self.pipeline.transform(table).await?;

        // Load
        let output_path = self.pipeline.load(output).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(output_path)
    }
}
