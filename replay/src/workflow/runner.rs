use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use motocore::processing::{Pipeline, PipelineOutput};
use motocore::record::TelemetryTable;
use motocore::telemetry::StageCounts;
use motocore::TelemetryLoader;
use std::path::Path;

pub struct WorkflowResult {
    pub output: PipelineOutput,
    pub stage_counts: Vec<StageCounts>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<TelemetryTable> {
        let path_ref = path.as_ref();
        TelemetryLoader::from_path(path_ref)
            .with_context(|| format!("loading recording {}", path_ref.display()))
    }

    pub fn execute(&self, table: TelemetryTable) -> anyhow::Result<WorkflowResult> {
        let pipeline = Pipeline::new(self.config.pipeline.clone());
        let output = pipeline
            .run(table)
            .context("conditioning telemetry recording")?;
        let (stage_counts, _) = pipeline.metrics().snapshot();

        Ok(WorkflowResult {
            output,
            stage_counts,
        })
    }
}
