use motocore::prelude::StageMetadata;
use motocore::processing::PipelineOutput;
use motocore::record::{Sample, TableSummary};
use serde::Serialize;

/// Read-only snapshot handed to presentation clients.
#[derive(Debug, Clone, Serialize, Default)]
pub struct VisualizationModel {
    pub summary: Option<TableSummary>,
    pub frames: Vec<Sample>,
    pub stages: Vec<StageMetadata>,
}

impl VisualizationModel {
    pub fn from_output(output: &PipelineOutput) -> Self {
        Self {
            summary: Some(output.summary.clone()),
            frames: output.table.samples().to_vec(),
            stages: output.stages.clone(),
        }
    }

    pub fn frame(&self, index: usize) -> Option<&Sample> {
        self.frames.get(index)
    }
}
