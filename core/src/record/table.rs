use crate::prelude::{StageError, StageResult};
use crate::record::sample::Sample;
use serde::{Deserialize, Serialize};

/// Identifies the conditioning stages that have been applied to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    Sanitize,
    RejectOutliers,
    Timebase,
    Kinematics,
    Inputs,
    Laps,
}

/// Ordered telemetry rows; insertion order is recording order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryTable {
    samples: Vec<Sample>,
    has_lap_column: bool,
    completed: Vec<StageKind>,
}

impl TelemetryTable {
    pub fn new(samples: Vec<Sample>, has_lap_column: bool) -> Self {
        Self {
            samples,
            has_lap_column,
            completed: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn has_lap_column(&self) -> bool {
        self.has_lap_column
    }

    /// Row at position `index`, as presentation reads it per animation frame.
    pub fn frame(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    /// Copies one field out of every row.
    pub fn column<F>(&self, field: F) -> Vec<f64>
    where
        F: Fn(&Sample) -> f64,
    {
        self.samples.iter().map(field).collect()
    }

    /// Keeps the rows whose mask entry is `true`, re-indexed contiguously.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.samples.len());
        let mut flags = keep.iter();
        self.samples.retain(|_| flags.next() == Some(&true));
    }

    pub fn completed(&self) -> &[StageKind] {
        &self.completed
    }

    pub fn has_completed(&self, kind: StageKind) -> bool {
        self.completed.contains(&kind)
    }

    pub(crate) fn mark_completed(&mut self, kind: StageKind) {
        if !self.has_completed(kind) {
            self.completed.push(kind);
        }
    }

    pub(crate) fn require(&self, kind: StageKind, stage: &str) -> StageResult<()> {
        if self.has_completed(kind) {
            Ok(())
        } else {
            Err(StageError::InvalidInput(format!(
                "{} stage requires {:?} to have run",
                stage, kind
            )))
        }
    }
}
