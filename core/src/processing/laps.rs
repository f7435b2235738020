use crate::prelude::{
    configured, PipelineConfig, ProcessingStage, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::record::StageKind;
use crate::telemetry::log::LogManager;
use std::collections::HashMap;

/// Lap assigned to every row of a recording that has no lap column.
pub const SINGLE_LAP: i64 = 1;

/// Elapsed time within each lap, measured from the earliest `time_s` seen
/// for that lap identifier.
pub struct LapStage {
    config: Option<PipelineConfig>,
    logger: LogManager,
}

impl LapStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("laps"),
        }
    }
}

impl Default for LapStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Carries lap identifiers over blank cells: forward first, then backward.
pub fn fill_lap_ids(ids: &[Option<i64>]) -> Vec<Option<i64>> {
    let mut filled = ids.to_vec();
    let mut carry = None;
    for id in filled.iter_mut() {
        match id {
            Some(value) => carry = Some(*value),
            None => *id = carry,
        }
    }
    let mut carry = None;
    for id in filled.iter_mut().rev() {
        match id {
            Some(value) => carry = Some(*value),
            None => *id = carry,
        }
    }
    filled
}

/// `time_s` minus the smallest `time_s` sharing the same lap key.
pub fn lap_relative_times(laps: &[Option<i64>], times: &[f64]) -> Vec<f64> {
    let mut starts: HashMap<Option<i64>, f64> = HashMap::new();
    for (lap, &time) in laps.iter().zip(times) {
        starts
            .entry(*lap)
            .and_modify(|start| *start = start.min(time))
            .or_insert(time);
    }
    laps.iter()
        .zip(times)
        .map(|(lap, &time)| time - starts.get(lap).copied().unwrap_or(time))
        .collect()
}

impl ProcessingStage for LapStage {
    fn name(&self) -> &'static str {
        "laps"
    }

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        configured(&self.config, self.name())?;
        let mut table = input.table;
        table.require(StageKind::Timebase, self.name())?;
        let rows = table.len();

        let raw: Vec<Option<i64>> = if table.has_lap_column() {
            table.samples().iter().map(|s| s.lap_id).collect()
        } else {
            vec![Some(SINGLE_LAP); rows]
        };
        let laps = fill_lap_ids(&raw);
        let lap_times = lap_relative_times(&laps, &table.column(|s| s.derived.time_s));

        for ((sample, lap), lap_time) in table.samples_mut().iter_mut().zip(&laps).zip(lap_times) {
            sample.lap_id = *lap;
            sample.derived.lap_time_s = lap_time;
        }

        let mut distinct: Vec<Option<i64>> = laps.clone();
        distinct.dedup();
        let note = format!("{} rows across {} lap segments", rows, distinct.len());
        self.logger.record(&note);

        table.mark_completed(StageKind::Laps);
        Ok(StageOutput {
            table,
            metadata: StageMetadata::new(self.name(), rows, rows),
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
