use crate::math::stats::StatsHelper;
use crate::prelude::{
    configured, PipelineConfig, ProcessingStage, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::record::StageKind;
use crate::telemetry::log::LogManager;

/// Drops samples where the position jumped further than the recording's
/// own step distribution allows.
pub struct OutlierStage {
    config: Option<PipelineConfig>,
    logger: LogManager,
}

impl OutlierStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("outliers"),
        }
    }
}

impl Default for OutlierStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Euclidean distance from each sample to its predecessor; the first is zero.
pub fn step_displacements(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let len = xs.len().min(ys.len());
    (0..len)
        .map(|i| {
            if i == 0 {
                0.0
            } else {
                (xs[i] - xs[i - 1]).hypot(ys[i] - ys[i - 1])
            }
        })
        .collect()
}

/// `mean + sigma * std` over the steps after the first.
///
/// `None` when there is no spread to measure: fewer than two steps, or every
/// step the same length.
pub fn jump_threshold(displacements: &[f64], sigma: f64) -> Option<f64> {
    let steps = displacements.get(1..)?;
    let mean = StatsHelper::mean(steps)?;
    let std = StatsHelper::std_dev(steps)?;
    if std > 0.0 {
        Some(mean + sigma * std)
    } else {
        None
    }
}

impl ProcessingStage for OutlierStage {
    fn name(&self) -> &'static str {
        "outliers"
    }

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = configured(&self.config, self.name())?;
        let mut table = input.table;
        table.require(StageKind::Sanitize, self.name())?;
        let rows_in = table.len();
        let mut metadata = StageMetadata::new(self.name(), rows_in, rows_in);

        let displacements =
            step_displacements(&table.column(|s| s.pos_x), &table.column(|s| s.pos_y));

        match jump_threshold(&displacements, config.jump_sigma) {
            Some(threshold) => {
                let keep: Vec<bool> = displacements.iter().map(|&d| d < threshold).collect();
                table.retain_rows(&keep);
                let note = format!("jump threshold {:.4} m", threshold);
                metadata.notes.push(note);
                self.logger.record(&format!(
                    "threshold {:.4} m rejected {} of {} rows",
                    threshold,
                    rows_in - table.len(),
                    rows_in
                ));
            }
            None => {
                let note = "step distribution has no spread, nothing rejected";
                self.logger.detail(note);
            }
        }

        table.mark_completed(StageKind::RejectOutliers);
        metadata.rows_out = table.len();
        Ok(StageOutput { table, metadata })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
