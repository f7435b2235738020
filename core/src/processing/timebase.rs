use crate::prelude::{
    configured, PipelineConfig, ProcessingStage, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::record::StageKind;
use crate::telemetry::log::LogManager;

/// Rebuilds elapsed time from the instrument's tick counter.
///
/// `dt_raw` follows the true tick gaps and feeds `time_s`; `dt` is the same
/// step clamped into `[min_dt, max_dt]` for differentiation and playback.
pub struct TimebaseStage {
    config: Option<PipelineConfig>,
    logger: LogManager,
}

impl TimebaseStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("timebase"),
        }
    }
}

impl Default for TimebaseStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for TimebaseStage {
    fn name(&self) -> &'static str {
        "timebase"
    }

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = configured(&self.config, self.name())?;
        let mut table = input.table;
        table.require(StageKind::RejectOutliers, self.name())?;
        let rows = table.len();

        let mut previous_tick = None;
        let mut elapsed = 0.0;
        let mut clamped = 0usize;
        for sample in table.samples_mut() {
            let dt_raw = match previous_tick {
                None => config.dt_per_tick,
                Some(prev) => ((sample.tick - prev) as f64 * config.dt_per_tick).max(0.0),
            };
            let dt = dt_raw.clamp(config.min_dt, config.max_dt);
            if dt != dt_raw {
                clamped += 1;
            }
            elapsed += dt_raw;

            sample.derived.dt_raw = dt_raw;
            sample.derived.dt = dt;
            sample.derived.time_s = elapsed;
            previous_tick = Some(sample.tick);
        }

        let mut metadata = StageMetadata::new(self.name(), rows, rows);
        metadata.notes.push(format!("{} steps clamped", clamped));
        self.logger.record(&format!(
            "{} rows span {:.3} s, {} steps clamped",
            rows, elapsed, clamped
        ));

        table.mark_completed(StageKind::Timebase);
        Ok(StageOutput { table, metadata })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Sample, TelemetryTable};

    fn run(ticks: &[i64]) -> TelemetryTable {
        let samples = ticks
            .iter()
            .map(|&tick| {
                Sample::new(tick, Some(1), (0.0, 0.0), (0.0, 0.0, 0.0), 0.0, 0.0, 0.0, 1.0)
            })
            .collect();
        let mut table = TelemetryTable::new(samples, true);
        table.mark_completed(StageKind::Sanitize);
        table.mark_completed(StageKind::RejectOutliers);

        let mut stage = TimebaseStage::new();
        stage.initialize(&PipelineConfig::default()).unwrap();
        let output = stage.execute(StageInput { table }).unwrap();
        stage.cleanup();
        output.table
    }

    #[test]
    fn first_sample_is_one_tick_wide() {
        let table = run(&[500, 501]);
        let first = table.frame(0).unwrap().derived;
        assert!((first.dt_raw - 0.01).abs() < 1e-12);
        assert!((first.time_s - 0.01).abs() < 1e-12);
    }

    #[test]
    fn stalls_and_spikes_are_clamped_but_time_keeps_true_gaps() {
        let table = run(&[0, 1, 1, 60, 59, 60]);
        let dts: Vec<f64> = table.column(|s| s.derived.dt);
        let raws: Vec<f64> = table.column(|s| s.derived.dt_raw);

        assert_eq!(raws[2], 0.0);
        assert!((dts[2] - 0.01).abs() < 1e-12);
        assert!((raws[3] - 0.59).abs() < 1e-12);
        assert!((dts[3] - 0.20).abs() < 1e-12);
        // Counter running backwards contributes no time.
        assert_eq!(raws[4], 0.0);

        let total = table.frame(5).unwrap().derived.time_s;
        assert!((total - 0.62).abs() < 1e-9);
    }

    #[test]
    fn dt_bounds_and_monotonic_time_hold() {
        let table = run(&[3, 3, 4, 10, 9, 400, 401, 401]);
        let config = PipelineConfig::default();
        for sample in table.samples() {
            assert!(sample.derived.dt >= config.min_dt && sample.derived.dt <= config.max_dt);
        }
        assert!(table
            .samples()
            .windows(2)
            .all(|pair| pair[1].derived.time_s >= pair[0].derived.time_s));
    }
}
