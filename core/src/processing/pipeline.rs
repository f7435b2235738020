use crate::prelude::{PipelineConfig, ProcessingStage, StageInput, StageMetadata, StageResult};
use crate::processing::{
    InputStage, KinematicsStage, LapStage, OutlierStage, SanitizerStage, TimebaseStage,
};
use crate::record::{TableSummary, TelemetryTable};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Conditioned table plus what each stage reported.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: TelemetryTable,
    pub summary: TableSummary,
    pub stages: Vec<StageMetadata>,
}

/// Runs the six conditioning stages in order over one recording.
pub struct Pipeline {
    config: PipelineConfig,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("pipeline"),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    fn stages() -> Vec<Box<dyn ProcessingStage>> {
        vec![
            Box::new(SanitizerStage::new()),
            Box::new(OutlierStage::new()),
            Box::new(TimebaseStage::new()),
            Box::new(KinematicsStage::new()),
            Box::new(InputStage::new()),
            Box::new(LapStage::new()),
        ]
    }

    /// Conditions `table`; any stage failure aborts the whole run.
    pub fn run(&self, table: TelemetryTable) -> StageResult<PipelineOutput> {
        self.metrics.reset();
        let rows_loaded = table.len();
        let mut table = table;
        let mut stages = Vec::new();

        for mut stage in Self::stages() {
            let result = stage
                .initialize(&self.config)
                .and_then(|_| stage.execute(StageInput { table }));
            stage.cleanup();

            let output = match result {
                Ok(output) => output,
                Err(err) => {
                    self.metrics.record_error();
                    let note = format!("{} stage failed: {}", stage.name(), err);
                    self.logger.warn(&note);
                    return Err(err);
                }
            };
            self.metrics.record_stage(
                output.metadata.stage,
                output.metadata.rows_in,
                output.metadata.rows_out,
            );
            table = output.table;
            stages.push(output.metadata);
        }

        let summary = TableSummary::from_table(&table);
        self.logger.record(&format!(
            "conditioned {} of {} rows, {:.3} s",
            summary.row_count, rows_loaded, summary.total_time_s
        ));

        Ok(PipelineOutput {
            table,
            summary,
            stages,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::StageError;
    use crate::processing::kinematics::GRAVITY;
    use crate::record::{Sample, StageKind, MISSING};

    const RADIUS: f64 = 30.0;
    const SPEED: f64 = 15.0;
    const OUT_LAP_ROWS: i64 = 20;

    fn wobble(i: usize, prime: usize, modulus: usize) -> f64 {
        ((i * prime + 13) % modulus) as f64 / (modulus - 1) as f64 - 0.5
    }

    /// Two laps round a circle at 100 Hz, preceded by an out-lap, with
    /// position jitter, a few dropouts and one GPS glitch.
    fn session() -> TelemetryTable {
        let mut samples = Vec::new();
        for i in 0..OUT_LAP_ROWS {
            samples.push(Sample::new(
                i,
                Some(0),
                (RADIUS + 5.0, 0.0),
                (0.0, 0.0, 0.0),
                0.0,
                0.0,
                3000.0,
                1.0,
            ));
        }
        for i in 0..2514usize {
            let theta = SPEED * 0.01 * i as f64 / RADIUS;
            let lap = 1 + (theta / std::f64::consts::TAU).floor() as i64;
            samples.push(Sample::new(
                OUT_LAP_ROWS + i as i64,
                Some(lap),
                (
                    RADIUS * theta.cos() + 0.02 * wobble(i, 7919, 101),
                    RADIUS * theta.sin() + 0.02 * wobble(i, 104_729, 97),
                ),
                (-SPEED * theta.sin(), SPEED * theta.cos(), 0.0),
                0.5 + 0.6 * wobble(i, 31, 17),
                (0.4 * wobble(i, 53, 23)).max(0.0),
                9000.0,
                4.0,
            ));
        }
        let offset = OUT_LAP_ROWS as usize;
        samples[offset + 300].throttle = MISSING;
        samples[offset + 301].gear = MISSING;
        samples[offset + 700].pos_x = MISSING;
        samples[offset + 900].pos_x += 300.0;
        TelemetryTable::new(samples, true)
    }

    #[test]
    fn pipeline_produces_consistent_snapshot() {
        let pipeline = Pipeline::default();
        let output = pipeline.run(session()).unwrap();
        let table = &output.table;
        let config = pipeline.config();

        assert_eq!(output.stages.len(), 6);
        assert_eq!(output.stages[0].rows_dropped(), OUT_LAP_ROWS as usize);
        assert_eq!(output.stages[1].rows_dropped(), 2);
        assert_eq!(output.summary.row_count, 2512);
        assert_eq!(output.summary.frame_interval_ms, 10);
        assert!(table.has_completed(StageKind::Laps));

        for s in table.samples() {
            assert!(s.lap_id.unwrap_or(0) > 0);
            assert!((0.0..=1.0).contains(&s.derived.throttle_smooth));
            assert!((0.0..=1.0).contains(&s.derived.brake_smooth));
            assert!((1..=6).contains(&s.gear_number()));
            assert!(s.derived.lean_deg >= 0.0 && s.derived.lean_deg <= config.max_lean_deg);
            assert_eq!(s.derived.lean_deg, s.derived.lean_deg_signed.abs());
            assert!(s.derived.dt >= config.min_dt && s.derived.dt <= config.max_dt);
            for value in [s.throttle, s.brake, s.rpm, s.pos_x, s.pos_y, s.gear] {
                assert_ne!(value, MISSING);
            }
        }
        for pair in table.samples().windows(2) {
            assert!(pair[1].derived.time_s >= pair[0].derived.time_s);
            assert!(
                (pair[1].derived.throttle_smooth - pair[0].derived.throttle_smooth).abs()
                    <= 9.0 * pair[1].derived.dt + 1e-9
            );
        }
    }

    #[test]
    fn lap_two_starts_from_zero() {
        let output = Pipeline::default().run(session()).unwrap();
        let first_of_lap_two = output
            .table
            .samples()
            .iter()
            .find(|s| s.lap_id == Some(2))
            .unwrap();
        assert!(first_of_lap_two.derived.time_s > 10.0);
        assert!(first_of_lap_two.derived.lap_time_s.abs() < 1e-9);
        assert_eq!(output.summary.laps.len(), 2);
    }

    #[test]
    fn lean_tracks_steady_cornering() {
        let output = Pipeline::default().run(session()).unwrap();
        let expected = (SPEED * SPEED / (RADIUS * GRAVITY)).atan().to_degrees();
        let interior = &output.table.samples()[100..output.table.len() - 100];
        let mean = interior.iter().map(|s| s.derived.lean_deg_signed).sum::<f64>()
            / interior.len() as f64;
        assert!((mean - expected).abs() < 1.0, "mean lean {}", mean);
        assert!(interior
            .iter()
            .all(|s| (s.derived.lean_deg_signed - expected).abs() < 6.0));
    }

    #[test]
    fn metrics_follow_stage_order() {
        let pipeline = Pipeline::default();
        pipeline.run(session()).unwrap();
        let (stages, errors) = pipeline.metrics().snapshot();
        let names: Vec<&str> = stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            names,
            vec!["sanitize", "outliers", "timebase", "kinematics", "inputs", "laps"]
        );
        assert_eq!(errors, 0);
    }

    #[test]
    fn invalid_config_aborts_without_output() {
        let pipeline = Pipeline::new(PipelineConfig {
            smoothing_alpha: 0.0,
            ..Default::default()
        });
        let result = pipeline.run(session());
        assert!(matches!(result, Err(StageError::InvalidInput(_))));
        assert_eq!(pipeline.metrics().snapshot().1, 1);
    }

    #[test]
    fn empty_recording_yields_empty_snapshot() {
        let output = Pipeline::default()
            .run(TelemetryTable::new(Vec::new(), true))
            .unwrap();
        assert_eq!(output.summary.row_count, 0);
        assert_eq!(output.summary.total_time_s, 0.0);
    }
}
