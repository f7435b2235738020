use crate::prelude::{
    configured, PipelineConfig, ProcessingStage, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::record::{Sample, StageKind, MISSING, MISSING_GEAR};
use crate::telemetry::log::LogManager;

const MIN_GEAR: f64 = 1.0;
const MAX_GEAR: f64 = 6.0;

/// Turns sentinel readings into gaps, bridges short gaps, and enforces
/// physical ranges. Rows that keep an unresolved gap are dropped.
pub struct SanitizerStage {
    config: Option<PipelineConfig>,
    logger: LogManager,
}

impl SanitizerStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("sanitize"),
        }
    }
}

impl Default for SanitizerStage {
    fn default() -> Self {
        Self::new()
    }
}

fn as_gap(value: f64, sentinel: f64) -> Option<f64> {
    if value == sentinel || !value.is_finite() {
        None
    } else {
        Some(value)
    }
}

/// Linear interpolation over sample positions, bridging at most `limit`
/// missing samples counted from either side of a gap.
///
/// Gaps touching the start or end are filled with the nearest reading under
/// the same limit. A gap longer than `2 * limit` keeps its middle unresolved.
pub fn interpolate_limited(values: &[Option<f64>], limit: usize) -> Vec<Option<f64>> {
    let len = values.len();
    let mut prev = vec![None; len];
    let mut next = vec![None; len];

    let mut last = None;
    for (i, value) in values.iter().enumerate() {
        if value.is_some() {
            last = Some(i);
        }
        prev[i] = last;
    }
    let mut upcoming = None;
    for i in (0..len).rev() {
        if values[i].is_some() {
            upcoming = Some(i);
        }
        next[i] = upcoming;
    }

    (0..len)
        .map(|i| {
            if values[i].is_some() {
                return values[i];
            }
            let from_left = prev[i].map_or(i + 1, |p| i - p);
            let from_right = next[i].map_or(len - i, |n| n - i);
            if from_left > limit && from_right > limit {
                return None;
            }
            match (prev[i], next[i]) {
                (Some(p), Some(n)) => {
                    let (a, b) = (values[p]?, values[n]?);
                    let fraction = (i - p) as f64 / (n - p) as f64;
                    Some(a + (b - a) * fraction)
                }
                (Some(p), None) => values[p],
                (None, Some(n)) => values[n],
                (None, None) => None,
            }
        })
        .collect()
}

/// Carries the last reading forward, then the first reading backward.
pub fn fill_steps(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut filled = values.to_vec();
    let mut carry = None;
    for value in filled.iter_mut() {
        match value {
            Some(v) => carry = Some(*v),
            None => *value = carry,
        }
    }
    let mut carry = None;
    for value in filled.iter_mut().rev() {
        match value {
            Some(v) => carry = Some(*v),
            None => *value = carry,
        }
    }
    filled
}

fn repaired_column<F>(samples: &[Sample], field: F, limit: usize) -> Vec<Option<f64>>
where
    F: Fn(&Sample) -> f64,
{
    let raw: Vec<Option<f64>> = samples.iter().map(|s| as_gap(field(s), MISSING)).collect();
    interpolate_limited(&raw, limit)
}

impl ProcessingStage for SanitizerStage {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = configured(&self.config, self.name())?;
        let mut table = input.table;
        let rows_in = table.len();
        let mut metadata = StageMetadata::new(self.name(), rows_in, rows_in);

        if table.has_lap_column() {
            let keep: Vec<bool> = table
                .samples()
                .iter()
                .map(|s| !matches!(s.lap_id, Some(id) if id <= 0))
                .collect();
            table.retain_rows(&keep);
            let dropped = rows_in - table.len();
            if dropped > 0 {
                let note = format!("dropped {} out-lap rows", dropped);
                self.logger.detail(&note);
                metadata.notes.push(note);
            }
        }

        let limit = config.interpolate_limit;
        let samples = table.samples();
        let throttle = repaired_column(samples, |s| s.throttle, limit);
        let brake = repaired_column(samples, |s| s.brake, limit);
        let rpm = repaired_column(samples, |s| s.rpm, limit);
        let pos_x = repaired_column(samples, |s| s.pos_x, limit);
        let pos_y = repaired_column(samples, |s| s.pos_y, limit);
        let gear = fill_steps(
            &samples
                .iter()
                .map(|s| as_gap(s.gear, MISSING_GEAR))
                .collect::<Vec<_>>(),
        );

        let mut keep = Vec::with_capacity(samples.len());
        for (i, sample) in table.samples_mut().iter_mut().enumerate() {
            let repaired = (|| {
                Some((
                    throttle[i]?.clamp(0.0, 1.0),
                    brake[i]?.clamp(0.0, 1.0),
                    rpm[i]?.max(0.0),
                    pos_x[i]?,
                    pos_y[i]?,
                    gear[i]?.round().clamp(MIN_GEAR, MAX_GEAR),
                ))
            })();
            match repaired {
                Some((throttle, brake, rpm, x, y, gear)) => {
                    sample.throttle = throttle;
                    sample.brake = brake;
                    sample.rpm = rpm;
                    sample.pos_x = x;
                    sample.pos_y = y;
                    sample.gear = gear;
                    keep.push(true);
                }
                None => keep.push(false),
            }
        }

        let before_gaps = table.len();
        table.retain_rows(&keep);
        let gap_rows = before_gaps - table.len();
        if gap_rows > 0 {
            let note = format!("dropped {} rows with unresolved gaps", gap_rows);
            self.logger.warn(&note);
            metadata.notes.push(note);
        }

        if table.is_empty() && rows_in > 0 {
            self.logger.warn("no usable rows remain after sanitizing");
        }

        table.mark_completed(StageKind::Sanitize);
        metadata.rows_out = table.len();
        let kept = format!("kept {} of {} rows", metadata.rows_out, rows_in);
        self.logger.record(&kept);

        Ok(StageOutput { table, metadata })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::StageError;
    use crate::record::TelemetryTable;

    fn sample(tick: i64, lap: i64) -> Sample {
        Sample::new(
            tick,
            Some(lap),
            (tick as f64, 2.0 * tick as f64),
            (10.0, 0.0, 0.0),
            0.5,
            0.0,
            8000.0,
            3.0,
        )
    }

    fn run(samples: Vec<Sample>, has_lap_column: bool) -> StageResult<StageOutput> {
        let mut stage = SanitizerStage::new();
        stage.initialize(&PipelineConfig::default()).unwrap();
        let output = stage.execute(StageInput {
            table: TelemetryTable::new(samples, has_lap_column),
        });
        stage.cleanup();
        output
    }

    #[test]
    fn isolated_sentinel_is_interpolated_not_dropped() {
        let mut samples: Vec<Sample> = (0..5).map(|t| sample(t, 1)).collect();
        samples[2].throttle = MISSING;
        samples[1].throttle = 0.2;
        samples[3].throttle = 0.6;
        let output = run(samples, true).unwrap();
        assert_eq!(output.table.len(), 5);
        assert!((output.table.frame(2).unwrap().throttle - 0.4).abs() < 1e-12);
    }

    #[test]
    fn wide_gap_keeps_unresolved_middle_rows_out() {
        let mut samples: Vec<Sample> = (0..40).map(|t| sample(t, 1)).collect();
        for s in samples.iter_mut().skip(5).take(25) {
            s.pos_x = MISSING;
        }
        let output = run(samples, true).unwrap();
        // 25 missing, 10 bridged from each side.
        assert_eq!(output.table.len(), 35);
        assert_eq!(output.metadata.rows_dropped(), 5);
        assert!(output
            .table
            .samples()
            .windows(2)
            .all(|pair| pair[0].tick < pair[1].tick));
    }

    #[test]
    fn edge_gap_takes_nearest_reading() {
        let mut samples: Vec<Sample> = (0..6).map(|t| sample(t, 1)).collect();
        samples[0].rpm = MISSING;
        samples[1].rpm = MISSING;
        samples[2].rpm = 9100.0;
        let output = run(samples, true).unwrap();
        assert_eq!(output.table.frame(0).unwrap().rpm, 9100.0);
    }

    #[test]
    fn out_lap_rows_are_dropped_first() {
        let samples = vec![sample(0, 0), sample(1, 0), sample(2, 1), sample(3, 1)];
        let output = run(samples, true).unwrap();
        assert_eq!(output.table.len(), 2);
        assert!(output.table.samples().iter().all(|s| s.lap_id == Some(1)));
    }

    #[test]
    fn lap_zero_is_kept_when_no_lap_column() {
        let samples = vec![sample(0, 0), sample(1, 0)];
        let output = run(samples, false).unwrap();
        assert_eq!(output.table.len(), 2);
    }

    #[test]
    fn gear_is_stepped_rounded_and_clamped() {
        let mut samples: Vec<Sample> = (0..6).map(|t| sample(t, 1)).collect();
        samples[0].gear = MISSING_GEAR;
        samples[1].gear = 2.4;
        samples[2].gear = MISSING_GEAR;
        samples[3].gear = 9.0;
        samples[4].gear = 0.0;
        samples[5].gear = MISSING_GEAR;
        let output = run(samples, true).unwrap();
        let gears: Vec<u8> = output
            .table
            .samples()
            .iter()
            .map(Sample::gear_number)
            .collect();
        assert_eq!(gears, vec![2, 2, 2, 6, 1, 1]);
    }

    #[test]
    fn ranges_are_enforced_and_sentinels_eliminated() {
        let mut samples: Vec<Sample> = (0..8).map(|t| sample(t, 1)).collect();
        samples[1].throttle = 1.4;
        samples[2].brake = -0.3;
        samples[3].rpm = -20.0;
        samples[4].brake = MISSING;
        samples[5].throttle = MISSING;
        let output = run(samples, true).unwrap();
        for s in output.table.samples() {
            assert!((0.0..=1.0).contains(&s.throttle));
            assert!((0.0..=1.0).contains(&s.brake));
            assert!(s.rpm >= 0.0);
            assert!((1.0..=6.0).contains(&s.gear));
            for value in [s.throttle, s.brake, s.rpm, s.pos_x, s.pos_y, s.gear] {
                assert_ne!(value, MISSING);
            }
        }
        assert_eq!(output.table.frame(1).unwrap().throttle, 1.0);
    }

    #[test]
    fn interpolate_limited_follows_gap_budget() {
        let values = [Some(0.0), None, None, None, Some(4.0)];
        let filled = interpolate_limited(&values, 1);
        assert_eq!(filled, vec![Some(0.0), Some(1.0), None, Some(3.0), Some(4.0)]);
        assert_eq!(interpolate_limited(&[None, None], 3), vec![None, None]);
    }

    #[test]
    fn fully_missing_channel_drops_every_row() {
        let mut samples: Vec<Sample> = (0..4).map(|t| sample(t, 1)).collect();
        for s in samples.iter_mut() {
            s.gear = MISSING_GEAR;
        }
        let output = run(samples, true).unwrap();
        assert!(output.table.is_empty());
        assert_eq!(output.metadata.rows_dropped(), 4);
    }

    #[test]
    fn execute_without_initialize_is_internal_error() {
        let mut stage = SanitizerStage::new();
        let result = stage.execute(StageInput {
            table: TelemetryTable::default(),
        });
        assert!(matches!(result, Err(StageError::Internal(_))));
    }
}
