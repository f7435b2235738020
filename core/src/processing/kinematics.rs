//! Speed and lean-angle estimation.
//!
//! Lean is not measured by the instrument. It is inferred from how sharply
//! the smoothed track bends and how fast the vehicle travels along it: the
//! lateral acceleration `v^2 * curvature` balanced against gravity gives the
//! roll angle. Curvature needs a second derivative of position, so both the
//! positions going in and the angle coming out are median- and mean-filtered.
//! Filter widths are set in seconds and converted with the recording's median
//! sample interval so behaviour does not depend on the sample rate.

use crate::math::calculus::gradient;
use crate::math::rolling::{duration_to_window, rolling_mean, rolling_median};
use crate::math::stats::StatsHelper;
use crate::prelude::{
    configured, PipelineConfig, ProcessingStage, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::record::StageKind;
use crate::telemetry::log::LogManager;
use ndarray::{Array1, Zip};

pub const GRAVITY: f64 = 9.81;
pub const MPS_TO_KPH: f64 = 3.6;

const TIME_NUDGE_S: f64 = 1e-9;
const CURVATURE_FLOOR: f64 = 1e-6;
const POSITION_WINDOW_FLOOR: usize = 5;
const LEAN_WINDOW_FLOOR: usize = 7;

pub struct KinematicsStage {
    config: Option<PipelineConfig>,
    logger: LogManager,
}

impl KinematicsStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("kinematics"),
        }
    }
}

impl Default for KinematicsStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds `i * 1ns` to each timestamp so repeated timestamps never produce a
/// zero-width difference.
pub fn strictly_increasing(times: &[f64]) -> Array1<f64> {
    times
        .iter()
        .enumerate()
        .map(|(i, &t)| t + i as f64 * TIME_NUDGE_S)
        .collect()
}

/// Median spacing of `times`, or `fallback` when that is not a usable step.
pub fn median_interval(times: &[f64], fallback: f64) -> f64 {
    let steps: Vec<f64> = times.windows(2).map(|pair| pair[1] - pair[0]).collect();
    match StatsHelper::median(&steps) {
        Some(step) if step.is_finite() && step > 0.0 => step,
        _ => fallback,
    }
}

fn despike(values: &[f64], median_window: usize, mean_window: usize) -> Array1<f64> {
    Array1::from(rolling_mean(
        &rolling_median(values, median_window),
        mean_window,
    ))
}

/// Signed path curvature (1/m) from positions sampled at `t`.
///
/// Positive when the path turns counter-clockwise.
pub fn curvature(x: &Array1<f64>, y: &Array1<f64>, t: &Array1<f64>) -> Array1<f64> {
    let dx = gradient(x.view(), t.view());
    let dy = gradient(y.view(), t.view());
    let ddx = gradient(dx.view(), t.view());
    let ddy = gradient(dy.view(), t.view());

    Zip::from(&dx)
        .and(&dy)
        .and(&ddx)
        .and(&ddy)
        .map_collect(|&dx, &dy, &ddx, &ddy| {
            let denominator = (dx * dx + dy * dy).powf(1.5).max(CURVATURE_FLOOR);
            let kappa = (dx * ddy - dy * ddx) / denominator;
            if kappa.is_finite() {
                kappa
            } else {
                0.0
            }
        })
}

/// Roll angle in degrees that balances the lateral acceleration.
pub fn lean_angle_deg(speed_mps: f64, kappa: f64, config: &PipelineConfig) -> f64 {
    if speed_mps.is_nan() || speed_mps < config.min_speed_mps {
        return 0.0;
    }
    let lateral = speed_mps * speed_mps * kappa;
    let lean = lateral.atan2(GRAVITY).to_degrees();
    if lean.is_finite() {
        lean.clamp(-config.max_lean_deg, config.max_lean_deg)
    } else {
        0.0
    }
}

impl ProcessingStage for KinematicsStage {
    fn name(&self) -> &'static str {
        "kinematics"
    }

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = configured(&self.config, self.name())?;
        let mut table = input.table;
        table.require(StageKind::Timebase, self.name())?;
        let rows = table.len();

        for sample in table.samples_mut() {
            let speed = (sample.vel_x * sample.vel_x
                + sample.vel_y * sample.vel_y
                + sample.vel_z * sample.vel_z)
                .sqrt();
            sample.derived.speed_mps = speed;
            sample.derived.speed_kph = speed * MPS_TO_KPH;
        }

        let t = strictly_increasing(&table.column(|s| s.derived.time_s));
        let median_dt = median_interval(
            t.as_slice().unwrap_or_default(),
            config.fallback_dt,
        );
        if rows > 1 && median_dt == config.fallback_dt {
            self.logger.detail(&format!(
                "median interval unusable, assuming {:.4} s",
                config.fallback_dt
            ));
        }

        let position_window =
            duration_to_window(config.pos_smooth_s, median_dt, POSITION_WINDOW_FLOOR);
        let lean_window = duration_to_window(config.lean_smooth_s, median_dt, LEAN_WINDOW_FLOOR);

        let x = despike(&table.column(|s| s.pos_x), position_window, position_window);
        let y = despike(&table.column(|s| s.pos_y), position_window, position_window);
        let kappa = curvature(&x, &y, &t);

        let raw_lean: Vec<f64> = table
            .samples()
            .iter()
            .zip(kappa.iter())
            .map(|(sample, &k)| lean_angle_deg(sample.derived.speed_mps, k, config))
            .collect();
        let lean = despike(&raw_lean, config.lean_median_window, lean_window);

        for (sample, &angle) in table.samples_mut().iter_mut().zip(lean.iter()) {
            let angle = if angle.is_finite() {
                angle.clamp(-config.max_lean_deg, config.max_lean_deg)
            } else {
                0.0
            };
            sample.derived.lean_deg_signed = angle;
            sample.derived.lean_deg = angle.abs();
        }

        let mut metadata = StageMetadata::new(self.name(), rows, rows);
        metadata.notes.push(format!(
            "median dt {:.4} s, position window {}, lean window {}",
            median_dt, position_window, lean_window
        ));
        self.logger.record(&metadata.notes[0]);

        table.mark_completed(StageKind::Kinematics);
        Ok(StageOutput { table, metadata })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
