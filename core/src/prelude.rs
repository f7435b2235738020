use crate::record::TelemetryTable;
use serde::{Deserialize, Serialize};

/// Asymmetric actuation limits for one driver input, in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlewRates {
    pub up: f64,
    pub down: f64,
}

impl SlewRates {
    pub const fn new(up: f64, down: f64) -> Self {
        Self { up, down }
    }
}

/// Shared configuration for each processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Widest run of missing samples bridged by interpolation, per side.
    pub interpolate_limit: usize,
    pub jump_sigma: f64,
    pub dt_per_tick: f64,
    pub min_dt: f64,
    pub max_dt: f64,
    pub smoothing_alpha: f64,
    pub throttle_rates: SlewRates,
    pub brake_rates: SlewRates,
    pub min_speed_mps: f64,
    pub max_lean_deg: f64,
    pub pos_smooth_s: f64,
    pub lean_smooth_s: f64,
    pub lean_median_window: usize,
    /// Sample interval assumed when the recording's own cadence is degenerate.
    pub fallback_dt: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interpolate_limit: 10,
            jump_sigma: 5.0,
            dt_per_tick: 0.01,
            min_dt: 0.01,
            max_dt: 0.20,
            smoothing_alpha: 0.15,
            throttle_rates: SlewRates::new(7.0, 9.0),
            brake_rates: SlewRates::new(7.0, 9.0),
            min_speed_mps: 3.0,
            max_lean_deg: 70.0,
            pos_smooth_s: 0.12,
            lean_smooth_s: 0.25,
            lean_median_window: 5,
            fallback_dt: 1.0 / 60.0,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> StageResult<()> {
        fn positive(name: &str, value: f64) -> StageResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(StageError::InvalidInput(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        }

        positive("dt_per_tick", self.dt_per_tick)?;
        positive("min_dt", self.min_dt)?;
        positive("max_dt", self.max_dt)?;
        if self.min_dt > self.max_dt {
            return Err(StageError::InvalidInput(format!(
                "min_dt {} exceeds max_dt {}",
                self.min_dt, self.max_dt
            )));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(StageError::InvalidInput(format!(
                "smoothing_alpha must lie in (0, 1], got {}",
                self.smoothing_alpha
            )));
        }
        positive("throttle_rates.up", self.throttle_rates.up)?;
        positive("throttle_rates.down", self.throttle_rates.down)?;
        positive("brake_rates.up", self.brake_rates.up)?;
        positive("brake_rates.down", self.brake_rates.down)?;
        positive("max_lean_deg", self.max_lean_deg)?;
        positive("pos_smooth_s", self.pos_smooth_s)?;
        positive("lean_smooth_s", self.lean_smooth_s)?;
        positive("fallback_dt", self.fallback_dt)?;
        if !(self.jump_sigma.is_finite() && self.jump_sigma >= 0.0) {
            return Err(StageError::InvalidInput(format!(
                "jump_sigma must be non-negative, got {}",
                self.jump_sigma
            )));
        }
        if !(self.min_speed_mps.is_finite() && self.min_speed_mps >= 0.0) {
            return Err(StageError::InvalidInput(format!(
                "min_speed_mps must be non-negative, got {}",
                self.min_speed_mps
            )));
        }
        if self.lean_median_window == 0 || self.lean_median_window % 2 == 0 {
            return Err(StageError::InvalidInput(format!(
                "lean_median_window must be odd, got {}",
                self.lean_median_window
            )));
        }
        Ok(())
    }
}

/// Input payload for a processing stage.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub table: TelemetryTable,
}

/// Output produced by each stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub table: TelemetryTable,
    pub metadata: StageMetadata,
}

/// Metadata used for chaining stages and row accounting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageMetadata {
    pub stage: &'static str,
    pub rows_in: usize,
    pub rows_out: usize,
    pub notes: Vec<String>,
}

impl StageMetadata {
    pub fn new(stage: &'static str, rows_in: usize, rows_out: usize) -> Self {
        Self {
            stage,
            rows_in,
            rows_out,
            notes: Vec::new(),
        }
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_out)
    }
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing column: {0}")]
    MissingColumn(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// Trait describing the table-to-table conditioning stages.
pub trait ProcessingStage {
    fn name(&self) -> &'static str;
    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()>;
    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput>;
    fn cleanup(&mut self);
}

/// Borrows the configuration a stage received in `initialize`.
pub(crate) fn configured<'a>(
    config: &'a Option<PipelineConfig>,
    stage: &str,
) -> StageResult<&'a PipelineConfig> {
    config
        .as_ref()
        .ok_or_else(|| StageError::Internal(format!("{} stage not initialized", stage)))
}
