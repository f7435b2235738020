use crate::prelude::{
    configured, PipelineConfig, ProcessingStage, SlewRates, StageInput, StageMetadata,
    StageOutput, StageResult,
};
use crate::record::StageKind;
use crate::telemetry::log::LogManager;

/// Smooths throttle and brake the way the real controls can move: jitter is
/// averaged out, then the signal may only rise or fall at its actuation rate.
pub struct InputStage {
    config: Option<PipelineConfig>,
    logger: LogManager,
}

impl InputStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("inputs"),
        }
    }
}

impl Default for InputStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Causal exponential moving average, clamped to `[0, 1]`.
pub fn exponential_smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    values
        .iter()
        .scan(None, |state: &mut Option<f64>, &value| {
            let next = match *state {
                None => value,
                Some(previous) => alpha * value + (1.0 - alpha) * previous,
            };
            *state = Some(next);
            Some(next.clamp(0.0, 1.0))
        })
        .collect()
}

/// One limiter step from `previous` toward `target` over `dt` seconds.
pub fn slew_step(previous: f64, target: f64, dt: f64, rates: SlewRates) -> f64 {
    let delta = target - previous;
    let delta = if delta > 0.0 {
        delta.min(rates.up * dt)
    } else {
        delta.max(-rates.down * dt)
    };
    previous + delta
}

/// Left-to-right scan: each output depends on the one before it.
pub fn slew_limit(targets: &[f64], dt: &[f64], rates: SlewRates) -> Vec<f64> {
    targets
        .iter()
        .zip(dt)
        .scan(None, |state: &mut Option<f64>, (&target, &step)| {
            let next = match *state {
                None => target,
                Some(previous) => slew_step(previous, target, step, rates),
            };
            *state = Some(next);
            Some(next)
        })
        .map(|value| value.clamp(0.0, 1.0))
        .collect()
}

pub fn smooth_and_limit(raw: &[f64], dt: &[f64], alpha: f64, rates: SlewRates) -> Vec<f64> {
    slew_limit(&exponential_smooth(raw, alpha), dt, rates)
}

impl ProcessingStage for InputStage {
    fn name(&self) -> &'static str {
        "inputs"
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

        let dt = table.column(|s| s.derived.dt);
        let throttle = smooth_and_limit(
            &table.column(|s| s.throttle),
            &dt,
            config.smoothing_alpha,
            config.throttle_rates,
        );
        let brake = smooth_and_limit(
            &table.column(|s| s.brake),
            &dt,
            config.smoothing_alpha,
            config.brake_rates,
        );

        for ((sample, throttle), brake) in table.samples_mut().iter_mut().zip(throttle).zip(brake)
        {
            sample.derived.throttle_smooth = throttle;
            sample.derived.brake_smooth = brake;
        }

        self.logger.record(&format!(
            "smoothed {} rows, alpha {}",
            rows, config.smoothing_alpha
        ));
        table.mark_completed(StageKind::Inputs);
        Ok(StageOutput {
            table,
            metadata: StageMetadata::new(self.name(), rows, rows),
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
