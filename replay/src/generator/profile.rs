use anyhow::{bail, Context};
use motocore::record::{Sample, TelemetryTable, MISSING, MISSING_GEAR};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Instrument rate of the synthetic recorder: one tick per sample.
const TICK_HZ: f64 = 100.0;
const GLITCH_OFFSET_M: f64 = 250.0;

/// Configuration for generating a synthetic circuit recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub laps: usize,
    pub radius_m: f64,
    pub speed_mps: f64,
    /// Relative swing of speed around `speed_mps`, twice per lap.
    pub speed_swing: f64,
    pub out_lap_samples: usize,
    pub noise_m: f64,
    /// Chance that any one row loses a channel to the missing sentinel.
    pub dropout_rate: f64,
    pub glitches: usize,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            laps: 2,
            radius_m: 60.0,
            speed_mps: 25.0,
            speed_swing: 0.3,
            out_lap_samples: 50,
            noise_m: 0.02,
            dropout_rate: 0.002,
            glitches: 2,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.laps == 0 {
            bail!("generator needs at least one lap");
        }
        if !(self.radius_m > 0.0 && self.speed_mps > 0.0) {
            bail!(
                "generator radius {} and speed {} must be positive",
                self.radius_m,
                self.speed_mps
            );
        }
        if !(0.0..1.0).contains(&self.speed_swing) {
            bail!("speed swing {} must lie in [0, 1)", self.speed_swing);
        }
        if !(0.0..=1.0).contains(&self.dropout_rate) {
            bail!("dropout rate {} must lie in [0, 1]", self.dropout_rate);
        }
        Ok(())
    }
}

fn gear_for(speed_mps: f64) -> f64 {
    (1.0 + (speed_mps / 12.0).floor()).clamp(1.0, 6.0)
}

fn drop_channel(sample: &mut Sample, channel: u8) {
    match channel {
        0 => sample.throttle = MISSING,
        1 => sample.brake = MISSING,
        2 => sample.rpm = MISSING,
        3 => sample.pos_x = MISSING,
        4 => sample.pos_y = MISSING,
        _ => sample.gear = MISSING_GEAR,
    }
}

/// Counter-clockwise laps of a circle with a speed profile that makes the
/// rider brake and accelerate twice per lap.
pub fn build_recording(config: &GeneratorConfig) -> anyhow::Result<TelemetryTable> {
    config.validate()?;
    let dt = 1.0 / TICK_HZ;
    let total_angle = TAU * config.laps as f64;
    let min_speed = config.speed_mps * (1.0 - config.speed_swing);
    let estimate = (total_angle * config.radius_m / min_speed / dt).ceil() as usize;
    let capacity = estimate
        .checked_add(config.out_lap_samples)
        .context("overflow computing sample count for generator")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut samples = Vec::with_capacity(capacity);
    let jitter = |rng: &mut StdRng| {
        if config.noise_m > 0.0 {
            rng.gen_range(-config.noise_m..config.noise_m)
        } else {
            0.0
        }
    };

    for tick in 0..config.out_lap_samples {
        samples.push(Sample::new(
            tick as i64,
            Some(0),
            (config.radius_m + 10.0, -5.0),
            (0.0, 0.0, 0.0),
            0.0,
            0.2,
            2500.0,
            1.0,
        ));
    }

    let mut theta = 0.0_f64;
    let mut tick = config.out_lap_samples as i64;
    while theta < total_angle {
        let speed = config.speed_mps * (1.0 + config.speed_swing * (2.0 * theta).cos());
        let accel = -2.0 * config.speed_swing * config.speed_mps * (2.0 * theta).sin()
            * speed
            / config.radius_m;
        let throttle = (0.55 + accel / 8.0).clamp(0.0, 1.0);
        let brake = (-accel / 10.0).clamp(0.0, 1.0);
        let gear = gear_for(speed);
        let rpm = 4000.0 + 9000.0 * (speed / 12.0).fract();
        let lap = 1 + (theta / TAU).floor() as i64;

        let position = (
            config.radius_m * theta.cos() + jitter(&mut rng),
            config.radius_m * theta.sin() + jitter(&mut rng),
        );
        let velocity = (-speed * theta.sin(), speed * theta.cos(), 0.0);
        let mut sample =
            Sample::new(tick, Some(lap), position, velocity, throttle, brake, rpm, gear);
        if config.dropout_rate > 0.0 && rng.gen_bool(config.dropout_rate) {
            drop_channel(&mut sample, rng.gen_range(0..6));
        }
        samples.push(sample);

        theta += speed * dt / config.radius_m;
        tick += 1;
    }

    let racing = samples.len() - config.out_lap_samples;
    if racing > 2 {
        for _ in 0..config.glitches {
            let index = config.out_lap_samples + rng.gen_range(1..racing - 1);
            let sample = &mut samples[index];
            if sample.pos_x != MISSING {
                sample.pos_x += GLITCH_OFFSET_M;
            }
        }
    }

    Ok(TelemetryTable::new(samples, true))
}
