//! Centered rolling filters over a column.
//!
//! Windows are clipped at the ends of the series, so the first and last
//! `window / 2` outputs are computed from the samples that exist.

use crate::math::stats::StatsHelper;

/// Converts a smoothing duration into an odd sample count of at least `floor`.
pub fn duration_to_window(duration_s: f64, median_dt: f64, floor: usize) -> usize {
    let samples = if duration_s.is_finite() && median_dt.is_finite() && median_dt > 0.0 {
        (duration_s / median_dt).round().max(0.0) as usize
    } else {
        0
    };
    let window = samples.max(floor).max(1);
    if window % 2 == 0 {
        window + 1
    } else {
        window
    }
}

fn centered<F>(values: &[f64], window: usize, reduce: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let half = window / 2;
    let len = values.len();
    (0..len)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(len);
            reduce(&values[start..end])
        })
        .collect()
}

pub fn rolling_median(values: &[f64], window: usize) -> Vec<f64> {
    centered(values, window, |slice| {
        StatsHelper::median(slice).unwrap_or(f64::NAN)
    })
}

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    centered(values, window, |slice| {
        StatsHelper::mean(slice).unwrap_or(f64::NAN)
    })
}
