use crate::math::stats::StatsHelper;
use crate::record::table::TelemetryTable;
use serde::Serialize;

/// Per-lap figures shown alongside the replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapSummary {
    pub lap_id: Option<i64>,
    pub samples: usize,
    pub duration_s: f64,
    pub max_speed_kph: f64,
    pub max_lean_deg: f64,
}

/// Scalar values handed to presentation together with the rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub row_count: usize,
    pub total_time_s: f64,
    /// Animation cadence: the median clamped step, in whole milliseconds.
    pub frame_interval_ms: u64,
    pub laps: Vec<LapSummary>,
}

impl TableSummary {
    pub fn from_table(table: &TelemetryTable) -> Self {
        let samples = table.samples();
        let total_time_s = samples.last().map(|s| s.derived.time_s).unwrap_or(0.0);
        let median_dt = StatsHelper::median(&table.column(|s| s.derived.dt)).unwrap_or(0.0);
        let frame_interval_ms = (1000.0 * median_dt).max(0.0) as u64;

        let mut laps: Vec<LapSummary> = Vec::new();
        for sample in samples {
            let index = match laps.iter().position(|lap| lap.lap_id == sample.lap_id) {
                Some(index) => index,
                None => {
                    laps.push(LapSummary {
                        lap_id: sample.lap_id,
                        samples: 0,
                        duration_s: 0.0,
                        max_speed_kph: 0.0,
                        max_lean_deg: 0.0,
                    });
                    laps.len() - 1
                }
            };
            let lap = &mut laps[index];
            lap.samples += 1;
            lap.duration_s = lap.duration_s.max(sample.derived.lap_time_s);
            lap.max_speed_kph = lap.max_speed_kph.max(sample.derived.speed_kph);
            lap.max_lean_deg = lap.max_lean_deg.max(sample.derived.lean_deg);
        }

        Self {
            row_count: samples.len(),
            total_time_s,
            frame_interval_ms,
            laps,
        }
    }
}

/// Formats elapsed seconds as `m:ss.sss`.
pub fn format_lap_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor();
    let remainder = seconds - 60.0 * minutes;
    format!("{}:{:06.3}", minutes as u64, remainder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample::Sample;

    fn processed(tick: i64, lap: i64, lap_time_s: f64, speed_kph: f64) -> Sample {
        let mut sample =
            Sample::new(tick, Some(lap), (0.0, 0.0), (0.0, 0.0, 0.0), 0.0, 0.0, 0.0, 1.0);
        sample.derived.dt = 0.01;
        sample.derived.time_s = tick as f64 * 0.01;
        sample.derived.lap_time_s = lap_time_s;
        sample.derived.speed_kph = speed_kph;
        sample
    }

    #[test]
    fn format_lap_time_pads_seconds() {
        assert_eq!(format_lap_time(0.0), "0:00.000");
        assert_eq!(format_lap_time(5.25), "0:05.250");
        assert_eq!(format_lap_time(101.5), "1:41.500");
    }

    #[test]
    fn summary_groups_laps_in_order_of_appearance() {
        let table = TelemetryTable::new(
            vec![
                processed(1, 2, 0.0, 100.0),
                processed(2, 2, 0.01, 120.0),
                processed(3, 3, 0.0, 90.0),
            ],
            true,
        );
        let summary = TableSummary::from_table(&table);
        assert_eq!(summary.row_count, 3);
        assert_eq!(summary.frame_interval_ms, 10);
        assert!((summary.total_time_s - 0.03).abs() < 1e-12);
        assert_eq!(summary.laps.len(), 2);
        assert_eq!(summary.laps[0].lap_id, Some(2));
        assert_eq!(summary.laps[0].samples, 2);
        assert_eq!(summary.laps[0].max_speed_kph, 120.0);
    }

    #[test]
    fn empty_table_summarizes_to_zero() {
        let summary = TableSummary::from_table(&TelemetryTable::default());
        assert_eq!(summary.row_count, 0);
        assert_eq!(summary.frame_interval_ms, 0);
        assert!(summary.laps.is_empty());
    }
}
