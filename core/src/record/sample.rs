use serde::{Deserialize, Serialize};

/// Value the instrument writes when a floating-point channel has no reading.
pub const MISSING: f64 = -1.0;

/// Value the instrument writes when the gear channel has no reading.
pub const MISSING_GEAR: f64 = -1.0;

/// Columns filled in by the conditioning stages.
///
/// Every field stays at zero until the stage that owns it has run; the table
/// records which stages completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    pub dt_raw: f64,
    pub dt: f64,
    pub time_s: f64,
    pub speed_mps: f64,
    pub speed_kph: f64,
    pub lean_deg_signed: f64,
    pub lean_deg: f64,
    pub throttle_smooth: f64,
    pub brake_smooth: f64,
    pub lap_time_s: f64,
}

/// One row of the recording, in recording order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub tick: i64,
    /// `None` when the lap column is absent or the cell was blank.
    pub lap_id: Option<i64>,
    pub pos_x: f64,
    pub pos_y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub vel_z: f64,
    pub throttle: f64,
    pub brake: f64,
    pub rpm: f64,
    /// Integral after sanitizing; kept as a float so the sentinel survives loading.
    pub gear: f64,
    #[serde(flatten)]
    pub derived: Derived,
}

impl Sample {
    /// Builds a raw sample with no derived columns.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tick: i64,
        lap_id: Option<i64>,
        position: (f64, f64),
        velocity: (f64, f64, f64),
        throttle: f64,
        brake: f64,
        rpm: f64,
        gear: f64,
    ) -> Self {
        Self {
            tick,
            lap_id,
            pos_x: position.0,
            pos_y: position.1,
            vel_x: velocity.0,
            vel_y: velocity.1,
            vel_z: velocity.2,
            throttle,
            brake,
            rpm,
            gear,
            derived: Derived::default(),
        }
    }

    pub fn gear_number(&self) -> u8 {
        self.gear.round().clamp(0.0, u8::MAX as f64) as u8
    }
}
