pub mod sample;
pub mod summary;
pub mod table;

pub use sample::{Derived, Sample, MISSING, MISSING_GEAR};
pub use summary::{format_lap_time, LapSummary, TableSummary};
pub use table::{StageKind, TelemetryTable};
