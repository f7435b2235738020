//! Telemetry conditioning core for lap replay.
//!
//! A raw recording is loaded whole, then passed through six stages in
//! order: sanitizing, GPS jump rejection, timebase reconstruction, speed and
//! lean estimation, driver-input smoothing, and lap segmentation. The result
//! is an immutable table that presentation reads frame by frame.

pub mod ingest;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod record;
pub mod telemetry;

pub use ingest::{LoadError, TelemetryLoader};
pub use prelude::{PipelineConfig, ProcessingStage, StageError, StageInput, StageOutput};
pub use processing::{Pipeline, PipelineOutput};
pub use record::{Sample, TableSummary, TelemetryTable};
