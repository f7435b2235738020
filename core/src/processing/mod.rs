pub mod inputs;
pub mod kinematics;
pub mod laps;
pub mod outliers;
pub mod pipeline;
pub mod sanitizer;
pub mod timebase;

pub use inputs::InputStage;
pub use kinematics::KinematicsStage;
pub use laps::LapStage;
pub use outliers::OutlierStage;
pub use pipeline::{Pipeline, PipelineOutput};
pub use sanitizer::SanitizerStage;
pub use timebase::TimebaseStage;
