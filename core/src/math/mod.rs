pub mod calculus;
pub mod rolling;
pub mod stats;

pub use calculus::gradient;
pub use rolling::{duration_to_window, rolling_mean, rolling_median};
pub use stats::StatsHelper;
