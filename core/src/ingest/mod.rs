pub mod loader;

pub use loader::{write_recording, LoadError, TelemetryLoader, REQUIRED_COLUMNS};
