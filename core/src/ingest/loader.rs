use crate::record::{Sample, TelemetryTable, MISSING, MISSING_GEAR};
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

pub const TICK_COLUMN: &str = "binIndex";
pub const LAP_COLUMN: &str = "lapIndex";

/// Header names the recording must carry; `lapIndex` is optional.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    TICK_COLUMN,
    "world_position_X",
    "world_position_Y",
    "velocity_X",
    "velocity_Y",
    "velocity_Z",
    "throttle",
    "brake_0",
    "rpm",
    "gear",
];

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("opening {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed recording: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column {0} is absent")]
    MissingColumn(String),
    #[error("row {line} has no {column} value")]
    MissingValue { line: u64, column: &'static str },
    #[error("recording has no rows")]
    Empty,
}

/// Row layout of the instrument's tab-separated export.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "binIndex")]
    tick: Option<f64>,
    #[serde(rename = "lapIndex", default)]
    lap_id: Option<f64>,
    #[serde(rename = "world_position_X")]
    pos_x: Option<f64>,
    #[serde(rename = "world_position_Y")]
    pos_y: Option<f64>,
    #[serde(rename = "velocity_X")]
    vel_x: Option<f64>,
    #[serde(rename = "velocity_Y")]
    vel_y: Option<f64>,
    #[serde(rename = "velocity_Z")]
    vel_z: Option<f64>,
    throttle: Option<f64>,
    #[serde(rename = "brake_0")]
    brake: Option<f64>,
    rpm: Option<f64>,
    gear: Option<f64>,
}

impl RawRecord {
    fn into_sample(self, line: u64) -> Result<Sample, LoadError> {
        let tick = self
            .tick
            .filter(|t| t.is_finite())
            .ok_or(LoadError::MissingValue {
                line,
                column: TICK_COLUMN,
            })?;
        let lap_id = self.lap_id.filter(|l| l.is_finite()).map(|l| l.round() as i64);
        let reading = |value: Option<f64>| value.unwrap_or(MISSING);
        // Velocity has no sentinel of its own; a blank cell means at rest.
        let velocity = |value: Option<f64>| value.filter(|v| v.is_finite()).unwrap_or(0.0);

        Ok(Sample::new(
            tick.round() as i64,
            lap_id,
            (reading(self.pos_x), reading(self.pos_y)),
            (velocity(self.vel_x), velocity(self.vel_y), velocity(self.vel_z)),
            reading(self.throttle),
            reading(self.brake),
            reading(self.rpm),
            self.gear.unwrap_or(MISSING_GEAR),
        ))
    }
}

/// Reads a complete recording before any processing starts.
pub struct TelemetryLoader;

impl TelemetryLoader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<TelemetryTable, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file)?;
        log::info!("loaded {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<TelemetryTable, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(LoadError::MissingColumn(column.to_string()));
            }
        }
        let has_lap_column = headers.iter().any(|h| h == LAP_COLUMN);

        let mut samples = Vec::new();
        for (index, record) in reader.deserialize::<RawRecord>().enumerate() {
            // Line 1 is the header.
            samples.push(record?.into_sample(index as u64 + 2)?);
        }
        if samples.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(TelemetryTable::new(samples, has_lap_column))
    }
}

/// Writes the source columns of `table` in the instrument's layout.
pub fn write_recording<W: io::Write>(
    table: &TelemetryTable,
    writer: W,
) -> Result<(), LoadError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    let with_lap = table.has_lap_column();
    let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    if with_lap {
        header.insert(1, LAP_COLUMN);
    }
    writer.write_record(&header)?;

    for sample in table.samples() {
        let mut row = vec![sample.tick.to_string()];
        if with_lap {
            row.push(sample.lap_id.map(|l| l.to_string()).unwrap_or_default());
        }
        row.extend(
            [
                sample.pos_x,
                sample.pos_y,
                sample.vel_x,
                sample.vel_y,
                sample.vel_z,
                sample.throttle,
                sample.brake,
                sample.rpm,
                sample.gear,
            ]
            .iter()
            .map(f64::to_string),
        );
        writer.write_record(&row)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
