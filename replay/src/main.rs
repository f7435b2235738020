use anyhow::Context;
use clap::Parser;
use generator::profile::build_recording;
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::VisualizationModel;
use motocore::ingest::write_recording;
use motocore::record::format_lap_time;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, WorkflowResult};

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline telemetry conditioning and lap replay driver")]
struct Args {
    /// Tab-separated recording to condition
    #[arg(long, required_unless_present = "synthetic")]
    input: Option<PathBuf>,
    /// Condition a generated circuit recording instead of a file
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 5.0)]
    jump_sigma: f64,
    #[arg(long, default_value_t = 0.01)]
    dt_per_tick: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Number of laps in a generated recording
    #[arg(long)]
    laps: Option<usize>,
    /// Write the conditioned snapshot as JSON
    #[arg(long)]
    output: Option<PathBuf>,
    /// Append a one-line run report
    #[arg(long)]
    report: Option<PathBuf>,
    /// Write the raw recording that was conditioned as TSV
    #[arg(long)]
    emit_recording: Option<PathBuf>,
    /// Keep the HTTP bridge alive to serve the snapshot
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display())),
        _ => Ok(()),
    }
}

fn print_summary(result: &WorkflowResult) {
    let summary = &result.output.summary;
    println!(
        "Conditioned {} rows over {:.2} s, frame interval {} ms",
        summary.row_count, summary.total_time_s, summary.frame_interval_ms
    );
    for counts in &result.stage_counts {
        println!(
            "  {:<16} {:>7} -> {:>7}",
            counts.stage, counts.rows_in, counts.rows_out
        );
    }
    for lap in &summary.laps {
        println!(
            "  lap {:>3}  {}  max {:>6.1} km/h  max lean {:>4.1} deg",
            lap.lap_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            format_lap_time(lap.duration_s),
            lap.max_speed_kph,
            lap.max_lean_deg
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = &args.config {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.jump_sigma, args.dt_per_tick, args.seed)
    };
    if let Some(laps) = args.laps {
        workflow_config.generator.laps = laps;
    }

    let runner = Runner::new(workflow_config);
    let gui_bridge = GuiBridge::new();

    let table = match &args.input {
        Some(path) => runner.load(path)?,
        None => build_recording(&runner.config().generator)?,
    };

    if let Some(path) = &args.emit_recording {
        create_parent(path)?;
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_recording(&table, BufWriter::new(file))
            .with_context(|| format!("writing recording {}", path.display()))?;
    }

    let result = runner.execute(table)?;
    print_summary(&result);

    let model = VisualizationModel::from_output(&result.output);

    if let Some(path) = &args.output {
        create_parent(path)?;
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &model)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
    }

    if let Some(path) = &args.report {
        let summary = &result.output.summary;
        let report = format!(
            "rows={} laps={} total_time_s={:.3} frame_interval_ms={} stages={:?}\n",
            summary.row_count,
            summary.laps.len(),
            summary.total_time_s,
            summary.frame_interval_ms,
            result
                .stage_counts
                .iter()
                .map(|c| (c.stage, c.rows_out))
                .collect::<Vec<_>>()
        );
        create_parent(path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening report {}", path.display()))?;
        file.write_all(report.as_bytes())?;
    }

    gui_bridge.publish(model);
    gui_bridge.publish_status("Conditioned snapshot ready.");

    if args.serve {
        gui_bridge.serve(runner.config().bind_address)?;
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
