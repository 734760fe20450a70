//! safetyd - Safety Witness daemon
//!
//! This daemon:
//! 1. Opens the configured frame source (`stub://...` or a `.jsonl` replay)
//! 2. Runs the PPE and hazard detectors on every frame
//! 3. Scores equipment compliance and hazard proximity per frame
//! 4. Logs KPIs, trends and alerts, and appends samples + alerts to SQLite
//! 5. Stops at end of stream, on a read failure, or on Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use safety_witness::{
    open_source, AlertOrigin, DetectorRegistry, DetectorRole, FanoutSink, LogSink, Orchestrator,
    SafetydConfig, SqliteMetricsLogStore, StepOutcome, StoreSink, StubBackend,
};

#[path = "../ui.rs"]
mod ui;

/// Refresh the run spinner every this many frames.
const PROGRESS_EVERY: u64 = 10;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run the Safety Witness frame orchestrator against a source"
)]
struct Args {
    /// Frame source identifier (overrides SAFETY_SOURCE / config file).
    #[arg(long)]
    source: Option<String>,

    /// Path to the metrics SQLite DB (overrides SAFETY_DB_PATH / config file).
    #[arg(long)]
    db_path: Option<String>,

    /// Camera id stamped on alerts.
    #[arg(long)]
    camera_id: Option<String>,

    /// Zone label stamped on alerts.
    #[arg(long)]
    zone: Option<String>,

    /// Run both detectors concurrently for each frame.
    #[arg(long)]
    parallel: bool,

    /// Log a trend line every N frames.
    #[arg(long, default_value = "25")]
    trend_every: u64,

    /// Write an annotated latest.jpg into this directory.
    #[cfg(feature = "render-jpeg")]
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<String>,

    /// Write a snapshot every N frames.
    #[cfg(feature = "render-jpeg")]
    #[arg(long, default_value = "10")]
    snapshot_every: u64,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let ui = ui::Ui::from_args(&args.ui, is_tty, false);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = SafetydConfig::load()?;
        if let Some(source) = &args.source {
            cfg.source = source.clone();
        }
        if let Some(db_path) = &args.db_path {
            cfg.db_path = db_path.clone();
        }
        if let Some(camera_id) = &args.camera_id {
            cfg.camera.id = camera_id.clone();
        }
        if let Some(zone) = &args.zone {
            let zone = zone.trim().to_lowercase();
            if zone.is_empty() {
                return Err(anyhow!("--zone must not be empty"));
            }
            cfg.camera.zone = zone;
        }
        if args.parallel {
            cfg.engine.parallel_detectors = true;
        }
        cfg
    };

    let opened = {
        let _stage = ui.stage("Open source");
        open_source(&cfg.source)?
    };

    let detectors = {
        let _stage = ui.stage("Warm up detectors");
        let detectors = match opened.recorded {
            Some(recorded) => {
                log::info!("using recorded detector output from {}", cfg.source);
                DetectorRegistry::new()
                    .with(DetectorRole::Ppe, recorded.ppe)?
                    .with(DetectorRole::Hazard, recorded.hazard)?
            }
            None => {
                log::info!("using stub detectors (seed {})", cfg.stub_seed);
                DetectorRegistry::new()
                    .with(
                        DetectorRole::Ppe,
                        StubBackend::new(DetectorRole::Ppe, cfg.stub_seed),
                    )?
                    .with(
                        DetectorRole::Hazard,
                        StubBackend::new(DetectorRole::Hazard, cfg.stub_seed),
                    )?
            }
        };
        detectors.warm_up()?;
        detectors
    };

    let store = {
        let _stage = ui.stage("Open metrics log");
        SqliteMetricsLogStore::open(&cfg.db_path)?
    };

    let mut sink = FanoutSink::new()
        .with(LogSink::new(args.trend_every))
        .with(StoreSink::new(store));
    add_snapshot_sink(&mut sink, &args)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let origin = AlertOrigin {
        camera_id: cfg.camera.id.clone(),
        zone: cfg.camera.zone.clone(),
    };
    let mut orchestrator =
        Orchestrator::new(cfg.engine.clone(), opened.source, detectors, origin)?
            .with_stop_flag(stop);

    log::info!("safetyd running. writing to {}", cfg.db_path);
    log::info!(
        "camera={} zone={} confidence>={} equip<{}px hazard<{}px window={}",
        cfg.camera.id,
        cfg.camera.zone,
        cfg.engine.confidence_threshold,
        cfg.engine.equip_distance_threshold,
        cfg.engine.hazard_distance_threshold,
        cfg.engine.history_window
    );

    let summary = {
        let mut stage = ui.stage("Process frames");
        loop {
            match orchestrator.step(&mut sink)? {
                StepOutcome::Stopped(_) => break,
                StepOutcome::Processed(sample) => {
                    let processed = orchestrator.summary().frames_processed;
                    if processed % PROGRESS_EVERY == 0 {
                        stage.update(format!(
                            "frame {} ({} processed, {} risk events)",
                            sample.frame_index,
                            processed,
                            orchestrator.summary().risk_events
                        ));
                    }
                }
                StepOutcome::Skipped { .. } => {}
            }
        }
        let summary = orchestrator.summary().clone();
        stage.update(format!("{} frames", summary.frames_processed));
        summary
    };

    log::info!(
        "run finished: reason={:?} processed={} skipped={} risks={} alerts={} dropped_rows={} sink_errors={}",
        summary.stop_reason,
        summary.frames_processed,
        summary.frames_skipped,
        summary.risk_events,
        summary.alerts,
        summary.normalize_warnings,
        summary.sink_errors
    );
    if let Some(latest) = orchestrator.history().latest() {
        log::info!(
            "last frame {}: helmet compliance {} mask compliance {} (peak risk in window {})",
            latest.frame_index,
            percent(latest.helmet_compliance()),
            percent(latest.mask_compliance()),
            orchestrator.history().peak_risk()
        );
    }
    Ok(())
}

#[cfg(feature = "render-jpeg")]
fn add_snapshot_sink(sink: &mut FanoutSink, args: &Args) -> Result<()> {
    if let Some(dir) = &args.snapshot_dir {
        let snapshots = safety_witness::sink::JpegSnapshotSink::new(dir, args.snapshot_every)?;
        log::info!("writing snapshots to {}", snapshots.snapshot_path().display());
        sink.push(Box::new(snapshots));
    }
    Ok(())
}

#[cfg(not(feature = "render-jpeg"))]
fn add_snapshot_sink(_sink: &mut FanoutSink, _args: &Args) -> Result<()> {
    Ok(())
}

fn percent(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.0}%", r * 100.0),
        None => "n/a".to_string(),
    }
}
