//! export_metrics - dump the persisted metrics log and alert log as JSON

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::Path;

use safety_witness::{Alert, MetricsLogStore, MetricsSample, SqliteMetricsLogStore};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the metrics database.
    #[arg(long, env = "SAFETY_DB_PATH", default_value = "safety_metrics.db")]
    db_path: String,
    /// Maximum samples (and alerts) to export.
    #[arg(long, default_value_t = 10_000)]
    limit: usize,
    /// Leave alerts out of the export.
    #[arg(long)]
    no_alerts: bool,
    /// Output file path. Writes to stdout when omitted.
    #[arg(long)]
    output: Option<String>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Serialize)]
struct Overview {
    samples: usize,
    first_frame: Option<u64>,
    last_frame: Option<u64>,
    risk_events: u64,
    frames_with_risk: usize,
    mean_helmet_compliance: Option<f64>,
    mean_mask_compliance: Option<f64>,
}

#[derive(Serialize)]
struct Export {
    overview: Overview,
    samples: Vec<MetricsSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alerts: Option<Vec<Alert>>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

fn overview(samples: &[MetricsSample]) -> Overview {
    Overview {
        samples: samples.len(),
        first_frame: samples.first().map(|s| s.frame_index),
        last_frame: samples.last().map(|s| s.frame_index),
        risk_events: samples.iter().map(|s| u64::from(s.risk_count)).sum(),
        frames_with_risk: samples.iter().filter(|s| s.risk_count > 0).count(),
        mean_helmet_compliance: mean(samples.iter().filter_map(|s| s.helmet_compliance())),
        mean_mask_compliance: mean(samples.iter().filter_map(|s| s.mask_compliance())),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(&args.ui, is_tty, !stdout_is_tty);

    if !args.db_path.starts_with("file:") && !Path::new(&args.db_path).exists() {
        return Err(anyhow!("metrics database {} does not exist", args.db_path));
    }

    let store = {
        let _stage = ui.stage("Open metrics log");
        SqliteMetricsLogStore::open(&args.db_path)?
    };

    let export = {
        let mut stage = ui.stage("Read samples and alerts");
        let samples = store.samples(args.limit)?;
        let alerts = if args.no_alerts {
            None
        } else {
            Some(store.alerts(args.limit)?)
        };
        stage.update(format!(
            "{} samples, {} alerts",
            samples.len(),
            alerts.as_ref().map_or(0, |a| a.len())
        ));
        Export {
            overview: overview(&samples),
            samples,
            alerts,
        }
    };

    let json = serde_json::to_string_pretty(&export)?;
    match &args.output {
        Some(path) => {
            let _stage = ui.stage("Write export");
            std::fs::write(path, json.as_bytes())
                .map_err(|e| anyhow!("failed to write {}: {}", path, e))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
