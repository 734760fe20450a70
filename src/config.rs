use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::detect::ObjectClass;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_EQUIP_DISTANCE_THRESHOLD: f64 = 80.0;
pub const DEFAULT_HAZARD_DISTANCE_THRESHOLD: f64 = 150.0;
pub const DEFAULT_RISK_HAZARD_KINDS: &[ObjectClass] = &[ObjectClass::Fire, ObjectClass::Smoke];
pub const DEFAULT_HISTORY_WINDOW: usize = 50;

const DEFAULT_SOURCE: &str = "stub://site_camera";
const DEFAULT_DB_PATH: &str = "safety_metrics.db";
const DEFAULT_CAMERA_ID: &str = "CAM-1";
const DEFAULT_ZONE: &str = "zone:site";
const DEFAULT_STUB_SEED: u64 = 7;

/// What the orchestrator does when a detector call fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorFailurePolicy {
    /// Log, append no sample for the frame, keep running.
    #[default]
    Skip,
    /// Stop the run and return the error.
    Abort,
}

/// Engine thresholds and limits. Injected into the orchestrator at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Passed to detectors; rows below it never reach the engine.
    pub confidence_threshold: f32,
    /// Person ↔ equipment center distance must be strictly below this.
    pub equip_distance_threshold: f64,
    /// Person ↔ hazard center distance must be strictly below this.
    pub hazard_distance_threshold: f64,
    /// Hazard kinds that raise a risk event near an unmasked person.
    pub risk_hazard_kinds: BTreeSet<ObjectClass>,
    /// Samples retained in the rolling trend history.
    pub history_window: usize,
    /// Run the two detectors concurrently (joined before association).
    pub parallel_detectors: bool,
    pub detector_failure: DetectorFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            equip_distance_threshold: DEFAULT_EQUIP_DISTANCE_THRESHOLD,
            hazard_distance_threshold: DEFAULT_HAZARD_DISTANCE_THRESHOLD,
            risk_hazard_kinds: DEFAULT_RISK_HAZARD_KINDS.iter().copied().collect(),
            history_window: DEFAULT_HISTORY_WINDOW,
            parallel_detectors: false,
            detector_failure: DetectorFailurePolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence_threshold must be within 0..=1 (got {})",
                self.confidence_threshold
            ));
        }
        for (name, value) in [
            ("equip_distance_threshold", self.equip_distance_threshold),
            ("hazard_distance_threshold", self.hazard_distance_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!("{} must be a positive number (got {})", name, value));
            }
        }
        if self.history_window == 0 {
            return Err(anyhow!("history_window must be greater than zero"));
        }
        if let Some(kind) = self.risk_hazard_kinds.iter().find(|k| !k.is_hazard_kind()) {
            return Err(anyhow!("{} is not a hazard class", kind.as_str()));
        }
        Ok(())
    }
}

/// Parse a risk hazard kind list. Every entry must name a known hazard class.
pub fn parse_risk_kinds<S: AsRef<str>>(labels: &[S]) -> Result<BTreeSet<ObjectClass>> {
    let mut kinds = BTreeSet::new();
    for label in labels {
        let label = label.as_ref();
        let class = ObjectClass::from_label(label);
        if !class.is_hazard_kind() {
            return Err(anyhow!("unknown hazard kind '{}'", label));
        }
        kinds.insert(class);
    }
    Ok(kinds)
}

// -------------------- safetyd configuration --------------------

#[derive(Debug, Deserialize, Default)]
struct SafetydConfigFile {
    source: Option<String>,
    db_path: Option<String>,
    stub_seed: Option<u64>,
    camera: Option<CameraConfigFile>,
    engine: Option<EngineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    id: Option<String>,
    zone: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EngineConfigFile {
    confidence_threshold: Option<f32>,
    equip_distance_threshold: Option<f64>,
    hazard_distance_threshold: Option<f64>,
    risk_hazard_kinds: Option<Vec<String>>,
    history_window: Option<usize>,
    parallel_detectors: Option<bool>,
    detector_failure: Option<DetectorFailurePolicy>,
}

#[derive(Debug, Clone)]
pub struct SafetydConfig {
    /// Frame source identifier (`stub://...` or a `.jsonl` replay file).
    pub source: String,
    pub db_path: String,
    pub stub_seed: u64,
    pub camera: CameraSettings,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub id: String,
    pub zone: String,
}

impl SafetydConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SAFETY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SafetydConfigFile) -> Result<Self> {
        let defaults = EngineConfig::default();
        let engine_file = file.engine.unwrap_or_default();
        let risk_hazard_kinds = match engine_file.risk_hazard_kinds {
            Some(labels) => parse_risk_kinds(&labels)?,
            None => defaults.risk_hazard_kinds,
        };
        let engine = EngineConfig {
            confidence_threshold: engine_file
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            equip_distance_threshold: engine_file
                .equip_distance_threshold
                .unwrap_or(defaults.equip_distance_threshold),
            hazard_distance_threshold: engine_file
                .hazard_distance_threshold
                .unwrap_or(defaults.hazard_distance_threshold),
            risk_hazard_kinds,
            history_window: engine_file
                .history_window
                .unwrap_or(defaults.history_window),
            parallel_detectors: engine_file
                .parallel_detectors
                .unwrap_or(defaults.parallel_detectors),
            detector_failure: engine_file
                .detector_failure
                .unwrap_or(defaults.detector_failure),
        };
        let camera = CameraSettings {
            id: file
                .camera
                .as_ref()
                .and_then(|camera| camera.id.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_ID.to_string()),
            zone: file
                .camera
                .and_then(|camera| camera.zone)
                .unwrap_or_else(|| DEFAULT_ZONE.to_string()),
        };
        Ok(Self {
            source: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            stub_seed: file.stub_seed.unwrap_or(DEFAULT_STUB_SEED),
            camera,
            engine,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("SAFETY_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source;
            }
        }
        if let Ok(db_path) = std::env::var("SAFETY_DB_PATH") {
            if !db_path.trim().is_empty() {
                self.db_path = db_path;
            }
        }
        if let Ok(camera_id) = std::env::var("SAFETY_CAMERA_ID") {
            if !camera_id.trim().is_empty() {
                self.camera.id = camera_id;
            }
        }
        if let Ok(zone) = std::env::var("SAFETY_ZONE") {
            if !zone.trim().is_empty() {
                self.camera.zone = zone;
            }
        }
        if let Ok(threshold) = std::env::var("SAFETY_CONFIDENCE_THRESHOLD") {
            self.engine.confidence_threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("SAFETY_CONFIDENCE_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Ok(window) = std::env::var("SAFETY_HISTORY_WINDOW") {
            self.engine.history_window = window
                .trim()
                .parse()
                .map_err(|_| anyhow!("SAFETY_HISTORY_WINDOW must be a positive integer"))?;
        }
        if let Ok(kinds) = std::env::var("SAFETY_RISK_HAZARD_KINDS") {
            let parsed = split_csv(&kinds);
            if !parsed.is_empty() {
                self.engine.risk_hazard_kinds = parse_risk_kinds(&parsed)?;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.engine.validate()?;
        if self.source.trim().is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        self.camera.zone = self.camera.zone.trim().to_lowercase();
        if self.camera.zone.is_empty() {
            return Err(anyhow!("camera zone must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SafetydConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
