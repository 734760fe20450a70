use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::detect::result::DetectionResult;
use crate::frame::InferenceView;

/// The two detector slots the engine invokes per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorRole {
    /// People and protective equipment. Persons carry tracker ids.
    Ppe,
    /// Environmental hazards. Never tracked.
    Hazard,
}

impl DetectorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorRole::Ppe => "ppe",
            DetectorRole::Hazard => "hazard",
        }
    }
}

/// Detector backend trait.
///
/// Backends are black boxes to the engine: they may block, and their output is
/// trusted only as far as the normalizer lets it through.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend can fill the given slot.
    fn supports(&self, role: DetectorRole) -> bool;

    /// Run detection on a frame.
    ///
    /// Only rows with `confidence >= min_confidence` may be returned.
    fn detect(&mut self, view: &InferenceView<'_>, min_confidence: f32)
        -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
