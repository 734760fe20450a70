use serde::{Deserialize, Serialize};

/// Output of one detector call for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    /// Rows at or above the requested confidence threshold.
    pub detections: Vec<RawDetection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self { detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// One detector output row, in pixel coordinates as the model reports them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    #[serde(default = "full_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub track_id: Option<u32>,
}

fn full_confidence() -> f32 {
    1.0
}

impl RawDetection {
    pub fn new(label: &str, bbox: [f32; 4], confidence: f32) -> Self {
        Self {
            label: label.to_string(),
            bbox,
            confidence,
            track_id: None,
        }
    }

    pub fn with_track_id(mut self, track_id: u32) -> Self {
        self.track_id = Some(track_id);
        self
    }
}

/// Classes the engine knows how to act on.
///
/// Labels are resolved once, at normalization time. Anything the engine has no
/// rule for lands in `Unknown` and keeps its label for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Person,
    Helmet,
    Mask,
    Fire,
    Smoke,
    Unknown,
}

impl ObjectClass {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "person" => ObjectClass::Person,
            "helmet" | "hardhat" | "hard_hat" | "hard-hat" => ObjectClass::Helmet,
            "mask" | "face_mask" | "face-mask" => ObjectClass::Mask,
            "fire" | "flame" => ObjectClass::Fire,
            "smoke" => ObjectClass::Smoke,
            _ => ObjectClass::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Person => "person",
            ObjectClass::Helmet => "helmet",
            ObjectClass::Mask => "mask",
            ObjectClass::Fire => "fire",
            ObjectClass::Smoke => "smoke",
            ObjectClass::Unknown => "unknown",
        }
    }

    /// Classes that may be configured as risk-triggering hazards.
    pub fn is_hazard_kind(&self) -> bool {
        matches!(self, ObjectClass::Fire | ObjectClass::Smoke)
    }
}
