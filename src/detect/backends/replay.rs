use std::collections::HashMap;

use anyhow::Result;

use crate::detect::backend::{DetectorBackend, DetectorRole};
use crate::detect::result::{DetectionResult, RawDetection};
use crate::frame::InferenceView;

/// Backend that answers from recorded detector output, keyed by frame index.
///
/// Built by `ingest::replay::ReplayFile`; frames with no recording yield nothing.
pub struct ReplayBackend {
    role: DetectorRole,
    frames: HashMap<u64, Vec<RawDetection>>,
}

impl ReplayBackend {
    pub fn new(role: DetectorRole, frames: HashMap<u64, Vec<RawDetection>>) -> Self {
        Self { role, frames }
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn supports(&self, role: DetectorRole) -> bool {
        role == self.role
    }

    fn detect(&mut self, view: &InferenceView<'_>, min_confidence: f32) -> Result<DetectionResult> {
        let rows = self
            .frames
            .get(&view.frame_index())
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.confidence >= min_confidence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(DetectionResult::new(rows))
    }
}
