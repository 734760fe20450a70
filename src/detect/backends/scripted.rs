use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::{DetectorBackend, DetectorRole};
use crate::detect::result::{DetectionResult, RawDetection};
use crate::frame::InferenceView;

/// Backend that plays back a fixed list of per-call outputs.
///
/// Each `detect` call consumes the next entry; once the script is exhausted the
/// backend reports empty frames. Rows under the confidence floor are filtered the
/// way a real detector would.
pub struct ScriptedBackend {
    script: VecDeque<Vec<RawDetection>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports(&self, _role: DetectorRole) -> bool {
        true
    }

    fn detect(
        &mut self,
        _view: &InferenceView<'_>,
        min_confidence: f32,
    ) -> Result<DetectionResult> {
        let rows = self.script.pop_front().unwrap_or_default();
        Ok(DetectionResult::new(
            rows.into_iter()
                .filter(|row| row.confidence >= min_confidence)
                .collect(),
        ))
    }
}
