use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::{DetectorBackend, DetectorRole};
use crate::detect::result::{DetectionResult, RawDetection};
use crate::frame::InferenceView;

const MAX_PEOPLE: u32 = 4;
const PERSON_W: f32 = 80.0;
const PERSON_H: f32 = 180.0;

/// Stub backend for demos and soak runs. Scatters plausible detections.
///
/// Output depends only on the seed and the frame index, so two runs over the
/// same synthetic source produce identical detections.
pub struct StubBackend {
    role: DetectorRole,
    seed: u64,
}

impl StubBackend {
    pub fn new(role: DetectorRole, seed: u64) -> Self {
        Self { role, seed }
    }

    fn rng_for(&self, frame_index: u64) -> StdRng {
        let role_salt = match self.role {
            DetectorRole::Ppe => 0x5afe_7e00,
            DetectorRole::Hazard => 0x0f1e_5000,
        };
        StdRng::seed_from_u64(self.seed ^ role_salt ^ frame_index.wrapping_mul(0x9e37_79b9))
    }

    fn scatter_people(&self, view: &InferenceView<'_>, rng: &mut StdRng) -> Vec<RawDetection> {
        let width = view.width() as f32;
        let height = view.height() as f32;
        let mut out = Vec::new();

        // Track ids stay stable across frames; position drifts with the frame index.
        for track_id in 1..=MAX_PEOPLE {
            if !rng.gen_bool(0.7) {
                continue;
            }
            let lane = track_id as f32 / (MAX_PEOPLE + 1) as f32;
            let drift = (view.frame_index() as f32 * 3.0 + track_id as f32 * 97.0)
                % (width - PERSON_W).max(1.0);
            let x1 = drift;
            let y1 = (lane * (height - PERSON_H)).max(0.0);
            let person = [x1, y1, x1 + PERSON_W, y1 + PERSON_H];
            out.push(
                RawDetection::new("person", person, rng.gen_range(0.55..0.99))
                    .with_track_id(track_id),
            );

            let head_cx = x1 + PERSON_W / 2.0;
            let head_cy = y1 + PERSON_H / 2.0;
            if rng.gen_bool(0.6) {
                out.push(RawDetection::new(
                    "helmet",
                    [head_cx - 20.0, head_cy - 60.0, head_cx + 20.0, head_cy - 30.0],
                    rng.gen_range(0.3..0.95),
                ));
            }
            if rng.gen_bool(0.5) {
                out.push(RawDetection::new(
                    "mask",
                    [head_cx - 12.0, head_cy - 30.0, head_cx + 12.0, head_cy - 15.0],
                    rng.gen_range(0.3..0.95),
                ));
            }
        }
        out
    }

    fn scatter_hazards(&self, view: &InferenceView<'_>, rng: &mut StdRng) -> Vec<RawDetection> {
        let mut out = Vec::new();
        if rng.gen_bool(0.25) {
            let label = if rng.gen_bool(0.5) { "fire" } else { "smoke" };
            let w = view.width() as f32;
            let h = view.height() as f32;
            let x1 = rng.gen_range(0.0..(w - 60.0).max(1.0));
            let y1 = rng.gen_range(0.0..(h - 60.0).max(1.0));
            out.push(RawDetection::new(
                label,
                [x1, y1, x1 + 60.0, y1 + 60.0],
                rng.gen_range(0.4..0.99),
            ));
        }
        out
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, role: DetectorRole) -> bool {
        role == self.role
    }

    fn detect(&mut self, view: &InferenceView<'_>, min_confidence: f32) -> Result<DetectionResult> {
        let mut rng = self.rng_for(view.frame_index());
        let rows = match self.role {
            DetectorRole::Ppe => self.scatter_people(view, &mut rng),
            DetectorRole::Hazard => self.scatter_hazards(view, &mut rng),
        };
        Ok(DetectionResult::new(
            rows.into_iter()
                .filter(|row| row.confidence >= min_confidence)
                .collect(),
        ))
    }
}
