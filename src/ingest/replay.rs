//! Replay of recorded detector output.
//!
//! A replay file is JSON lines, one object per frame:
//!
//! ```text
//! {"frame_index": 1, "ppe": [{"label": "person", "box": [0,0,100,100], "confidence": 0.9, "track_id": 1}], "hazard": []}
//! ```
//!
//! Loading splits it into a `ReplaySource` (blank frames at the recorded
//! indices) and one `ReplayBackend` per detector role.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::{FrameSource, SourceStats, MAX_DIMENSION};
use crate::detect::{DetectorRole, RawDetection, ReplayBackend};
use crate::frame::RawFrame;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

/// One recorded frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub frame_index: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub ppe: Vec<RawDetection>,
    #[serde(default)]
    pub hazard: Vec<RawDetection>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayFile {
    pub name: String,
    pub frames: Vec<ReplayFrame>,
}

impl ReplayFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open replay file {}", path.display()))?;
        Self::from_reader(&path.display().to_string(), std::io::BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(name: &str, reader: R) -> Result<Self> {
        let mut frames: Vec<ReplayFrame> = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read {}", name))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let frame: ReplayFrame = serde_json::from_str(trimmed)
                .map_err(|e| anyhow!("{}:{}: invalid replay frame: {}", name, line_no + 1, e))?;
            for (key, value) in [("width", frame.width), ("height", frame.height)] {
                if matches!(value, Some(v) if !(1..=MAX_DIMENSION).contains(&v)) {
                    return Err(anyhow!(
                        "{}:{}: {} must be within 1..={}",
                        name,
                        line_no + 1,
                        key,
                        MAX_DIMENSION
                    ));
                }
            }
            if let Some(prev) = frames.last() {
                if frame.frame_index <= prev.frame_index {
                    return Err(anyhow!(
                        "{}:{}: frame_index {} does not increase (previous {})",
                        name,
                        line_no + 1,
                        frame.frame_index,
                        prev.frame_index
                    ));
                }
            }
            frames.push(frame);
        }
        Ok(Self {
            name: name.to_string(),
            frames,
        })
    }

    /// Split into a frame source and the two recorded detectors.
    pub fn into_parts(self) -> (ReplaySource, RecordedDetectors) {
        let mut ppe = HashMap::new();
        let mut hazard = HashMap::new();
        let mut positions = Vec::with_capacity(self.frames.len());
        for frame in self.frames {
            positions.push((
                frame.frame_index,
                frame.width.unwrap_or(DEFAULT_WIDTH),
                frame.height.unwrap_or(DEFAULT_HEIGHT),
            ));
            ppe.insert(frame.frame_index, frame.ppe);
            hazard.insert(frame.frame_index, frame.hazard);
        }
        (
            ReplaySource {
                name: self.name,
                positions,
                cursor: 0,
            },
            RecordedDetectors {
                ppe: ReplayBackend::new(DetectorRole::Ppe, ppe),
                hazard: ReplayBackend::new(DetectorRole::Hazard, hazard),
            },
        )
    }
}

/// Detector backends carrying a replay file's recorded output.
pub struct RecordedDetectors {
    pub ppe: ReplayBackend,
    pub hazard: ReplayBackend,
}

/// Emits one blank frame per recorded line, in file order.
pub struct ReplaySource {
    name: String,
    positions: Vec<(u64, u32, u32)>,
    cursor: usize,
}

impl FrameSource for ReplaySource {
    fn identifier(&self) -> String {
        self.name.clone()
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "ReplaySource: {} recorded frames from {}",
            self.positions.len(),
            self.name
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Option<RawFrame>> {
        let Some(&(frame_index, width, height)) = self.positions.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        RawFrame::blank(frame_index, width, height).map(Some)
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.cursor as u64,
            identifier: self.name.clone(),
        }
    }
}
