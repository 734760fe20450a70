//! Synthetic `stub://` frame source.
//!
//! Identifier form: `stub://<name>[?frames=N&width=W&height=H&skip=K&fail_at=F]`
//!
//! - `frames`: number of frames before end-of-stream (unbounded when absent)
//! - `skip`: every K-th frame position is dropped, so reported indices have gaps
//! - `fail_at`: the read at position F fails instead of producing a frame

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats, MAX_DIMENSION};
use crate::frame::RawFrame;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub name: String,
    pub frames: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub skip_every: Option<u64>,
    pub fail_at: Option<u64>,
}

impl SyntheticConfig {
    pub fn parse(identifier: &str) -> Result<Self> {
        let rest = identifier
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source must use the stub:// scheme"))?;
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };
        if name.trim().is_empty() {
            return Err(anyhow!("synthetic source needs a name (stub://<name>)"));
        }

        let mut cfg = Self {
            name: name.to_string(),
            frames: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            skip_every: None,
            fail_at: None,
        };
        for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed query parameter '{}'", pair))?;
            let parsed: u64 = value
                .parse()
                .map_err(|_| anyhow!("query parameter '{}' must be an integer", key))?;
            match key {
                "frames" => cfg.frames = Some(parsed),
                "width" => cfg.width = dimension(key, parsed)?,
                "height" => cfg.height = dimension(key, parsed)?,
                "skip" if parsed >= 2 => cfg.skip_every = Some(parsed),
                "skip" => return Err(anyhow!("skip must be at least 2")),
                "fail_at" => cfg.fail_at = Some(parsed),
                other => return Err(anyhow!("unknown query parameter '{}'", other)),
            }
        }
        Ok(cfg)
    }
}

fn dimension(key: &str, value: u64) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if (1..=MAX_DIMENSION).contains(&v) => Ok(v),
        _ => Err(anyhow!("{} must be within 1..={}", key, MAX_DIMENSION)),
    }
}

/// Generates gradient frames at increasing positions.
pub struct SyntheticSource {
    config: SyntheticConfig,
    position: u64,
    frames_emitted: u64,
    connected: bool,
    healthy: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            position: 0,
            frames_emitted: 0,
            connected: false,
            healthy: true,
        }
    }

    fn fill_pixels(&self, frame: &mut RawFrame) {
        let shift = self.position;
        for (i, pixel) in frame.pixels_mut().iter_mut().enumerate() {
            *pixel = ((i as u64 + shift) % 256) as u8;
        }
    }
}

impl FrameSource for SyntheticSource {
    fn identifier(&self) -> String {
        format!("stub://{}", self.config.name)
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to stub://{}", self.config.name);
        self.connected = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<RawFrame>> {
        if !self.connected {
            return Err(anyhow!("synthetic source read before connect"));
        }
        loop {
            if let Some(limit) = self.config.frames {
                if self.position >= limit {
                    return Ok(None);
                }
            }
            self.position += 1;

            if self.config.fail_at == Some(self.position) {
                self.healthy = false;
                return Err(anyhow!(
                    "stub://{}: simulated decode failure at position {}",
                    self.config.name,
                    self.position
                ));
            }
            if let Some(k) = self.config.skip_every {
                if self.position % k == 0 {
                    continue;
                }
            }
            break;
        }

        let mut frame = RawFrame::blank(self.position, self.config.width, self.config.height)?;
        self.fill_pixels(&mut frame);
        self.frames_emitted += 1;
        Ok(Some(frame))
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_emitted,
            identifier: self.identifier(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(identifier: &str) -> SyntheticSource {
        let mut source = SyntheticSource::new(SyntheticConfig::parse(identifier).unwrap());
        source.connect().unwrap();
        source
    }

    #[test]
    fn parses_query_parameters() {
        let cfg = SyntheticConfig::parse("stub://yard?frames=3&width=32&height=16").unwrap();
        assert_eq!(cfg.name, "yard");
        assert_eq!(cfg.frames, Some(3));
        assert_eq!((cfg.width, cfg.height), (32, 16));

        assert!(SyntheticConfig::parse("rtsp://yard").is_err());
        assert!(SyntheticConfig::parse("stub://").is_err());
        assert!(SyntheticConfig::parse("stub://yard?frames=x").is_err());
        assert!(SyntheticConfig::parse("stub://yard?fps=10").is_err());
    }

    #[test]
    fn emits_indices_from_one_until_end_of_stream() {
        let mut source = open("stub://yard?frames=3&width=8&height=8");
        let indices: Vec<u64> = std::iter::from_fn(|| source.read().unwrap())
            .map(|f| f.frame_index)
            .collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(source.read().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 3);
    }

    #[test]
    fn skip_produces_index_gaps() {
        let mut source = open("stub://yard?frames=7&skip=3&width=4&height=4");
        let indices: Vec<u64> = std::iter::from_fn(|| source.read().unwrap())
            .map(|f| f.frame_index)
            .collect();
        assert_eq!(indices, vec![1, 2, 4, 5, 7]);
    }

    #[test]
    fn fail_at_surfaces_a_read_error() {
        let mut source = open("stub://yard?fail_at=2&width=4&height=4");
        assert!(source.read().unwrap().is_some());
        assert!(source.read().is_err());
        assert!(!source.is_healthy());
    }
}
