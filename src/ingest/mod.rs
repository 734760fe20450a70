//! Frame sources.
//!
//! - `stub://` synthetic frames (demos, soak runs, tests)
//! - `.jsonl` replay of recorded detector output
//!
//! Video decoding is not done here. A deployment that decodes camera streams
//! implements `FrameSource` for its decoder and hands it to the orchestrator.
//!
//! `FrameSource::read` distinguishes end-of-stream (`Ok(None)`) from a failed
//! read (`Err`). The orchestrator stops on either; the split only shows up in
//! the stop reason it reports.

pub mod replay;
pub mod synthetic;

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::frame::RawFrame;

pub use replay::{RecordedDetectors, ReplayFile, ReplayFrame, ReplaySource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Prefix of every source-open error message.
pub const SOURCE_UNAVAILABLE: &str = "source unavailable";

/// Largest frame width or height any source will produce.
pub const MAX_DIMENSION: u32 = 8192;

/// Sequential frame supplier.
pub trait FrameSource: Send {
    /// Identifier the source was opened with.
    fn identifier(&self) -> String;

    /// Acquire the underlying stream.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, `Ok(None)` at end of stream.
    fn read(&mut self) -> Result<Option<RawFrame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub identifier: String,
}

/// A connected source, plus recorded detectors when the source carries them.
pub struct OpenedSource {
    pub source: Box<dyn FrameSource>,
    pub recorded: Option<RecordedDetectors>,
}

/// Open and connect a source by identifier.
///
/// Any failure is reported as `source unavailable: ...`.
pub fn open_source(identifier: &str) -> Result<OpenedSource> {
    open_source_inner(identifier)
        .map_err(|e| anyhow!("{}: {}: {:#}", SOURCE_UNAVAILABLE, identifier, e))
}

fn open_source_inner(identifier: &str) -> Result<OpenedSource> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty source identifier"));
    }

    if trimmed.starts_with("stub://") {
        let mut source = SyntheticSource::new(SyntheticConfig::parse(trimmed)?);
        source.connect()?;
        return Ok(OpenedSource {
            source: Box::new(source),
            recorded: None,
        });
    }

    if trimmed.contains("://") {
        return Err(anyhow!(
            "unsupported scheme; only stub:// and local .jsonl replay files are built in"
        ));
    }

    let path = Path::new(trimmed);
    if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
        return Err(anyhow!("not a .jsonl replay file"));
    }
    let (mut source, recorded) = ReplayFile::load(path)?.into_parts();
    source.connect()?;
    Ok(OpenedSource {
        source: Box::new(source),
        recorded: Some(recorded),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_source_reports_unavailable_sources() {
        for identifier in ["", "rtsp://camera-1/stream", "/tmp/site.mp4", "/nonexistent/x.jsonl"] {
            let err = open_source(identifier).err().expect("open should fail");
            assert!(
                err.to_string().starts_with(SOURCE_UNAVAILABLE),
                "unexpected error: {}",
                err
            );
        }
    }

    #[test]
    fn open_source_connects_synthetic_streams() {
        let mut opened = open_source("stub://gate?frames=1&width=4&height=4").unwrap();
        assert!(opened.recorded.is_none());
        assert_eq!(opened.source.identifier(), "stub://gate");
        assert!(opened.source.read().unwrap().is_some());
        assert!(opened.source.read().unwrap().is_none());
    }
}
