//! Rendering / reporting sinks.
//!
//! Sinks are fire-and-forget from the engine's point of view: the orchestrator
//! logs a sink error and carries on with the next frame.

mod log_sink;
mod memory;
#[cfg(feature = "render-jpeg")]
mod snapshot;
mod store;

use anyhow::Result;

use crate::alerts::Alert;
use crate::annotate::Annotation;
use crate::frame::RawFrame;
use crate::metrics::{MetricsHistory, MetricsSample};

pub use log_sink::{LogSink, TREND_MIN_SAMPLES};
pub use memory::{MemoryRecord, MemorySink, MemorySinkHandle};
#[cfg(feature = "render-jpeg")]
pub use snapshot::JpegSnapshotSink;
pub use store::StoreSink;

/// A frame plus what should be drawn on it.
pub struct AnnotatedFrame<'a> {
    pub frame: &'a RawFrame,
    pub annotations: &'a [Annotation],
}

pub trait Sink {
    fn render(&mut self, frame: &AnnotatedFrame<'_>) -> Result<()>;

    fn report_kpis(&mut self, sample: &MetricsSample) -> Result<()>;

    fn report_trend(&mut self, history: &MetricsHistory) -> Result<()>;

    fn report_alerts(&mut self, _alerts: &[Alert]) -> Result<()> {
        Ok(())
    }
}

/// Forwards every call to each inner sink. One failing sink does not starve
/// the others; the first error is returned after all have run.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn Sink) -> Result<()>) -> Result<()> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(e) = f(sink.as_mut()) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Sink for FanoutSink {
    fn render(&mut self, frame: &AnnotatedFrame<'_>) -> Result<()> {
        self.each(|sink| sink.render(frame))
    }

    fn report_kpis(&mut self, sample: &MetricsSample) -> Result<()> {
        self.each(|sink| sink.report_kpis(sample))
    }

    fn report_trend(&mut self, history: &MetricsHistory) -> Result<()> {
        self.each(|sink| sink.report_trend(history))
    }

    fn report_alerts(&mut self, alerts: &[Alert]) -> Result<()> {
        self.each(|sink| sink.report_alerts(alerts))
    }
}
