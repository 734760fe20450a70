use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::{AnnotatedFrame, Sink};
use crate::alerts::Alert;
use crate::annotate::Annotation;
use crate::metrics::{MetricsHistory, MetricsSample};

/// Everything a `MemorySink` has been handed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryRecord {
    /// `(frame_index, annotations)` per rendered frame.
    pub rendered: Vec<(u64, Vec<Annotation>)>,
    pub kpis: Vec<MetricsSample>,
    /// The most recent trend handed over.
    pub latest_trend: Vec<MetricsSample>,
    pub trend_reports: usize,
    pub alerts: Vec<Alert>,
}

/// Sink that records calls in memory. Clone the handle before moving the sink.
#[derive(Default)]
pub struct MemorySink {
    record: Arc<Mutex<MemoryRecord>>,
}

/// Read side of a `MemorySink`.
#[derive(Clone)]
pub struct MemorySinkHandle {
    record: Arc<Mutex<MemoryRecord>>,
}

impl MemorySinkHandle {
    pub fn snapshot(&self) -> MemoryRecord {
        match self.record.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle {
            record: Arc::clone(&self.record),
        }
    }

    fn with_record(&self, f: impl FnOnce(&mut MemoryRecord)) {
        match self.record.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Sink for MemorySink {
    fn render(&mut self, frame: &AnnotatedFrame<'_>) -> Result<()> {
        let entry = (frame.frame.frame_index, frame.annotations.to_vec());
        self.with_record(|record| record.rendered.push(entry));
        Ok(())
    }

    fn report_kpis(&mut self, sample: &MetricsSample) -> Result<()> {
        self.with_record(|record| record.kpis.push(*sample));
        Ok(())
    }

    fn report_trend(&mut self, history: &MetricsHistory) -> Result<()> {
        let trend = history.to_vec();
        self.with_record(|record| {
            record.latest_trend = trend;
            record.trend_reports += 1;
        });
        Ok(())
    }

    fn report_alerts(&mut self, alerts: &[Alert]) -> Result<()> {
        self.with_record(|record| record.alerts.extend_from_slice(alerts));
        Ok(())
    }
}
