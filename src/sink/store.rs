use anyhow::Result;

use super::{AnnotatedFrame, Sink};
use crate::alerts::Alert;
use crate::metrics::{MetricsHistory, MetricsSample};
use crate::storage::MetricsLogStore;

/// Sink that appends every KPI sample and alert to a `MetricsLogStore`.
pub struct StoreSink<S: MetricsLogStore> {
    store: S,
}

impl<S: MetricsLogStore> StoreSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: MetricsLogStore> Sink for StoreSink<S> {
    fn render(&mut self, _frame: &AnnotatedFrame<'_>) -> Result<()> {
        Ok(())
    }

    fn report_kpis(&mut self, sample: &MetricsSample) -> Result<()> {
        self.store.append_sample(sample)
    }

    fn report_trend(&mut self, _history: &MetricsHistory) -> Result<()> {
        Ok(())
    }

    fn report_alerts(&mut self, alerts: &[Alert]) -> Result<()> {
        self.store.append_alerts(alerts)
    }
}
