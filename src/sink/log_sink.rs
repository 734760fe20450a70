use anyhow::Result;

use super::{AnnotatedFrame, Sink};
use crate::alerts::{Alert, Severity};
use crate::annotate::AnnotationStyle;
use crate::metrics::{MetricsHistory, MetricsSample};

/// Trend output is suppressed until the window holds more than this many samples.
pub const TREND_MIN_SAMPLES: usize = 5;

/// Sink that reports through the `log` facade. Never renders pixels.
pub struct LogSink {
    /// Log a trend line every `trend_every` frames.
    trend_every: u64,
    frames_seen: u64,
}

impl LogSink {
    pub fn new(trend_every: u64) -> Self {
        Self {
            trend_every: trend_every.max(1),
            frames_seen: 0,
        }
    }

    /// Whether a trend line is owed for a window of `history_len` samples.
    fn trend_due(&self, history_len: usize) -> bool {
        history_len > TREND_MIN_SAMPLES && self.frames_seen % self.trend_every == 0
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(25)
    }
}

fn mean(history: &MetricsHistory, field: fn(&MetricsSample) -> u32) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let total: f64 = history.iter().map(|s| f64::from(field(s))).sum();
    total / history.len() as f64
}

impl Sink for LogSink {
    fn render(&mut self, frame: &AnnotatedFrame<'_>) -> Result<()> {
        self.frames_seen += 1;
        let critical = frame
            .annotations
            .iter()
            .filter(|a| a.style == AnnotationStyle::Critical)
            .count();
        if critical > 0 {
            log::warn!(
                "frame {}: {} CRITICAL RISK annotation(s)",
                frame.frame.frame_index,
                critical
            );
        }
        log::trace!(
            "frame {}: {} annotations",
            frame.frame.frame_index,
            frame.annotations.len()
        );
        Ok(())
    }

    fn report_kpis(&mut self, sample: &MetricsSample) -> Result<()> {
        log::debug!(
            "frame {} persons={} no_helmet={} no_mask={} hazards={} risks={}",
            sample.frame_index,
            sample.person_count,
            sample.no_helmet_count,
            sample.no_mask_count,
            sample.hazard_count,
            sample.risk_count
        );
        Ok(())
    }

    fn report_trend(&mut self, history: &MetricsHistory) -> Result<()> {
        if !self.trend_due(history.len()) {
            return Ok(());
        }
        log::info!(
            "trend over {} frames: persons={:.1} no_helmet={:.1} no_mask={:.1} hazards={:.1} risks={:.1} peak_risk={}",
            history.len(),
            mean(history, |s| s.person_count),
            mean(history, |s| s.no_helmet_count),
            mean(history, |s| s.no_mask_count),
            mean(history, |s| s.hazard_count),
            mean(history, |s| s.risk_count),
            history.peak_risk()
        );
        Ok(())
    }

    fn report_alerts(&mut self, alerts: &[Alert]) -> Result<()> {
        for alert in alerts {
            if alert.severity == Severity::High {
                log::warn!(
                    "[{}] {} {:?}: {}",
                    alert.camera_id,
                    alert.zone,
                    alert.kind,
                    alert.description
                );
            } else {
                log::debug!(
                    "[{}] {} {:?}: {}",
                    alert.camera_id,
                    alert.zone,
                    alert.kind,
                    alert.description
                );
            }
        }
        Ok(())
    }
}
