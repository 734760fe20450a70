//! Per-frame KPI samples and the bounded trend history.
//!
//! `MetricsHistory` is the only engine state that outlives a frame. It is a
//! plain tail window: once full, each push evicts the oldest sample. No decay,
//! no averaging.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::entity::FrameEntities;
use crate::risk::RiskEvent;

/// Counters for one processed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub frame_index: u64,
    pub person_count: u32,
    pub no_helmet_count: u32,
    pub no_mask_count: u32,
    pub hazard_count: u32,
    pub risk_count: u32,
}

impl MetricsSample {
    /// Compute counters after association and risk evaluation have run.
    pub fn from_frame(frame_index: u64, entities: &FrameEntities, risks: &[RiskEvent]) -> Self {
        let persons = entities.persons.values();
        Self {
            frame_index,
            person_count: count(entities.persons.len()),
            no_helmet_count: count(persons.clone().filter(|p| !p.has_helmet).count()),
            no_mask_count: count(persons.filter(|p| !p.has_mask).count()),
            hazard_count: count(entities.hazards.len()),
            risk_count: count(risks.len()),
        }
    }

    /// Share of people wearing a helmet, or `None` with nobody in frame.
    pub fn helmet_compliance(&self) -> Option<f64> {
        compliance(self.person_count, self.no_helmet_count)
    }

    pub fn mask_compliance(&self) -> Option<f64> {
        compliance(self.person_count, self.no_mask_count)
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn compliance(total: u32, missing: u32) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(f64::from(total - missing.min(total)) / f64::from(total))
}

/// Rolling window of the most recent samples, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricsHistory {
    samples: VecDeque<MetricsSample>,
    window: usize,
}

impl MetricsHistory {
    /// `window` is clamped to at least one sample.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Append a sample, evicting from the front once the window is exceeded.
    pub fn push(&mut self, sample: MetricsSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&MetricsSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricsSample> + '_ {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<MetricsSample> {
        self.samples.iter().copied().collect()
    }

    /// Highest risk count currently in the window.
    pub fn peak_risk(&self) -> u32 {
        self.samples.iter().map(|s| s.risk_count).max().unwrap_or(0)
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_WINDOW)
    }
}
