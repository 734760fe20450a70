//! Frame Orchestrator.
//!
//! Two states, `Running` and `Stopped`. Each step pulls one frame, runs
//! normalize -> entities -> association -> risk -> metrics in that order and
//! hands the result to the sink. The only state that crosses iterations is the
//! rolling `MetricsHistory`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::alerts::{derive_alerts, Alert, AlertOrigin};
use crate::annotate::{annotate, Annotation};
use crate::association::associate;
use crate::config::{DetectorFailurePolicy, EngineConfig};
use crate::detect::{DetectorRegistry, DetectorRole, FrameDetections};
use crate::entity::FrameEntities;
use crate::ingest::FrameSource;
use crate::metrics::{MetricsHistory, MetricsSample};
use crate::normalize::{normalize, NormalizeWarning};
use crate::risk::{evaluate, RiskEvent};
use crate::sink::{AnnotatedFrame, Sink};

/// Log source health every this many pulled frames.
const HEALTH_LOG_EVERY: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    Running,
    Stopped,
}

/// Why the orchestrator left `Running`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The source reported end of stream.
    EndOfStream,
    /// The source failed to produce a frame. Terminal, like end of stream.
    ReadFailed(String),
    /// The stop flag was raised between frames.
    Interrupted,
    /// A detector call failed under `DetectorFailurePolicy::Abort`.
    DetectorFailed(String),
}

/// Everything the engine derived from one frame's detections.
#[derive(Clone, Debug)]
pub struct FrameAnalysis {
    pub frame_index: u64,
    pub entities: FrameEntities,
    /// Number of (person, equipment) pairs that set a flag.
    pub associations: usize,
    pub risks: Vec<RiskEvent>,
    pub sample: MetricsSample,
    pub annotations: Vec<Annotation>,
    pub warnings: Vec<NormalizeWarning>,
}

/// Run the per-frame pipeline on already-joined detector output.
///
/// Pure: the same detections and config always give the same analysis.
pub fn evaluate_frame(
    config: &EngineConfig,
    frame_index: u64,
    detections: &FrameDetections,
) -> FrameAnalysis {
    let ppe = normalize(DetectorRole::Ppe, &detections.ppe);
    let hazard = normalize(DetectorRole::Hazard, &detections.hazard);

    let mut entities = FrameEntities::build(&ppe.detections, &hazard.detections);
    let associations = associate(&mut entities, config.equip_distance_threshold);
    let risks = evaluate(
        &entities,
        config.hazard_distance_threshold,
        &config.risk_hazard_kinds,
    );
    let sample = MetricsSample::from_frame(frame_index, &entities, &risks);
    let annotations = annotate(&entities, &risks);

    let mut warnings = ppe.warnings;
    warnings.extend(hazard.warnings);

    FrameAnalysis {
        frame_index,
        entities,
        associations,
        risks,
        sample,
        annotations,
        warnings,
    }
}

/// Result of a single `Orchestrator::step`.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// A frame went through the pipeline and a sample was appended.
    Processed(MetricsSample),
    /// Detectors failed for this frame under the skip policy.
    Skipped { frame_index: u64 },
    /// The orchestrator is (now) stopped.
    Stopped(StopReason),
}

/// Totals for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub risk_events: u64,
    pub alerts: u64,
    pub normalize_warnings: u64,
    pub sink_errors: u64,
    pub stop_reason: Option<StopReason>,
}

pub struct Orchestrator {
    config: EngineConfig,
    source: Box<dyn FrameSource>,
    detectors: DetectorRegistry,
    origin: AlertOrigin,
    history: MetricsHistory,
    state: OrchestratorState,
    stop_flag: Option<Arc<AtomicBool>>,
    summary: RunSummary,
    pulls: u64,
}

impl Orchestrator {
    /// Build an orchestrator over a connected source. Starts in `Running`.
    pub fn new(
        config: EngineConfig,
        source: Box<dyn FrameSource>,
        detectors: DetectorRegistry,
        origin: AlertOrigin,
    ) -> Result<Self> {
        config.validate()?;
        detectors.ensure_complete()?;
        let history = MetricsHistory::new(config.history_window);
        Ok(Self {
            config,
            source,
            detectors,
            origin,
            history,
            state: OrchestratorState::Running,
            stop_flag: None,
            summary: RunSummary::default(),
            pulls: 0,
        })
    }

    /// Checked before every frame pull.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn stop(&mut self, reason: StopReason) -> StepOutcome {
        log::info!(
            "orchestrator stopped ({:?}) after {} frames from {}",
            reason,
            self.summary.frames_processed,
            self.source.identifier()
        );
        self.state = OrchestratorState::Stopped;
        self.summary.stop_reason = Some(reason.clone());
        StepOutcome::Stopped(reason)
    }

    /// Process at most one frame.
    ///
    /// Returns `Err` only when a detector fails under the abort policy. Sink
    /// failures are logged and counted, never propagated.
    pub fn step(&mut self, sink: &mut dyn Sink) -> Result<StepOutcome> {
        if self.state == OrchestratorState::Stopped {
            let reason = self
                .summary
                .stop_reason
                .clone()
                .unwrap_or(StopReason::EndOfStream);
            return Ok(StepOutcome::Stopped(reason));
        }

        if let Some(flag) = &self.stop_flag {
            if flag.load(Ordering::SeqCst) {
                return Ok(self.stop(StopReason::Interrupted));
            }
        }

        let frame = match self.source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(self.stop(StopReason::EndOfStream)),
            Err(e) => {
                log::warn!("frame read failed: {:#}", e);
                return Ok(self.stop(StopReason::ReadFailed(format!("{:#}", e))));
            }
        };
        self.pulls += 1;
        if self.pulls % HEALTH_LOG_EVERY == 0 {
            let stats = self.source.stats();
            log::info!(
                "source health={} frames={} id={}",
                self.source.is_healthy(),
                stats.frames_captured,
                stats.identifier
            );
        }

        let view = frame.inference_view();
        let detections = match self.detectors.detect_frame(
            &view,
            self.config.confidence_threshold,
            self.config.parallel_detectors,
        ) {
            Ok(detections) => detections,
            Err(e) => match self.config.detector_failure {
                DetectorFailurePolicy::Skip => {
                    log::warn!("frame {}: detector failed, skipping: {:#}", frame.frame_index, e);
                    self.summary.frames_skipped += 1;
                    return Ok(StepOutcome::Skipped {
                        frame_index: frame.frame_index,
                    });
                }
                DetectorFailurePolicy::Abort => {
                    let message = format!("{:#}", e);
                    self.stop(StopReason::DetectorFailed(message.clone()));
                    return Err(anyhow!(
                        "frame {}: detector failed: {}",
                        frame.frame_index,
                        message
                    ));
                }
            },
        };

        let analysis = evaluate_frame(&self.config, frame.frame_index, &detections);
        for risk in &analysis.risks {
            log::warn!(
                "frame {}: CRITICAL RISK track {} is {:.0}px from {} without a mask",
                analysis.frame_index,
                risk.track_id,
                risk.distance,
                risk.hazard_kind.as_str()
            );
        }
        let alerts: Vec<Alert> = derive_alerts(
            &self.origin,
            analysis.frame_index,
            &analysis.entities,
            &analysis.risks,
            &self.config.risk_hazard_kinds,
        );

        self.history.push(analysis.sample);
        self.summary.frames_processed += 1;
        self.summary.risk_events += analysis.risks.len() as u64;
        self.summary.alerts += alerts.len() as u64;
        self.summary.normalize_warnings += analysis.warnings.len() as u64;

        let annotated = AnnotatedFrame {
            frame: &frame,
            annotations: &analysis.annotations,
        };
        let results = [
            ("render", sink.render(&annotated)),
            ("report_kpis", sink.report_kpis(&analysis.sample)),
            ("report_trend", sink.report_trend(&self.history)),
            ("report_alerts", sink.report_alerts(&alerts)),
        ];
        for (call, result) in results {
            if let Err(e) = result {
                log::warn!("frame {}: sink {} failed: {:#}", analysis.frame_index, call, e);
                self.summary.sink_errors += 1;
            }
        }

        Ok(StepOutcome::Processed(analysis.sample))
    }

    /// Step until `Stopped`.
    pub fn run(&mut self, sink: &mut dyn Sink) -> Result<RunSummary> {
        log::info!(
            "orchestrator running: source={} detectors={:?} window={}",
            self.source.identifier(),
            self.detectors.describe(),
            self.history.window()
        );
        while self.state == OrchestratorState::Running {
            self.step(sink)?;
        }
        Ok(self.summary.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectionResult, DetectorBackend, RawDetection, ScriptedBackend};
    use crate::frame::InferenceView;
    use crate::ingest::{SyntheticConfig, SyntheticSource};
    use crate::sink::MemorySink;

    fn source(identifier: &str) -> Box<dyn FrameSource> {
        let mut source = SyntheticSource::new(SyntheticConfig::parse(identifier).unwrap());
        source.connect().unwrap();
        Box::new(source)
    }

    fn scripted(ppe: Vec<Vec<RawDetection>>, hazard: Vec<Vec<RawDetection>>) -> DetectorRegistry {
        DetectorRegistry::new()
            .with(DetectorRole::Ppe, ScriptedBackend::new(ppe))
            .unwrap()
            .with(DetectorRole::Hazard, ScriptedBackend::new(hazard))
            .unwrap()
    }

    fn person(id: u32, bbox: [f32; 4]) -> RawDetection {
        RawDetection::new("person", bbox, 0.9).with_track_id(id)
    }

    struct Broken;

    impl DetectorBackend for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn supports(&self, _role: DetectorRole) -> bool {
            true
        }

        fn detect(&mut self, _view: &InferenceView<'_>, _min: f32) -> Result<DetectionResult> {
            Err(anyhow!("model crashed"))
        }
    }

    #[test]
    fn evaluate_frame_runs_the_whole_pipeline() {
        let detections = FrameDetections {
            ppe: DetectionResult::new(vec![person(2, [0.0, 0.0, 50.0, 50.0])]),
            hazard: DetectionResult::new(vec![RawDetection::new(
                "smoke",
                [30.0, 30.0, 80.0, 80.0],
                0.8,
            )]),
        };
        let analysis = evaluate_frame(&EngineConfig::default(), 4, &detections);
        assert_eq!(analysis.risks.len(), 1);
        assert_eq!(analysis.sample.risk_count, 1);
        assert_eq!(analysis.sample.frame_index, 4);
        assert_eq!(analysis.sample.person_count, 1);
        assert_eq!(analysis.annotations.len(), 3);
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn zero_entity_frames_report_zero_counts() {
        let analysis = evaluate_frame(&EngineConfig::default(), 1, &FrameDetections::default());
        assert_eq!(analysis.sample, MetricsSample::from_frame(1, &FrameEntities::default(), &[]));
        assert_eq!(analysis.sample.person_count, 0);
        assert_eq!(analysis.sample.risk_count, 0);
        assert!(analysis.annotations.is_empty());
    }

    #[test]
    fn end_of_stream_stops_and_stays_stopped() -> Result<()> {
        let mut orch = Orchestrator::new(
            EngineConfig::default(),
            source("stub://t?frames=3"),
            scripted(vec![], vec![]),
            AlertOrigin::default(),
        )?;
        let mut sink = MemorySink::new();
        let recorded = sink.handle();

        let summary = orch.run(&mut sink)?;
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.stop_reason, Some(StopReason::EndOfStream));
        assert_eq!(orch.state(), OrchestratorState::Stopped);
        assert_eq!(
            orch.step(&mut sink)?,
            StepOutcome::Stopped(StopReason::EndOfStream)
        );

        let record = recorded.snapshot();
        assert_eq!(record.kpis.len(), 3);
        assert_eq!(record.rendered.len(), 3);
        assert_eq!(record.trend_reports, 3);
        Ok(())
    }

    #[test]
    fn read_failure_is_terminal_without_retry() -> Result<()> {
        let mut orch = Orchestrator::new(
            EngineConfig::default(),
            source("stub://t?frames=10&fail_at=3"),
            scripted(vec![], vec![]),
            AlertOrigin::default(),
        )?;
        let summary = orch.run(&mut MemorySink::new())?;
        assert_eq!(summary.frames_processed, 2);
        assert!(matches!(summary.stop_reason, Some(StopReason::ReadFailed(_))));
        Ok(())
    }

    #[test]
    fn stop_flag_interrupts_before_the_next_pull() -> Result<()> {
        let flag = Arc::new(AtomicBool::new(false));
        let mut orch = Orchestrator::new(
            EngineConfig::default(),
            source("stub://t"),
            scripted(vec![], vec![]),
            AlertOrigin::default(),
        )?
        .with_stop_flag(Arc::clone(&flag));
        let mut sink = MemorySink::new();

        assert!(matches!(orch.step(&mut sink)?, StepOutcome::Processed(_)));
        flag.store(true, Ordering::SeqCst);
        assert_eq!(
            orch.step(&mut sink)?,
            StepOutcome::Stopped(StopReason::Interrupted)
        );
        assert_eq!(orch.summary().frames_processed, 1);
        Ok(())
    }

    #[test]
    fn detector_failure_skips_frame_by_default() -> Result<()> {
        let detectors = DetectorRegistry::new()
            .with(DetectorRole::Ppe, Broken)?
            .with(DetectorRole::Hazard, ScriptedBackend::new(vec![]))?;
        let mut orch = Orchestrator::new(
            EngineConfig::default(),
            source("stub://t?frames=2"),
            detectors,
            AlertOrigin::default(),
        )?;
        let summary = orch.run(&mut MemorySink::new())?;
        assert_eq!(summary.frames_skipped, 2);
        assert_eq!(summary.frames_processed, 0);
        assert!(orch.history().is_empty());
        Ok(())
    }

    #[test]
    fn detector_failure_aborts_when_configured() -> Result<()> {
        let detectors = DetectorRegistry::new()
            .with(DetectorRole::Ppe, ScriptedBackend::new(vec![]))?
            .with(DetectorRole::Hazard, Broken)?;
        let config = EngineConfig {
            detector_failure: DetectorFailurePolicy::Abort,
            ..EngineConfig::default()
        };
        let mut orch = Orchestrator::new(
            config,
            source("stub://t?frames=5"),
            detectors,
            AlertOrigin::default(),
        )?;
        assert!(orch.run(&mut MemorySink::new()).is_err());
        assert_eq!(orch.state(), OrchestratorState::Stopped);
        assert!(matches!(
            orch.summary().stop_reason,
            Some(StopReason::DetectorFailed(_))
        ));
        Ok(())
    }

    #[test]
    fn history_is_bounded_by_the_window() -> Result<()> {
        let config = EngineConfig {
            history_window: 4,
            ..EngineConfig::default()
        };
        let mut orch = Orchestrator::new(
            config,
            source("stub://t?frames=9"),
            scripted(vec![], vec![]),
            AlertOrigin::default(),
        )?;
        orch.run(&mut MemorySink::new())?;
        let indices: Vec<u64> = orch.history().iter().map(|s| s.frame_index).collect();
        assert_eq!(indices, vec![6, 7, 8, 9]);
        Ok(())
    }

    #[test]
    fn construction_requires_both_detectors() {
        let detectors = DetectorRegistry::new()
            .with(DetectorRole::Ppe, ScriptedBackend::new(vec![]))
            .unwrap();
        assert!(Orchestrator::new(
            EngineConfig::default(),
            source("stub://t?frames=1"),
            detectors,
            AlertOrigin::default(),
        )
        .is_err());
    }
}
