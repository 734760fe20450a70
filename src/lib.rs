//! Safety Witness
//!
//! Per-frame PPE compliance and hazard proximity engine.
//!
//! # Pipeline
//!
//! Every frame goes through the same stages, in order, before the next frame
//! is pulled:
//!
//! 1. **Detect**: two detector backends (PPE and hazard) see an `InferenceView`.
//! 2. **Normalize**: raw rows become typed `Detection`s; malformed rows are
//!    dropped with a warning.
//! 3. **Entities**: persons keyed by track id, equipment, hazards. Rebuilt from
//!    scratch every frame.
//! 4. **Associate**: equipment within range sets `has_helmet` / `has_mask`.
//! 5. **Risk**: unmasked persons within range of a risk hazard.
//! 6. **Metrics**: one `MetricsSample` appended to a bounded `MetricsHistory`.
//!
//! The `Orchestrator` drives the loop and hands results to a `Sink`.
//!
//! # Module Structure
//!
//! - `frame`: RawFrame, InferenceView
//! - `ingest`: frame sources (`stub://`, `.jsonl` replay)
//! - `detect`: detector contract, registry, stub/replay backends
//! - `normalize`, `entity`, `association`, `risk`, `metrics`: the engine
//! - `annotate`, `alerts`, `sink`, `storage`: outputs
//! - `orchestrator`, `config`: wiring

pub mod alerts;
pub mod annotate;
pub mod association;
pub mod config;
pub mod detect;
pub mod entity;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod risk;
pub mod sink;
pub mod storage;

pub use alerts::{derive_alerts, Alert, AlertKind, AlertOrigin, Severity};
pub use annotate::{annotate, Annotation, AnnotationStyle};
pub use association::associate;
pub use config::{DetectorFailurePolicy, EngineConfig, SafetydConfig};
pub use detect::{
    DetectionResult, DetectorBackend, DetectorRegistry, DetectorRole, FrameDetections,
    ObjectClass, RawDetection, ReplayBackend, ScriptedBackend, StubBackend,
};
pub use entity::{EquipmentItem, FrameEntities, Hazard, Person};
pub use frame::{InferenceView, RawFrame};
pub use geometry::{center, distance, BBox};
pub use ingest::{open_source, FrameSource, OpenedSource, SourceStats};
pub use metrics::{MetricsHistory, MetricsSample};
pub use normalize::{normalize, Detection, NormalizeWarning};
pub use orchestrator::{
    evaluate_frame, FrameAnalysis, Orchestrator, OrchestratorState, RunSummary, StepOutcome,
    StopReason,
};
pub use risk::{evaluate as evaluate_risk, RiskEvent};
pub use sink::{AnnotatedFrame, FanoutSink, LogSink, MemorySink, Sink, StoreSink};
pub use storage::{InMemoryMetricsLogStore, MetricsLogStore, SqliteMetricsLogStore};
