use anyhow::Result;

use safety_witness::ingest::{SyntheticConfig, SyntheticSource};
use safety_witness::sink::MemorySink;
use safety_witness::{
    evaluate_frame, AlertOrigin, DetectionResult, DetectorRegistry, DetectorRole, EngineConfig,
    FrameDetections, FrameSource, MetricsSample, Orchestrator, RawDetection, ScriptedBackend,
    StopReason, StubBackend,
};

fn person(id: u32, bbox: [f32; 4]) -> RawDetection {
    RawDetection::new("person", bbox, 0.9).with_track_id(id)
}

fn item(label: &str, bbox: [f32; 4]) -> RawDetection {
    RawDetection::new(label, bbox, 0.9)
}

fn frame(ppe: Vec<RawDetection>, hazard: Vec<RawDetection>) -> FrameDetections {
    FrameDetections {
        ppe: DetectionResult::new(ppe),
        hazard: DetectionResult::new(hazard),
    }
}

fn synthetic(identifier: &str) -> Result<Box<dyn FrameSource>> {
    let mut source = SyntheticSource::new(SyntheticConfig::parse(identifier)?);
    source.connect()?;
    Ok(Box::new(source))
}

fn check_counter_consistency(sample: &MetricsSample, helmeted: u32, masked: u32) {
    assert_eq!(sample.no_helmet_count + helmeted, sample.person_count);
    assert_eq!(sample.no_mask_count + masked, sample.person_count);
}

#[test]
fn helmet_in_range_and_distant_fire() {
    let config = EngineConfig::default();
    let analysis = evaluate_frame(
        &config,
        1,
        &frame(
            vec![
                person(1, [0.0, 0.0, 100.0, 100.0]),
                item("helmet", [10.0, 10.0, 90.0, 90.0]),
            ],
            vec![item("fire", [5000.0, 5000.0, 5010.0, 5010.0])],
        ),
    );
    assert!(analysis.entities.persons[&1].has_helmet);
    assert!(analysis.risks.is_empty());
    assert_eq!(analysis.sample.risk_count, 0);
    assert_eq!(analysis.sample.hazard_count, 1);
}

#[test]
fn unmasked_person_near_smoke_is_one_risk() {
    let analysis = evaluate_frame(
        &EngineConfig::default(),
        1,
        &frame(
            vec![person(2, [0.0, 0.0, 50.0, 50.0])],
            vec![item("smoke", [30.0, 30.0, 80.0, 80.0])],
        ),
    );
    assert_eq!(analysis.risks.len(), 1);
    assert_eq!(analysis.sample.risk_count, 1);
    assert_eq!(analysis.risks[0].track_id, 2);
}

#[test]
fn risk_count_is_per_hazard_pair_and_masks_clear_it() {
    let config = EngineConfig::default();
    let fires = vec![
        item("fire", [60.0, 0.0, 100.0, 40.0]),
        item("fire", [0.0, 60.0, 40.0, 100.0]),
    ];

    let unmasked = evaluate_frame(
        &config,
        1,
        &frame(vec![person(1, [0.0, 0.0, 50.0, 50.0])], fires.clone()),
    );
    assert_eq!(unmasked.sample.risk_count, 2);

    let masked = evaluate_frame(
        &config,
        2,
        &frame(
            vec![
                person(1, [0.0, 0.0, 50.0, 50.0]),
                item("mask", [20.0, 10.0, 30.0, 20.0]),
            ],
            fires,
        ),
    );
    assert_eq!(masked.sample.risk_count, 0);
}

#[test]
fn equipment_at_or_past_threshold_never_sets_flags() {
    let config = EngineConfig::default();
    // Centers exactly 80 apart on the x axis.
    let analysis = evaluate_frame(
        &config,
        1,
        &frame(
            vec![
                person(1, [0.0, 0.0, 20.0, 20.0]),
                item("helmet", [80.0, 0.0, 100.0, 20.0]),
                item("mask", [200.0, 0.0, 220.0, 20.0]),
            ],
            vec![],
        ),
    );
    let p = &analysis.entities.persons[&1];
    assert!(!p.has_helmet);
    assert!(!p.has_mask);
    check_counter_consistency(&analysis.sample, 0, 0);
}

#[test]
fn one_helmet_covers_everyone_in_range() {
    let analysis = evaluate_frame(
        &EngineConfig::default(),
        1,
        &frame(
            vec![
                person(1, [0.0, 0.0, 40.0, 40.0]),
                person(2, [40.0, 0.0, 80.0, 40.0]),
                item("helmet", [20.0, 0.0, 60.0, 40.0]),
            ],
            vec![],
        ),
    );
    assert!(analysis.entities.persons[&1].has_helmet);
    assert!(analysis.entities.persons[&2].has_helmet);
    assert_eq!(analysis.sample.no_helmet_count, 0);
    check_counter_consistency(&analysis.sample, 2, 0);
}

#[test]
fn empty_frame_is_all_zero() {
    let analysis = evaluate_frame(&EngineConfig::default(), 9, &FrameDetections::default());
    assert_eq!(
        analysis.sample,
        MetricsSample {
            frame_index: 9,
            ..MetricsSample::default()
        }
    );
    assert_eq!(analysis.sample.helmet_compliance(), None);
}

#[test]
fn malformed_rows_are_dropped_without_aborting_the_frame() {
    let analysis = evaluate_frame(
        &EngineConfig::default(),
        1,
        &frame(
            vec![
                person(1, [0.0, 0.0, 50.0, 50.0]),
                person(2, [50.0, 50.0, 10.0, 10.0]),
                item("helmet", [f32::NAN, 0.0, 10.0, 10.0]),
            ],
            vec![],
        ),
    );
    assert_eq!(analysis.sample.person_count, 1);
    assert_eq!(analysis.warnings.len(), 2);
}

#[test]
fn window_keeps_exactly_the_last_samples_in_order() -> Result<()> {
    let config = EngineConfig {
        history_window: 5,
        ..EngineConfig::default()
    };
    let detectors = DetectorRegistry::new()
        .with(DetectorRole::Ppe, ScriptedBackend::new(vec![]))?
        .with(DetectorRole::Hazard, ScriptedBackend::new(vec![]))?;
    let mut orch = Orchestrator::new(
        config,
        synthetic("stub://window?frames=8")?,
        detectors,
        AlertOrigin::default(),
    )?;
    let mut sink = MemorySink::new();
    let recorded = sink.handle();
    let summary = orch.run(&mut sink)?;

    assert_eq!(summary.frames_processed, 8);
    assert_eq!(orch.history().len(), 5);
    let kept: Vec<u64> = orch.history().iter().map(|s| s.frame_index).collect();
    assert_eq!(kept, vec![4, 5, 6, 7, 8]);

    let record = recorded.snapshot();
    assert_eq!(record.kpis.len(), 8);
    assert_eq!(record.latest_trend, orch.history().to_vec());
    Ok(())
}

#[test]
fn skipped_source_positions_are_reported_not_corrected() -> Result<()> {
    let detectors = DetectorRegistry::new()
        .with(DetectorRole::Ppe, ScriptedBackend::new(vec![]))?
        .with(DetectorRole::Hazard, ScriptedBackend::new(vec![]))?;
    let mut orch = Orchestrator::new(
        EngineConfig::default(),
        synthetic("stub://gappy?frames=6&skip=3")?,
        detectors,
        AlertOrigin::default(),
    )?;
    orch.run(&mut MemorySink::new())?;
    let indices: Vec<u64> = orch.history().iter().map(|s| s.frame_index).collect();
    assert_eq!(indices, vec![1, 2, 4, 5]);
    Ok(())
}

fn stub_run(parallel: bool) -> Result<(Vec<MetricsSample>, Option<StopReason>)> {
    let config = EngineConfig {
        parallel_detectors: parallel,
        ..EngineConfig::default()
    };
    let detectors = DetectorRegistry::new()
        .with(DetectorRole::Ppe, StubBackend::new(DetectorRole::Ppe, 42))?
        .with(DetectorRole::Hazard, StubBackend::new(DetectorRole::Hazard, 42))?;
    let mut orch = Orchestrator::new(
        config,
        synthetic("stub://determinism?frames=40")?,
        detectors,
        AlertOrigin::default(),
    )?;
    let summary = orch.run(&mut MemorySink::new())?;
    Ok((orch.history().to_vec(), summary.stop_reason))
}

#[test]
fn identical_detector_output_gives_identical_history() -> Result<()> {
    let (first, reason) = stub_run(false)?;
    let (second, _) = stub_run(false)?;
    let (parallel, _) = stub_run(true)?;

    assert_eq!(reason, Some(StopReason::EndOfStream));
    assert_eq!(first.len(), 40);
    assert_eq!(first, second);
    assert_eq!(first, parallel);
    for sample in &first {
        assert!(sample.no_helmet_count <= sample.person_count);
        assert!(sample.no_mask_count <= sample.person_count);
    }
    Ok(())
}
