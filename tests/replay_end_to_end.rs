use anyhow::Result;

use safety_witness::sink::MemorySink;
use safety_witness::{
    open_source, AlertKind, AlertOrigin, DetectorRegistry, DetectorRole, EngineConfig, FanoutSink,
    MetricsLogStore, Orchestrator, Severity, SqliteMetricsLogStore, StopReason, StoreSink,
};

const REPLAY: &str = r#"{"frame_index": 3, "ppe": [{"label": "person", "box": [0, 0, 100, 100], "confidence": 0.9, "track_id": 1}, {"label": "helmet", "box": [10, 10, 90, 90], "confidence": 0.8}], "hazard": [{"label": "fire", "box": [5000, 5000, 5010, 5010], "confidence": 0.7}]}
{"frame_index": 4, "ppe": [{"label": "person", "box": [0, 0, 50, 50], "confidence": 0.95, "track_id": 2}], "hazard": [{"label": "smoke", "box": [30, 30, 80, 80], "confidence": 0.6}]}

{"frame_index": 9, "ppe": [{"label": "person", "box": [0, 0, 50, 50], "confidence": 0.3, "track_id": 5}, {"label": "person", "box": [60, 60, 10, 10], "confidence": 0.9, "track_id": 6}]}
"#;

fn open_replay(dir: &tempfile::TempDir) -> Result<(Orchestrator, String)> {
    let replay_path = dir.path().join("shift.jsonl");
    std::fs::write(&replay_path, REPLAY)?;

    let opened = open_source(&replay_path.display().to_string())?;
    let recorded = opened.recorded.expect("replay carries detectors");
    let detectors = DetectorRegistry::new()
        .with(DetectorRole::Ppe, recorded.ppe)?
        .with(DetectorRole::Hazard, recorded.hazard)?;
    let origin = AlertOrigin {
        camera_id: "CAM-3".to_string(),
        zone: "zone:loading_bay".to_string(),
    };
    let orch = Orchestrator::new(EngineConfig::default(), opened.source, detectors, origin)?;
    let db_path = dir.path().join("metrics.db").display().to_string();
    Ok((orch, db_path))
}

#[test]
fn replay_is_scored_and_persisted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (mut orch, db_path) = open_replay(&dir)?;

    let memory = MemorySink::new();
    let recorded = memory.handle();
    let mut sink = FanoutSink::new()
        .with(memory)
        .with(StoreSink::new(SqliteMetricsLogStore::open(&db_path)?));

    let summary = orch.run(&mut sink)?;
    assert_eq!(summary.stop_reason, Some(StopReason::EndOfStream));
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.risk_events, 1);
    // Frame 9: one row under the confidence floor, one inverted box.
    assert_eq!(summary.normalize_warnings, 1);
    drop(sink);

    let store = SqliteMetricsLogStore::open(&db_path)?;
    let samples = store.samples(100)?;
    let indices: Vec<u64> = samples.iter().map(|s| s.frame_index).collect();
    assert_eq!(indices, vec![3, 4, 9]);

    assert_eq!(samples[0].person_count, 1);
    assert_eq!(samples[0].no_helmet_count, 0);
    assert_eq!(samples[0].hazard_count, 1);
    assert_eq!(samples[0].risk_count, 0);

    assert_eq!(samples[1].risk_count, 1);
    assert_eq!(samples[2].person_count, 0);

    let alerts = store.alerts(100)?;
    assert!(alerts.iter().all(|a| a.camera_id == "CAM-3"));
    assert!(alerts.iter().all(|a| a.zone == "zone:loading_bay"));
    let critical: Vec<_> = alerts
        .iter()
        .filter(|a| a.kind == AlertKind::CriticalRisk)
        .collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].frame_index, 4);
    assert_eq!(critical[0].track_id, Some(2));
    assert_eq!(critical[0].severity, Severity::High);
    assert_eq!(alerts, recorded.snapshot().alerts);
    Ok(())
}

#[test]
fn replaying_twice_gives_the_same_history() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (mut first, _) = open_replay(&dir)?;
    let (mut second, _) = open_replay(&dir)?;
    first.run(&mut MemorySink::new())?;
    second.run(&mut MemorySink::new())?;
    assert_eq!(first.history(), second.history());
    Ok(())
}

#[test]
fn unsupported_sources_are_unavailable() {
    for identifier in ["rtsp://camera-1/stream", "", "/no/such/file.jsonl"] {
        let err = match open_source(identifier) {
            Ok(_) => panic!("{} should not open", identifier),
            Err(e) => e,
        };
        assert!(
            err.to_string().starts_with("source unavailable"),
            "unexpected error: {}",
            err
        );
    }
}
