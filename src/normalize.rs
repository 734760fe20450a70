//! Detection normalizer.
//!
//! Turns raw detector rows into typed `Detection` records:
//! - float boxes are truncated onto the integer pixel grid
//! - labels are resolved to an `ObjectClass` once, here
//! - track ids survive only on persons from the PPE detector
//!
//! Bad rows never fail the frame. They are dropped and reported as
//! `NormalizeWarning`s so the caller can log or count them.

use serde::Serialize;

use crate::detect::{DetectionResult, DetectorRole, ObjectClass, RawDetection};
use crate::geometry::BBox;

/// Largest coordinate magnitude accepted from a detector, in pixels.
pub const MAX_COORDINATE: f32 = 1_000_000.0;

/// One normalized detection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub class: ObjectClass,
    /// Original detector label, kept for display.
    pub label: String,
    pub bbox: BBox,
    pub track_id: Option<u32>,
    pub role: DetectorRole,
}

/// Why a row was dropped.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum NormalizeWarning {
    NonFiniteBox { role: DetectorRole, label: String },
    OutOfRangeBox { role: DetectorRole, label: String },
    InvertedBox { role: DetectorRole, label: String, bbox: BBox },
    MissingTrackId { label: String, bbox: BBox },
}

impl std::fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeWarning::NonFiniteBox { role, label } => {
                write!(f, "{} detector: non-finite box for '{}'", role.as_str(), label)
            }
            NormalizeWarning::OutOfRangeBox { role, label } => write!(
                f,
                "{} detector: box for '{}' lies beyond {} px",
                role.as_str(),
                label,
                MAX_COORDINATE
            ),
            NormalizeWarning::InvertedBox { role, label, bbox } => write!(
                f,
                "{} detector: empty or inverted box for '{}' ({},{},{},{})",
                role.as_str(),
                label,
                bbox.x1,
                bbox.y1,
                bbox.x2,
                bbox.y2
            ),
            NormalizeWarning::MissingTrackId { label, bbox } => write!(
                f,
                "ppe detector: '{}' at ({},{},{},{}) has no track id",
                label, bbox.x1, bbox.y1, bbox.x2, bbox.y2
            ),
        }
    }
}

/// Normalizer output for one detector call.
#[derive(Clone, Debug, Default)]
pub struct Normalized {
    pub detections: Vec<Detection>,
    pub warnings: Vec<NormalizeWarning>,
}

/// Normalize every row of one detector's output.
pub fn normalize(role: DetectorRole, result: &DetectionResult) -> Normalized {
    let mut out = Normalized::default();
    for row in &result.detections {
        match normalize_row(role, row) {
            Ok(detection) => out.detections.push(detection),
            Err(warning) => {
                log::warn!("dropping detection: {}", warning);
                out.warnings.push(warning);
            }
        }
    }
    out
}

fn normalize_row(role: DetectorRole, row: &RawDetection) -> Result<Detection, NormalizeWarning> {
    if row.bbox.iter().any(|v| !v.is_finite()) {
        return Err(NormalizeWarning::NonFiniteBox {
            role,
            label: row.label.clone(),
        });
    }
    if row.bbox.iter().any(|v| v.abs() > MAX_COORDINATE) {
        return Err(NormalizeWarning::OutOfRangeBox {
            role,
            label: row.label.clone(),
        });
    }

    // Truncate toward zero, matching how detector coordinates are usually cast.
    let bbox = BBox::new(
        row.bbox[0] as i32,
        row.bbox[1] as i32,
        row.bbox[2] as i32,
        row.bbox[3] as i32,
    );
    if !bbox.is_well_formed() {
        return Err(NormalizeWarning::InvertedBox {
            role,
            label: row.label.clone(),
            bbox,
        });
    }

    let class = ObjectClass::from_label(&row.label);
    let track_id = match (role, class) {
        (DetectorRole::Ppe, ObjectClass::Person) => match row.track_id {
            Some(id) if id > 0 => Some(id),
            _ => {
                return Err(NormalizeWarning::MissingTrackId {
                    label: row.label.clone(),
                    bbox,
                })
            }
        },
        _ => None,
    };

    Ok(Detection {
        class,
        label: row.label.trim().to_string(),
        bbox,
        track_id,
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(rows: Vec<RawDetection>) -> DetectionResult {
        DetectionResult::new(rows)
    }

    #[test]
    fn drops_malformed_boxes_with_warnings() {
        let normalized = normalize(
            DetectorRole::Hazard,
            &result(vec![
                RawDetection::new("fire", [f32::NAN, 0.0, 10.0, 10.0], 0.9),
                RawDetection::new("fire", [10.0, 0.0, 10.0, 10.0], 0.9),
                RawDetection::new("smoke", [0.0, 20.0, 10.0, 5.0], 0.9),
                RawDetection::new("smoke", [0.0, 0.0, 10.0, 10.0], 0.9),
            ]),
        );

        assert_eq!(normalized.detections.len(), 1);
        assert_eq!(normalized.detections[0].class, ObjectClass::Smoke);
        assert_eq!(normalized.warnings.len(), 3);
        assert!(matches!(
            normalized.warnings[0],
            NormalizeWarning::NonFiniteBox { .. }
        ));
        assert!(matches!(
            normalized.warnings[1],
            NormalizeWarning::InvertedBox { .. }
        ));
    }

    #[test]
    fn drops_boxes_beyond_the_coordinate_limit() {
        let normalized = normalize(
            DetectorRole::Ppe,
            &result(vec![
                RawDetection::new("person", [0.0, -3.0e9, 50.0, 50.0], 0.9).with_track_id(1),
                RawDetection::new("helmet", [0.0, 0.0, 2.0e6, 10.0], 0.9),
                RawDetection::new("person", [0.0, -1.0e6, 50.0, 50.0], 0.9).with_track_id(2),
            ]),
        );
        assert_eq!(normalized.detections.len(), 1);
        assert_eq!(normalized.detections[0].track_id, Some(2));
        assert_eq!(normalized.warnings.len(), 2);
        assert!(normalized
            .warnings
            .iter()
            .all(|w| matches!(w, NormalizeWarning::OutOfRangeBox { .. })));
    }

    #[test]
    fn truncates_coordinates_toward_zero() {
        let normalized = normalize(
            DetectorRole::Hazard,
            &result(vec![RawDetection::new("fire", [1.9, 2.2, 30.7, 40.99], 0.9)]),
        );
        assert_eq!(normalized.detections[0].bbox, BBox::new(1, 2, 30, 40));
    }

    #[test]
    fn sub_pixel_box_collapses_and_is_dropped() {
        let normalized = normalize(
            DetectorRole::Hazard,
            &result(vec![RawDetection::new("fire", [3.1, 3.1, 3.8, 9.0], 0.9)]),
        );
        assert!(normalized.detections.is_empty());
        assert_eq!(normalized.warnings.len(), 1);
    }

    #[test]
    fn persons_need_track_ids_and_others_lose_them() {
        let normalized = normalize(
            DetectorRole::Ppe,
            &result(vec![
                RawDetection::new("person", [0.0, 0.0, 50.0, 50.0], 0.9).with_track_id(4),
                RawDetection::new("person", [0.0, 0.0, 50.0, 50.0], 0.9),
                RawDetection::new("helmet", [0.0, 0.0, 5.0, 5.0], 0.9).with_track_id(9),
            ]),
        );

        assert_eq!(normalized.detections.len(), 2);
        assert_eq!(normalized.detections[0].track_id, Some(4));
        assert_eq!(normalized.detections[1].class, ObjectClass::Helmet);
        assert_eq!(normalized.detections[1].track_id, None);
        assert!(matches!(
            normalized.warnings[0],
            NormalizeWarning::MissingTrackId { .. }
        ));
    }

    #[test]
    fn hazard_detector_never_yields_tracked_rows() {
        let normalized = normalize(
            DetectorRole::Hazard,
            &result(vec![
                RawDetection::new("person", [0.0, 0.0, 50.0, 50.0], 0.9).with_track_id(1)
            ]),
        );
        assert_eq!(normalized.detections.len(), 1);
        assert_eq!(normalized.detections[0].track_id, None);
        assert_eq!(normalized.detections[0].role, DetectorRole::Hazard);
    }
}
