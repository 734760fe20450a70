//! Person ↔ hazard risk evaluation.
//!
//! A risk event is one (person, hazard) pair where the hazard is a
//! risk-triggering kind, the centers are strictly closer than the hazard
//! threshold, and the person has no mask. Counts are pair counts: one unmasked
//! person between two fires is two events.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::detect::ObjectClass;
use crate::entity::FrameEntities;
use crate::geometry::{distance, BBox};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiskEvent {
    pub track_id: u32,
    pub person_bbox: BBox,
    /// Position of the hazard in `FrameEntities::hazards`.
    pub hazard_index: usize,
    pub hazard_kind: ObjectClass,
    pub hazard_bbox: BBox,
    pub distance: f64,
}

/// Evaluate every (hazard, person) pair, hazards in detector order.
pub fn evaluate(
    entities: &FrameEntities,
    hazard_distance_threshold: f64,
    risk_kinds: &BTreeSet<ObjectClass>,
) -> Vec<RiskEvent> {
    let mut events = Vec::new();
    for (hazard_index, hazard) in entities.hazards.iter().enumerate() {
        if !risk_kinds.contains(&hazard.kind) {
            continue;
        }
        for person in entities.persons.values() {
            let d = distance(&person.bbox, &hazard.bbox);
            if d < hazard_distance_threshold && !person.has_mask {
                events.push(RiskEvent {
                    track_id: person.track_id,
                    person_bbox: person.bbox,
                    hazard_index,
                    hazard_kind: hazard.kind,
                    hazard_bbox: hazard.bbox,
                    distance: d,
                });
            }
        }
    }
    events
}
