//! Per-frame entity registry.
//!
//! Rebuilt from scratch on every frame. Persons are keyed by the tracker's id;
//! equipment and hazards have no identity at all.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::detect::ObjectClass;
use crate::geometry::BBox;
use crate::normalize::Detection;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Person {
    pub track_id: u32,
    pub bbox: BBox,
    pub has_helmet: bool,
    pub has_mask: bool,
}

impl Person {
    pub fn new(track_id: u32, bbox: BBox) -> Self {
        Self {
            track_id,
            bbox,
            has_helmet: false,
            has_mask: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EquipmentItem {
    pub kind: ObjectClass,
    pub label: String,
    pub bbox: BBox,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Hazard {
    pub kind: ObjectClass,
    pub label: String,
    pub bbox: BBox,
}

/// Everything known about one frame after normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrameEntities {
    /// Ordered by track id so every pass over persons is deterministic.
    pub persons: BTreeMap<u32, Person>,
    pub equipment: Vec<EquipmentItem>,
    pub hazards: Vec<Hazard>,
}

impl FrameEntities {
    /// Partition both detectors' normalized output.
    ///
    /// PPE detector: `person` rows become persons, everything else equipment.
    /// Hazard detector: every row is a hazard, whatever its class.
    /// A track id seen twice in one frame keeps the later box.
    pub fn build(ppe: &[Detection], hazard: &[Detection]) -> Self {
        let mut entities = FrameEntities::default();

        for detection in ppe {
            match (detection.class, detection.track_id) {
                (ObjectClass::Person, Some(track_id)) => {
                    let person = Person::new(track_id, detection.bbox);
                    if entities.persons.insert(track_id, person).is_some() {
                        log::debug!("track id {} reported twice; keeping the later box", track_id);
                    }
                }
                // Untracked persons never get past the normalizer.
                (ObjectClass::Person, None) => {}
                (kind, _) => entities.equipment.push(EquipmentItem {
                    kind,
                    label: detection.label.clone(),
                    bbox: detection.bbox,
                }),
            }
        }

        entities.hazards = hazard
            .iter()
            .map(|detection| Hazard {
                kind: detection.class,
                label: detection.label.clone(),
                bbox: detection.bbox,
            })
            .collect();

        entities
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty() && self.equipment.is_empty() && self.hazards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectorRole;

    fn det(role: DetectorRole, label: &str, bbox: BBox, track_id: Option<u32>) -> Detection {
        Detection {
            class: ObjectClass::from_label(label),
            label: label.to_string(),
            bbox,
            track_id,
            role,
        }
    }

    #[test]
    fn partitions_ppe_and_hazard_output() {
        let ppe = vec![
            det(DetectorRole::Ppe, "person", BBox::new(0, 0, 10, 10), Some(2)),
            det(DetectorRole::Ppe, "helmet", BBox::new(0, 0, 5, 5), None),
            det(DetectorRole::Ppe, "goggles", BBox::new(0, 0, 5, 5), None),
        ];
        let hazard = vec![
            det(DetectorRole::Hazard, "fire", BBox::new(50, 50, 60, 60), None),
            det(DetectorRole::Hazard, "person", BBox::new(50, 50, 60, 60), None),
        ];

        let entities = FrameEntities::build(&ppe, &hazard);
        assert_eq!(entities.persons.len(), 1);
        assert!(!entities.persons[&2].has_helmet);
        assert_eq!(entities.equipment.len(), 2);
        assert_eq!(entities.equipment[1].kind, ObjectClass::Unknown);
        assert_eq!(entities.equipment[1].label, "goggles");
        assert_eq!(entities.hazards.len(), 2);
        assert_eq!(entities.hazards[1].kind, ObjectClass::Person);
    }

    #[test]
    fn duplicate_track_id_keeps_one_person() {
        let ppe = vec![
            det(DetectorRole::Ppe, "person", BBox::new(0, 0, 10, 10), Some(7)),
            det(DetectorRole::Ppe, "person", BBox::new(20, 20, 40, 40), Some(7)),
        ];
        let entities = FrameEntities::build(&ppe, &[]);
        assert_eq!(entities.persons.len(), 1);
        assert_eq!(entities.persons[&7].bbox, BBox::new(20, 20, 40, 40));
    }

    #[test]
    fn empty_input_builds_empty_registry() {
        assert!(FrameEntities::build(&[], &[]).is_empty());
    }
}
