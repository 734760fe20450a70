//! Annotation requests for the rendering sink.
//!
//! The engine only says *what* to draw; pixels are the sink's business.

use serde::Serialize;

use crate::entity::FrameEntities;
use crate::geometry::BBox;
use crate::risk::RiskEvent;

const LABEL_OFFSET: i32 = 10;
const RISK_LABEL_OFFSET: i32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStyle {
    Compliant,
    Violation,
    Hazard,
    Critical,
}

impl AnnotationStyle {
    /// RGB color the reference dashboard uses for this style.
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            AnnotationStyle::Compliant => [0, 255, 0],
            AnnotationStyle::Violation | AnnotationStyle::Hazard | AnnotationStyle::Critical => {
                [255, 0, 0]
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// Box outline to draw, if any. Risk labels have none.
    pub bbox: Option<BBox>,
    pub label: String,
    /// Text baseline origin.
    pub anchor: (i32, i32),
    pub style: AnnotationStyle,
}

/// Build the annotation list for a frame: persons, then hazards, then risks.
pub fn annotate(entities: &FrameEntities, risks: &[RiskEvent]) -> Vec<Annotation> {
    let mut out = Vec::with_capacity(entities.persons.len() + entities.hazards.len() + risks.len());

    for person in entities.persons.values() {
        let (label, style) = if person.has_helmet {
            (format!("ID {}", person.track_id), AnnotationStyle::Compliant)
        } else {
            (
                format!("ID {} | NO HELMET", person.track_id),
                AnnotationStyle::Violation,
            )
        };
        out.push(Annotation {
            bbox: Some(person.bbox),
            label,
            anchor: (person.bbox.x1, person.bbox.y1.saturating_sub(LABEL_OFFSET)),
            style,
        });
    }

    for hazard in &entities.hazards {
        out.push(Annotation {
            bbox: Some(hazard.bbox),
            label: hazard.label.to_uppercase(),
            anchor: (hazard.bbox.x1, hazard.bbox.y1.saturating_sub(LABEL_OFFSET)),
            style: AnnotationStyle::Hazard,
        });
    }

    for risk in risks {
        out.push(Annotation {
            bbox: None,
            label: "CRITICAL RISK!".to_string(),
            anchor: (
                risk.person_bbox.x1,
                risk.person_bbox.y1.saturating_sub(RISK_LABEL_OFFSET),
            ),
            style: AnnotationStyle::Critical,
        });
    }

    out
}
