//! Violation alerts derived from a processed frame.
//!
//! Alerts are an output only. They are recomputed every frame and never feed
//! back into association or risk evaluation, so a person standing unequipped
//! for ten frames raises ten `NoHelmet` alerts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::detect::ObjectClass;
use crate::entity::FrameEntities;
use crate::risk::RiskEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    NoHelmet,
    NoMask,
    HazardDetected,
    CriticalRisk,
}

impl AlertKind {
    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::NoMask => Severity::Low,
            AlertKind::NoHelmet => Severity::Medium,
            AlertKind::HazardDetected | AlertKind::CriticalRisk => Severity::High,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub frame_index: u64,
    pub camera_id: String,
    pub zone: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub track_id: Option<u32>,
    pub description: String,
}

/// Where alerts are attributed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertOrigin {
    pub camera_id: String,
    pub zone: String,
}

impl Default for AlertOrigin {
    fn default() -> Self {
        Self {
            camera_id: "CAM-1".to_string(),
            zone: "zone:site".to_string(),
        }
    }
}

impl AlertOrigin {
    fn alert(
        &self,
        frame_index: u64,
        kind: AlertKind,
        track_id: Option<u32>,
        description: String,
    ) -> Alert {
        Alert {
            frame_index,
            camera_id: self.camera_id.clone(),
            zone: self.zone.clone(),
            kind,
            severity: kind.severity(),
            track_id,
            description,
        }
    }
}

pub fn derive_alerts(
    origin: &AlertOrigin,
    frame_index: u64,
    entities: &FrameEntities,
    risks: &[RiskEvent],
    risk_kinds: &BTreeSet<ObjectClass>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for person in entities.persons.values() {
        if !person.has_helmet {
            alerts.push(origin.alert(
                frame_index,
                AlertKind::NoHelmet,
                Some(person.track_id),
                format!("No helmet detected on ID {} in {}", person.track_id, origin.zone),
            ));
        }
        if !person.has_mask {
            alerts.push(origin.alert(
                frame_index,
                AlertKind::NoMask,
                Some(person.track_id),
                format!("No mask detected on ID {} in {}", person.track_id, origin.zone),
            ));
        }
    }

    for hazard in entities
        .hazards
        .iter()
        .filter(|h| risk_kinds.contains(&h.kind))
    {
        alerts.push(origin.alert(
            frame_index,
            AlertKind::HazardDetected,
            None,
            format!("{} detected in {}", capitalize(&hazard.label), origin.zone),
        ));
    }

    for risk in risks {
        alerts.push(origin.alert(
            frame_index,
            AlertKind::CriticalRisk,
            Some(risk.track_id),
            format!(
                "ID {} without mask {:.0}px from {}",
                risk.track_id,
                risk.distance,
                risk.hazard_kind.as_str()
            ),
        ));
    }

    alerts
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
