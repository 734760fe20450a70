use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::DetectionResult;
use crate::frame::InferenceView;

use super::backend::{DetectorBackend, DetectorRole};

/// Both detector outputs for one frame, joined.
#[derive(Clone, Debug, Default)]
pub struct FrameDetections {
    pub ppe: DetectionResult,
    pub hazard: DetectionResult,
}

/// Thread-safe registry holding one backend per detector role.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct DetectorRegistry {
    backends: HashMap<DetectorRole, Arc<Mutex<dyn DetectorBackend>>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend for a role. Replaces any backend already in that slot.
    pub fn register<B: DetectorBackend + 'static>(
        &mut self,
        role: DetectorRole,
        backend: B,
    ) -> Result<()> {
        if !backend.supports(role) {
            return Err(anyhow!(
                "backend '{}' does not support the {} role",
                backend.name(),
                role.as_str()
            ));
        }
        self.backends.insert(role, Arc::new(Mutex::new(backend)));
        Ok(())
    }

    /// Builder-style registration.
    pub fn with<B: DetectorBackend + 'static>(
        mut self,
        role: DetectorRole,
        backend: B,
    ) -> Result<Self> {
        self.register(role, backend)?;
        Ok(self)
    }

    /// Get backend by role.
    pub fn get(&self, role: DetectorRole) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(&role).cloned()
    }

    /// Fails unless both roles are filled.
    pub fn ensure_complete(&self) -> Result<()> {
        for role in [DetectorRole::Ppe, DetectorRole::Hazard] {
            if !self.backends.contains_key(&role) {
                return Err(anyhow!("no detector registered for the {} role", role.as_str()));
            }
        }
        Ok(())
    }

    /// Names of registered backends, keyed by role.
    pub fn describe(&self) -> Vec<(DetectorRole, String)> {
        let mut out = Vec::new();
        for role in [DetectorRole::Ppe, DetectorRole::Hazard] {
            if let Some(backend) = self.backends.get(&role) {
                let name = match backend.lock() {
                    Ok(guard) => guard.name().to_string(),
                    Err(_) => "<poisoned>".to_string(),
                };
                out.push((role, name));
            }
        }
        out
    }

    pub fn warm_up(&self) -> Result<()> {
        for (role, backend) in &self.backends {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("{} backend lock poisoned", role.as_str()))?;
            guard.warm_up()?;
        }
        Ok(())
    }

    /// Run the backend registered for `role`.
    pub fn detect(
        &self,
        role: DetectorRole,
        view: &InferenceView<'_>,
        min_confidence: f32,
    ) -> Result<DetectionResult> {
        let backend = self
            .get(role)
            .ok_or_else(|| anyhow!("no detector registered for the {} role", role.as_str()))?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("{} backend lock poisoned", role.as_str()))?;
        guard.detect(view, min_confidence)
    }

    /// Run both detectors for a frame.
    ///
    /// With `parallel` set the hazard detector runs on a scoped thread; both
    /// results are joined before returning, so callers always see a complete pair.
    pub fn detect_frame(
        &self,
        view: &InferenceView<'_>,
        min_confidence: f32,
        parallel: bool,
    ) -> Result<FrameDetections> {
        if !parallel {
            let ppe = self.detect(DetectorRole::Ppe, view, min_confidence)?;
            let hazard = self.detect(DetectorRole::Hazard, view, min_confidence)?;
            return Ok(FrameDetections { ppe, hazard });
        }

        std::thread::scope(|scope| {
            let hazard_task =
                scope.spawn(|| self.detect(DetectorRole::Hazard, view, min_confidence));
            let ppe = self.detect(DetectorRole::Ppe, view, min_confidence);
            let hazard = hazard_task
                .join()
                .map_err(|_| anyhow!("hazard detector thread panicked"))?;
            Ok(FrameDetections {
                ppe: ppe?,
                hazard: hazard?,
            })
        })
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
