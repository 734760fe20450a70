mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{DetectorBackend, DetectorRole};
pub use backends::{ReplayBackend, ScriptedBackend, StubBackend};
pub use registry::{DetectorRegistry, FrameDetections};
pub use result::{DetectionResult, ObjectClass, RawDetection};
