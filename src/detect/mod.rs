//! Plate detection boundary.
//!
//! The detection model is an external collaborator. The pipeline consumes it
//! through `DetectorBackend`: a frame in, zero or more raw boxes out. Raw
//! boxes are loosely structured model output; the pipeline converts them to
//! clamped `DetectionBox` values immediately on ingress.

mod backend;
mod scripted;

pub use backend::{DetectorBackend, RawDetection};
pub use scripted::ScriptedDetector;
