//! Seams to the collaborators the monitor consults but does not implement:
//! frame sources, the identity oracle, detectors, the vision-language
//! service and the announcer.

use crate::detector::DetectorError;
use crate::frame::Frame;
use crate::types::{BoundingBox, Candidate, ObjectDetection};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// Routine: nobody is in front of the camera.
    #[error("no face detected")]
    NoFace,
    #[error("identity service failed: {0}")]
    Service(String),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("service not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(String),
    #[error("service returned no usable content")]
    EmptyResponse,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("frame encoding failed: {0}")]
    Encode(#[from] crate::frame::FrameError),
}

/// Supplies the current frame, or `None` when nothing is available yet.
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> Option<Frame>;

    /// Release the underlying device. Must be safe to call more than once.
    fn release(&self) {}
}

/// Face search against the reference database.
pub trait IdentityOracle: Send + Sync {
    /// Ordered best-first list of matching reference samples.
    fn find(&self, frame: &Frame) -> Result<Vec<Candidate>, OracleError>;
}

/// Fast local detector used only for drawing face boxes.
pub trait FaceRegionDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError>;
}

pub trait ObjectDetector: Send + Sync {
    fn detect(&self, frame: &Frame, confidence: f32) -> Result<Vec<ObjectDetection>, ServiceError>;
}

pub trait VisionLanguageService: Send + Sync {
    fn describe(&self, prompt: &str, frame: &Frame) -> Result<String, ServiceError>;
}

/// Human-facing notifications. Implementations must not block the caller.
pub trait Announcer: Send + Sync {
    fn speak(&self, text: &str);
    fn log_line(&self, text: &str);
}
