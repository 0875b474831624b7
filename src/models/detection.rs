//! Per-frame detector output.
//!
//! One `DetectionSnapshot` is assembled per sense tick from whichever
//! providers answered in time. It is ephemeral: the fuser reduces it to a
//! `MetricSnapshot` and the raw geometry is dropped.

use serde::{Deserialize, Serialize};

/// A point in the detector's normalized 3-D coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Face presence result from the face detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetection {
    pub present: bool,
    pub confidence: f64,
}

/// Six-point eye outline plus iris center, in the mesh detector's
/// coordinate space. Outline order: outer corner, upper-outer, upper-inner,
/// inner corner, lower-inner, lower-outer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeLandmarks {
    pub outline: [Point3; 6],
    pub iris_center: Point3,
}

/// Facial landmark result from the face-mesh detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceLandmarks {
    pub left_eye: EyeLandmarks,
    pub right_eye: EyeLandmarks,
}

/// A single body landmark with the detector's visibility estimate (0..1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseLandmark {
    pub point: Point3,
    pub visibility: f64,
}

impl PoseLandmark {
    pub fn new(point: Point3, visibility: f64) -> Self {
        Self { point, visibility }
    }
}

/// Body landmarks the posture scorer consumes. Any landmark the pose
/// detector could not place is `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyPose {
    pub nose: Option<PoseLandmark>,
    pub left_shoulder: Option<PoseLandmark>,
    pub right_shoulder: Option<PoseLandmark>,
    pub left_hip: Option<PoseLandmark>,
    pub right_hip: Option<PoseLandmark>,
}

/// One detected object with its class label and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    pub class: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Everything the detectors produced for a single frame. A `None` field
/// means that provider failed, timed out, or returned nothing this tick.
#[derive(Debug, Clone, Default)]
pub struct DetectionSnapshot {
    pub face: Option<FaceDetection>,
    pub landmarks: Option<FaceLandmarks>,
    pub pose: Option<BodyPose>,
    pub objects: Option<Vec<DetectedObject>>,
}
