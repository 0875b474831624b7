//! Eye-aspect-ratio and gaze-direction estimation from mesh landmarks.

use crate::models::detection::{EyeLandmarks, FaceLandmarks, Point3};

/// Estimated gaze offset from the eye centers, normalized so that 1.0 is
/// the edge of the eye opening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeEstimate {
    pub horizontal: f64,
    pub vertical: f64,
}

impl GazeEstimate {
    /// Gaze within the screen cone on both axes.
    pub fn looking_at_screen(&self, threshold: f64) -> bool {
        self.horizontal.abs() < threshold && self.vertical.abs() < threshold
    }
}

/// Eye aspect ratio for one eye: vertical openings over horizontal width.
/// Collapses toward 0 as the eye closes.
fn eye_aspect_ratio(eye: &EyeLandmarks) -> Option<f64> {
    let [outer, upper_outer, upper_inner, inner, lower_inner, lower_outer] = &eye.outline;
    let width = outer.distance(inner);
    if width <= f64::EPSILON {
        return None;
    }
    let vertical = upper_outer.distance(lower_outer) + upper_inner.distance(lower_inner);
    Some(vertical / (2.0 * width))
}

/// Mean EAR over both eyes, or `None` when the geometry is degenerate.
pub fn average_eye_aspect_ratio(landmarks: &FaceLandmarks) -> Option<f64> {
    let left = eye_aspect_ratio(&landmarks.left_eye)?;
    let right = eye_aspect_ratio(&landmarks.right_eye)?;
    Some((left + right) / 2.0)
}

fn eye_center(eye: &EyeLandmarks) -> Point3 {
    let [outer, _, _, inner, _, _] = &eye.outline;
    Point3::new(
        (outer.x + inner.x) / 2.0,
        (outer.y + inner.y) / 2.0,
        (outer.z + inner.z) / 2.0,
    )
}

fn eye_gaze(eye: &EyeLandmarks) -> Option<GazeEstimate> {
    let [outer, upper_outer, upper_inner, inner, lower_inner, lower_outer] = &eye.outline;
    let half_width = outer.distance(inner) / 2.0;
    let half_height =
        (upper_outer.distance(lower_outer) + upper_inner.distance(lower_inner)) / 4.0;
    if half_width <= f64::EPSILON || half_height <= f64::EPSILON {
        return None;
    }
    let center = eye_center(eye);
    Some(GazeEstimate {
        horizontal: (eye.iris_center.x - center.x) / half_width,
        vertical: (eye.iris_center.y - center.y) / half_height,
    })
}

/// Gaze direction averaged over both eyes, relative to the eye centers.
pub fn estimate_gaze(landmarks: &FaceLandmarks) -> Option<GazeEstimate> {
    let left = eye_gaze(&landmarks.left_eye)?;
    let right = eye_gaze(&landmarks.right_eye)?;
    Some(GazeEstimate {
        horizontal: (left.horizontal + right.horizontal) / 2.0,
        vertical: (left.vertical + right.vertical) / 2.0,
    })
}
