//! Detection-provider contract and the best-effort per-frame join.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use crate::models::detection::{
    BodyPose, DetectedObject, DetectionSnapshot, FaceDetection, FaceLandmarks,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::{log_info, log_warn};

/// Black-box detector backend. Each method is blocking compute (model
/// inference) invoked on the blocking pool once per sense tick; failures
/// are independent per signal kind.
pub trait DetectionSource: Send + Sync + 'static {
    fn detect_face(&self, timestamp: DateTime<Utc>) -> Result<FaceDetection>;
    fn detect_face_mesh(&self, timestamp: DateTime<Utc>) -> Result<FaceLandmarks>;
    fn detect_pose(&self, timestamp: DateTime<Utc>) -> Result<BodyPose>;
    fn detect_objects(&self, timestamp: DateTime<Utc>) -> Result<Vec<DetectedObject>>;
}

/// Issues all four detector calls concurrently and joins them best-effort:
/// a call that fails or misses the frame budget yields `None` for its
/// signal this frame only, without cancelling the others.
pub async fn gather_frame<D: DetectionSource>(
    source: &Arc<D>,
    timestamp: DateTime<Utc>,
    budget: Duration,
) -> DetectionSnapshot {
    let face_task = {
        let source = Arc::clone(source);
        tokio::task::spawn_blocking(move || source.detect_face(timestamp))
    };
    let mesh_task = {
        let source = Arc::clone(source);
        tokio::task::spawn_blocking(move || source.detect_face_mesh(timestamp))
    };
    let pose_task = {
        let source = Arc::clone(source);
        tokio::task::spawn_blocking(move || source.detect_pose(timestamp))
    };
    let objects_task = {
        let source = Arc::clone(source);
        tokio::task::spawn_blocking(move || source.detect_objects(timestamp))
    };

    let (face, landmarks, pose, objects) = tokio::join!(
        resolve("face", budget, face_task),
        resolve("face-mesh", budget, mesh_task),
        resolve("pose", budget, pose_task),
        resolve("object", budget, objects_task),
    );

    DetectionSnapshot {
        face,
        landmarks,
        pose,
        objects,
    }
}

async fn resolve<T>(kind: &str, budget: Duration, handle: JoinHandle<Result<T>>) -> Option<T> {
    match timeout(budget, handle).await {
        Ok(Ok(Ok(value))) => Some(value),
        Ok(Ok(Err(err))) => {
            log_info!("{kind} detector returned no result: {err:#}");
            None
        }
        Ok(Err(join_err)) => {
            log_warn!("{kind} detector worker join failed: {join_err}");
            None
        }
        Err(_) => {
            log_info!("{kind} detector exceeded the {budget:?} frame budget");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use chrono::TimeZone;

    struct FlakySource;

    impl DetectionSource for FlakySource {
        fn detect_face(&self, _timestamp: DateTime<Utc>) -> Result<FaceDetection> {
            Ok(FaceDetection {
                present: true,
                confidence: 0.9,
            })
        }

        fn detect_face_mesh(&self, _timestamp: DateTime<Utc>) -> Result<FaceLandmarks> {
            bail!("mesh model not loaded")
        }

        fn detect_pose(&self, _timestamp: DateTime<Utc>) -> Result<BodyPose> {
            // Far slower than any reasonable frame budget.
            std::thread::sleep(std::time::Duration::from_millis(500));
            Ok(BodyPose::default())
        }

        fn detect_objects(&self, _timestamp: DateTime<Utc>) -> Result<Vec<DetectedObject>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn partial_failures_leave_other_signals_intact() {
        let source = Arc::new(FlakySource);
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        let snapshot = gather_frame(&source, ts, Duration::from_millis(50)).await;

        assert!(snapshot.face.is_some());
        assert!(snapshot.landmarks.is_none(), "failed detector degrades");
        assert!(snapshot.pose.is_none(), "slow detector is dropped");
        assert!(snapshot.objects.is_some());
    }
}
