//! Geometry normalization — detector output to a face-centered feature record.
//!
//! Every position is expressed relative to the bounding-box center and
//! divided by the box's longer side, so records from different image sizes
//! and face distances are directly comparable.

use crate::codec;
use crate::policy::MatchPolicy;
use crate::types::{DetectedFaceGeometry, FaceBounds, FeatureRecord, Point};
use thiserror::Error;

/// Why a capture was not turned into a record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeRejection {
    #[error("face bounds are empty ({width}x{height})")]
    EmptyBounds { width: f32, height: f32 },
    #[error("head pose out of range: yaw={yaw:.1}, roll={roll:.1} (limit {limit:.1})")]
    PoseOutOfRange { yaw: f32, roll: f32, limit: f32 },
}

/// Converts detector geometry into feature records under a given policy.
#[derive(Debug, Clone, Default)]
pub struct FaceNormalizer {
    policy: MatchPolicy,
}

impl FaceNormalizer {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    /// Normalize a detected face, applying the bounds check and the capture pose gate.
    pub fn normalize(
        &self,
        geometry: &DetectedFaceGeometry,
    ) -> Result<FeatureRecord, EncodeRejection> {
        let bounds = &geometry.bounds;
        let sized = |v: f32| v.is_finite() && v != 0.0;
        if !sized(bounds.width)
            || !sized(bounds.height)
            || !bounds.left.is_finite()
            || !bounds.top.is_finite()
        {
            return Err(EncodeRejection::EmptyBounds {
                width: bounds.width,
                height: bounds.height,
            });
        }

        // NaN compares false against the limit, so check finiteness explicitly.
        let limit = self.policy.capture_pose_limit_degrees;
        let (yaw, roll) = (geometry.yaw, geometry.roll);
        if !yaw.is_finite() || !roll.is_finite() || yaw.abs() > limit || roll.abs() > limit {
            return Err(EncodeRejection::PoseOutOfRange { yaw, roll, limit });
        }

        let frame = Frame::new(bounds);

        let landmarks = geometry
            .landmarks
            .iter()
            .map(|(&kind, point)| (kind, frame.project(point)))
            .collect();

        let contour = subsample(&geometry.contour, self.policy.max_contour_points)
            .map(|point| frame.project(point))
            .collect();

        Ok(FeatureRecord {
            landmarks,
            contour,
            smile: geometry.smile.unwrap_or(0.0),
            left_eye_open: geometry.left_eye_open.unwrap_or(0.0),
            right_eye_open: geometry.right_eye_open.unwrap_or(0.0),
            head_euler_y: yaw,
            head_euler_z: roll,
        })
    }

    /// Normalize and serialize. Returns the empty string when the capture is rejected.
    pub fn encode(&self, geometry: &DetectedFaceGeometry) -> String {
        match self.normalize(geometry) {
            Ok(record) => {
                let text = codec::serialize(&record);
                tracing::debug!(
                    landmarks = record.landmarks.len(),
                    contour_points = record.contour.len(),
                    "encoded feature record"
                );
                text
            }
            Err(rejection) => {
                tracing::debug!(%rejection, "capture rejected");
                String::new()
            }
        }
    }
}

/// Reference frame shared by every point of one record.
struct Frame {
    center: Point,
    scale: f32,
}

impl Frame {
    fn new(bounds: &FaceBounds) -> Self {
        Self {
            center: bounds.center(),
            scale: bounds.scale(),
        }
    }

    fn project(&self, p: &Point) -> Point {
        Point::new((p.x - self.center.x) / self.scale, (p.y - self.center.y) / self.scale)
    }
}

/// Keep indices `0, step, 2*step, ...` with `step = max(1, ceil(n / max_points))`:
/// at most `max_points` points, spread over the whole outline.
fn subsample(points: &[Point], max_points: usize) -> impl Iterator<Item = &Point> {
    let step = points.len().div_ceil(max_points.max(1)).max(1);
    points.iter().step_by(step)
}
