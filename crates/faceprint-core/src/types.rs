use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A 2D point. Pixel coordinates on detector input, face-normalized units in records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Named anatomical landmark tracked in a feature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    Nose,
    Mouth,
    LeftCheek,
    RightCheek,
}

impl LandmarkKind {
    /// Every landmark, in record serialization order.
    pub const ALL: [LandmarkKind; 6] = [
        LandmarkKind::LeftEye,
        LandmarkKind::RightEye,
        LandmarkKind::Nose,
        LandmarkKind::Mouth,
        LandmarkKind::LeftCheek,
        LandmarkKind::RightCheek,
    ];

    /// Field name used in the record text format.
    pub const fn key(self) -> &'static str {
        match self {
            LandmarkKind::LeftEye => "leftEye",
            LandmarkKind::RightEye => "rightEye",
            LandmarkKind::Nose => "nose",
            LandmarkKind::Mouth => "mouth",
            LandmarkKind::LeftCheek => "leftCheek",
            LandmarkKind::RightCheek => "rightCheek",
        }
    }
}

/// Single-valued record feature: expression probabilities and head pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarFeature {
    Smile,
    LeftEyeOpen,
    RightEyeOpen,
    HeadEulerY,
    HeadEulerZ,
}

impl ScalarFeature {
    /// Every scalar, in record serialization order.
    pub const ALL: [ScalarFeature; 5] = [
        ScalarFeature::Smile,
        ScalarFeature::LeftEyeOpen,
        ScalarFeature::RightEyeOpen,
        ScalarFeature::HeadEulerY,
        ScalarFeature::HeadEulerZ,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            ScalarFeature::Smile => "smile",
            ScalarFeature::LeftEyeOpen => "leftEyeOpen",
            ScalarFeature::RightEyeOpen => "rightEyeOpen",
            ScalarFeature::HeadEulerY => "headEulerY",
            ScalarFeature::HeadEulerZ => "headEulerZ",
        }
    }

    /// Head pose angles in degrees, as opposed to [0, 1] probabilities.
    pub const fn is_angle(self) -> bool {
        matches!(self, ScalarFeature::HeadEulerY | ScalarFeature::HeadEulerZ)
    }
}

/// Face bounding box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBounds {
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Normalization scale: the longer side of the box.
    pub fn scale(&self) -> f32 {
        self.width.max(self.height)
    }
}

/// Raw detector output for one face, as pushed by the upstream face detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFaceGeometry {
    pub bounds: FaceBounds,
    /// Head rotation around the vertical axis, degrees.
    pub yaw: f32,
    /// Head rotation around the camera axis, degrees.
    pub roll: f32,
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkKind, Point>,
    /// Face outline polyline in pixels, possibly empty.
    #[serde(default)]
    pub contour: Vec<Point>,
    #[serde(default)]
    pub smile: Option<f32>,
    #[serde(default)]
    pub left_eye_open: Option<f32>,
    #[serde(default)]
    pub right_eye_open: Option<f32>,
}

/// Centered, scale-normalized description of one capture.
///
/// Positions are relative to the bounding-box center and divided by the
/// box's longer side. Head angles stay in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub landmarks: BTreeMap<LandmarkKind, Point>,
    pub contour: Vec<Point>,
    pub smile: f32,
    pub left_eye_open: f32,
    pub right_eye_open: f32,
    pub head_euler_y: f32,
    pub head_euler_z: f32,
}

impl FeatureRecord {
    pub fn scalar(&self, feature: ScalarFeature) -> f32 {
        match feature {
            ScalarFeature::Smile => self.smile,
            ScalarFeature::LeftEyeOpen => self.left_eye_open,
            ScalarFeature::RightEyeOpen => self.right_eye_open,
            ScalarFeature::HeadEulerY => self.head_euler_y,
            ScalarFeature::HeadEulerZ => self.head_euler_z,
        }
    }
}

/// Outcome of comparing two feature records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Aggregate similarity in [0, 100].
    pub percentage: f32,
}

impl MatchResult {
    /// Fail-closed result: no match, 0%.
    pub const fn rejected() -> Self {
        Self {
            matched: false,
            percentage: 0.0,
        }
    }
}

/// Similarity of one contributed feature, in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureScore {
    pub feature: &'static str,
    pub similarity: f32,
}

/// A stored record enrolled under a user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledRecord {
    pub id: String,
    pub label: String,
    /// Record text exactly as produced by the encoder.
    pub record: String,
}

/// Result of matching a probe record against a gallery.
#[derive(Debug, Clone, Serialize)]
pub struct GalleryMatch {
    pub matched: bool,
    /// Percentage of the best-scoring entry [0, 100].
    pub percentage: f32,
    /// ID of the matched entry (if any).
    pub record_id: Option<String>,
    /// Label of the matched entry (if any).
    pub record_label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_center_and_scale() {
        let b = FaceBounds { left: 100.0, top: 50.0, width: 200.0, height: 240.0 };
        assert_eq!(b.center(), Point::new(200.0, 170.0));
        assert_eq!(b.scale(), 240.0);
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_landmark_keys_follow_serde_names() {
        for kind in LandmarkKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.key()));
        }
    }

    #[test]
    fn test_geometry_from_json_defaults_optional_fields() {
        let json = r#"{
            "bounds": {"left": 0, "top": 0, "width": 100, "height": 100},
            "yaw": 1.5,
            "roll": -2.0,
            "landmarks": {"nose": {"x": 50, "y": 60}}
        }"#;
        let g: DetectedFaceGeometry = serde_json::from_str(json).unwrap();
        assert_eq!(g.landmarks.get(&LandmarkKind::Nose), Some(&Point::new(50.0, 60.0)));
        assert!(g.contour.is_empty());
        assert!(g.smile.is_none());
    }

    #[test]
    fn test_scalar_angle_classification() {
        let angles: Vec<_> = ScalarFeature::ALL.iter().filter(|f| f.is_angle()).collect();
        assert_eq!(angles, [&ScalarFeature::HeadEulerY, &ScalarFeature::HeadEulerZ]);
    }
}
