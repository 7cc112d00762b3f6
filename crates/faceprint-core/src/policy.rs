//! Match policy — kernel scales, pose gates and the decision threshold.
//!
//! Every kernel has the shape `exp(-error / scale)`: a larger scale makes
//! that feature more tolerant of deviation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_LANDMARK_DISTANCE_THRESHOLD: f32 = 0.10;
pub const DEFAULT_CONTOUR_POINT_DISTANCE_THRESHOLD: f32 = 0.15;
pub const DEFAULT_FEATURE_DIFF_THRESHOLD: f32 = 0.15;
pub const DEFAULT_HEAD_ANGLE_THRESHOLD: f32 = 30.0;
pub const DEFAULT_POSE_GATE_DEGREES: f32 = 30.0;
pub const DEFAULT_CAPTURE_POSE_LIMIT_DEGREES: f32 = 30.0;
pub const DEFAULT_MATCH_THRESHOLD_PERCENT: f32 = 15.0;
pub const DEFAULT_MAX_CONTOUR_POINTS: usize = 20;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid policy TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchPolicy {
    /// Landmark distance (normalized units) at which similarity falls to 1/e.
    pub landmark_distance_threshold: f32,
    /// Per-point contour distance at which similarity falls to 1/e.
    pub contour_point_distance_threshold: f32,
    /// Probability difference at which similarity falls to 1/e.
    pub feature_diff_threshold: f32,
    /// Head angle difference (degrees) at which similarity falls to 1/e.
    pub head_angle_threshold: f32,
    /// Comparison is rejected outright when the wrapped pose difference exceeds this.
    pub pose_gate_degrees: f32,
    /// Captures posed beyond this on either axis are not encoded.
    pub capture_pose_limit_degrees: f32,
    /// Inclusive decision threshold on the aggregate percentage.
    pub match_threshold_percent: f32,
    pub max_contour_points: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            landmark_distance_threshold: DEFAULT_LANDMARK_DISTANCE_THRESHOLD,
            contour_point_distance_threshold: DEFAULT_CONTOUR_POINT_DISTANCE_THRESHOLD,
            feature_diff_threshold: DEFAULT_FEATURE_DIFF_THRESHOLD,
            head_angle_threshold: DEFAULT_HEAD_ANGLE_THRESHOLD,
            pose_gate_degrees: DEFAULT_POSE_GATE_DEGREES,
            capture_pose_limit_degrees: DEFAULT_CAPTURE_POSE_LIMIT_DEGREES,
            match_threshold_percent: DEFAULT_MATCH_THRESHOLD_PERCENT,
            max_contour_points: DEFAULT_MAX_CONTOUR_POINTS,
        }
    }
}

impl MatchPolicy {
    /// Parse and validate a policy from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, PolicyError> {
        let policy: MatchPolicy = toml::from_str(src)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load and validate a policy file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let src = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let policy = Self::from_toml_str(&src)?;
        tracing::debug!(path = %path.display(), ?policy, "loaded match policy");
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, value) in [
            ("landmark_distance_threshold", self.landmark_distance_threshold),
            ("contour_point_distance_threshold", self.contour_point_distance_threshold),
            ("feature_diff_threshold", self.feature_diff_threshold),
            ("head_angle_threshold", self.head_angle_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PolicyError::Invalid {
                    field,
                    reason: format!("kernel scale must be a positive number, got {value}"),
                });
            }
        }

        for (field, value) in [
            ("pose_gate_degrees", self.pose_gate_degrees),
            ("capture_pose_limit_degrees", self.capture_pose_limit_degrees),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PolicyError::Invalid {
                    field,
                    reason: format!("angle limit must be non-negative, got {value}"),
                });
            }
        }

        if !(0.0..=100.0).contains(&self.match_threshold_percent) {
            return Err(PolicyError::Invalid {
                field: "match_threshold_percent",
                reason: format!("must be within [0, 100], got {}", self.match_threshold_percent),
            });
        }

        if self.max_contour_points == 0 {
            return Err(PolicyError::Invalid {
                field: "max_contour_points",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Decision rule: the threshold itself counts as a match.
    pub fn is_match(&self, percentage: f32) -> bool {
        percentage >= self.match_threshold_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        MatchPolicy::default().validate().unwrap();
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let policy = MatchPolicy::default();
        assert!(policy.is_match(15.0));
        assert!(!policy.is_match(14.999));
        assert!(policy.is_match(100.0));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let policy = MatchPolicy::from_toml_str("match_threshold_percent = 80.0\n").unwrap();
        assert_eq!(policy.match_threshold_percent, 80.0);
        assert_eq!(policy.landmark_distance_threshold, DEFAULT_LANDMARK_DISTANCE_THRESHOLD);
        assert_eq!(policy.max_contour_points, DEFAULT_MAX_CONTOUR_POINTS);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = MatchPolicy::from_toml_str("similarity = 0.5\n").unwrap_err();
        assert!(matches!(err, PolicyError::Toml(_)));
    }

    #[test]
    fn test_zero_kernel_scale_rejected() {
        let err = MatchPolicy::from_toml_str("feature_diff_threshold = 0.0\n").unwrap_err();
        match err {
            PolicyError::Invalid { field, .. } => assert_eq!(field, "feature_diff_threshold"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_match_threshold_rejected() {
        let policy = MatchPolicy {
            match_threshold_percent: 120.0,
            ..MatchPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::Invalid { field: "match_threshold_percent", .. })
        ));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let path = Path::new("/nonexistent/faceprint/policy.toml");
        match MatchPolicy::load(path) {
            Err(PolicyError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_policy_toml_roundtrip() {
        let policy = MatchPolicy {
            pose_gate_degrees: 20.0,
            ..MatchPolicy::default()
        };
        let text = toml::to_string(&policy).unwrap();
        assert_eq!(MatchPolicy::from_toml_str(&text).unwrap(), policy);
    }
}
