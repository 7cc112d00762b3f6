//! Similarity scoring between two feature records.
//!
//! Each comparable feature is scored with an exponential-decay kernel
//! `exp(-error / scale)`, the scores are averaged, and the mean is gated by
//! the match threshold. Features missing on either side are skipped rather
//! than penalized. A large head-pose divergence rejects the pair before any
//! feature is scored.

use crate::codec::{self, FeatureSet};
use crate::policy::MatchPolicy;
use crate::types::{
    EnrolledRecord, FeatureScore, GalleryMatch, LandmarkKind, MatchResult, ScalarFeature,
};
use serde::Serialize;

/// Map an angle in degrees into [-180, 180].
pub fn wrap_degrees(angle: f32) -> f32 {
    let a = angle % 360.0;
    if a > 180.0 {
        a - 360.0
    } else if a < -180.0 {
        a + 360.0
    } else {
        a
    }
}

/// Similarity kernel: 1 at zero error, 1/e at `error == scale`.
pub fn decay(error: f32, scale: f32) -> f32 {
    (-error / scale).exp()
}

/// Full comparison outcome, including every contributed feature score.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub result: MatchResult,
    /// True when the pair was rejected by the pose gate.
    pub pose_rejected: bool,
    pub features: Vec<FeatureScore>,
}

impl ComparisonReport {
    fn rejected(pose_rejected: bool) -> Self {
        Self {
            result: MatchResult::rejected(),
            pose_rejected,
            features: Vec::new(),
        }
    }
}

/// Stateless record comparator under a fixed policy.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    policy: MatchPolicy,
}

impl Scorer {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    /// Compare two stored records. Empty input on either side is a no-match at 0%.
    pub fn compare(&self, a: &str, b: &str) -> MatchResult {
        self.explain(a, b).result
    }

    /// Like [`compare`](Self::compare), also returning the per-feature breakdown.
    pub fn explain(&self, a: &str, b: &str) -> ComparisonReport {
        if a.trim().is_empty() || b.trim().is_empty() {
            tracing::debug!("feature record is empty");
            return ComparisonReport::rejected(false);
        }
        self.score(&codec::decode(a), &codec::decode(b))
    }

    /// Score two already-decoded feature sets.
    pub fn score(&self, a: &FeatureSet, b: &FeatureSet) -> ComparisonReport {
        if let Some((dy, dz)) = pose_divergence(a, b) {
            if dy > self.policy.pose_gate_degrees || dz > self.policy.pose_gate_degrees {
                tracing::debug!(
                    yaw_diff = dy,
                    roll_diff = dz,
                    "head rotation difference too large"
                );
                return ComparisonReport::rejected(true);
            }
        }

        let mut features = Vec::new();

        for kind in LandmarkKind::ALL {
            if let (Some(p), Some(q)) = (a.landmarks.get(&kind), b.landmarks.get(&kind)) {
                let distance = p.distance(q);
                let similarity = decay(distance, self.policy.landmark_distance_threshold);
                tracing::debug!(feature = kind.key(), distance, similarity, "landmark comparison");
                features.push(FeatureScore {
                    feature: kind.key(),
                    similarity,
                });
            }
        }

        if let (Some(ca), Some(cb)) = (&a.contour, &b.contour) {
            // Positional pairing: the shorter contour bounds the comparison.
            let (sum, pairs) = ca
                .iter()
                .zip(cb.iter())
                .map(|(p, q)| decay(p.distance(q), self.policy.contour_point_distance_threshold))
                .fold((0.0f32, 0usize), |(sum, n), s| (sum + s, n + 1));
            if pairs > 0 {
                let similarity = sum / pairs as f32;
                tracing::debug!(pairs, similarity, "face contour comparison");
                features.push(FeatureScore {
                    feature: codec::FACE_CONTOUR_KEY,
                    similarity,
                });
            }
        }

        for feature in ScalarFeature::ALL {
            if let (Some(&v1), Some(&v2)) = (a.scalars.get(&feature), b.scalars.get(&feature)) {
                let similarity = if feature.is_angle() {
                    let diff = (wrap_degrees(v1) - wrap_degrees(v2)).abs();
                    decay(diff, self.policy.head_angle_threshold)
                } else {
                    decay((v1 - v2).abs(), self.policy.feature_diff_threshold)
                };
                tracing::debug!(feature = feature.key(), v1, v2, similarity, "feature comparison");
                features.push(FeatureScore {
                    feature: feature.key(),
                    similarity,
                });
            }
        }

        let percentage = if features.is_empty() {
            0.0
        } else {
            let total: f32 = features.iter().map(|f| f.similarity).sum();
            100.0 * total / features.len() as f32
        };
        // Nothing comparable never matches, whatever the threshold.
        let matched = !features.is_empty() && self.policy.is_match(percentage);

        tracing::debug!(
            contributed = features.len(),
            percentage,
            matched,
            "face comparison result"
        );

        ComparisonReport {
            result: MatchResult { matched, percentage },
            pose_rejected: false,
            features,
        }
    }
}

/// Wrapped absolute (yaw, roll) difference, when both sets carry both angles.
fn pose_divergence(a: &FeatureSet, b: &FeatureSet) -> Option<(f32, f32)> {
    let angle = |set: &FeatureSet, f| set.scalars.get(&f).copied();
    let (y1, z1) = (angle(a, ScalarFeature::HeadEulerY)?, angle(a, ScalarFeature::HeadEulerZ)?);
    let (y2, z2) = (angle(b, ScalarFeature::HeadEulerY)?, angle(b, ScalarFeature::HeadEulerZ)?);
    let diff = |u: f32, v: f32| wrap_degrees(wrap_degrees(u) - wrap_degrees(v)).abs();
    Some((diff(y1, y2), diff(z1, z2)))
}

/// Strategy for comparing a probe record against a gallery of enrolled records.
pub trait Matcher {
    fn best_match(&self, probe: &str, gallery: &[EnrolledRecord]) -> GalleryMatch;
}

impl Matcher for Scorer {
    /// Scores every gallery entry, with no early exit, and reports the best one.
    fn best_match(&self, probe: &str, gallery: &[EnrolledRecord]) -> GalleryMatch {
        let no_match = |percentage| GalleryMatch {
            matched: false,
            percentage,
            record_id: None,
            record_label: None,
        };

        if probe.trim().is_empty() {
            return no_match(0.0);
        }
        let probe = codec::decode(probe);

        let mut best: Option<(usize, MatchResult)> = None;
        for (i, entry) in gallery.iter().enumerate() {
            let result = if entry.record.trim().is_empty() {
                MatchResult::rejected()
            } else {
                self.score(&probe, &codec::decode(&entry.record)).result
            };
            let is_better = match &best {
                None => true,
                Some((_, prev)) => result.percentage > prev.percentage,
            };
            if is_better {
                best = Some((i, result));
            }
        }

        match best {
            Some((idx, result)) if result.matched => {
                tracing::debug!(
                    id = %gallery[idx].id,
                    percentage = result.percentage,
                    "gallery match"
                );
                GalleryMatch {
                    matched: true,
                    percentage: result.percentage,
                    record_id: Some(gallery[idx].id.clone()),
                    record_label: Some(gallery[idx].label.clone()),
                }
            }
            Some((_, result)) => no_match(result.percentage),
            None => no_match(0.0),
        }
    }
}
