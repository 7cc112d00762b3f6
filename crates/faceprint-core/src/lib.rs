//! faceprint-core — Facial geometry feature records and similarity scoring.
//!
//! Normalizes detector geometry (landmarks, contour, pose, expression
//! probabilities) into a scale-invariant feature record, serializes it for
//! storage, and scores two records against each other with fixed
//! exponential-decay kernels and a match threshold.
//!
//! Everything here is pure and synchronous: no shared state, no I/O outside
//! [`MatchPolicy::load`].

pub mod codec;
pub mod normalizer;
pub mod policy;
pub mod scorer;
pub mod types;

pub use codec::{CodecError, FeatureSet};
pub use normalizer::{EncodeRejection, FaceNormalizer};
pub use policy::{MatchPolicy, PolicyError};
pub use scorer::{ComparisonReport, Matcher, Scorer};
pub use types::{
    DetectedFaceGeometry, EnrolledRecord, FaceBounds, FeatureRecord, FeatureScore, GalleryMatch,
    LandmarkKind, MatchResult, Point, ScalarFeature,
};

/// Encode a capture with the default policy. Empty string when the capture is rejected.
pub fn encode(geometry: &DetectedFaceGeometry) -> String {
    FaceNormalizer::default().encode(geometry)
}

/// Compare two stored records with the default policy.
pub fn compare(a: &str, b: &str) -> MatchResult {
    Scorer::default().compare(a, b)
}
