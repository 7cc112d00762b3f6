use std::path::Path;

use anyhow::{Context, Result};
use faceprint_core::MatchPolicy;

/// Resolve the effective match policy: policy file (or defaults), then
/// `FACEPRINT_*` environment overrides, then validation.
pub fn load_policy(config_path: Option<&Path>) -> Result<MatchPolicy> {
    let policy = match config_path {
        Some(path) => MatchPolicy::load(path)
            .with_context(|| format!("loading policy from {}", path.display()))?,
        None => MatchPolicy::default(),
    };

    let policy = apply_overrides(policy, |key| std::env::var(key).ok());
    policy.validate().context("invalid match policy")?;
    Ok(policy)
}

/// Apply `FACEPRINT_*` overrides looked up through `lookup`. Unparsable values are ignored.
pub fn apply_overrides<F>(mut policy: MatchPolicy, lookup: F) -> MatchPolicy
where
    F: Fn(&str) -> Option<String>,
{
    policy.match_threshold_percent = var_or(
        &lookup,
        "FACEPRINT_MATCH_THRESHOLD",
        policy.match_threshold_percent,
    );
    policy.pose_gate_degrees = var_or(
        &lookup,
        "FACEPRINT_POSE_GATE_DEGREES",
        policy.pose_gate_degrees,
    );
    policy.capture_pose_limit_degrees = var_or(
        &lookup,
        "FACEPRINT_CAPTURE_POSE_LIMIT",
        policy.capture_pose_limit_degrees,
    );
    policy.max_contour_points = var_or(
        &lookup,
        "FACEPRINT_MAX_CONTOUR_POINTS",
        policy.max_contour_points,
    );
    policy
}

fn var_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable override");
            default
        }),
        None => default,
    }
}
