//! Feature record codec.
//!
//! The legacy text format is a flat `name:value` list joined by `;`.
//! Landmarks encode as `x,y`; the contour entry lists every point as
//! `x,y;`, nesting the entry delimiter, so its extent is only recoverable
//! from the fixed field order. `,` is always a component separator and `.`
//! is always the decimal separator.
//!
//! A versioned JSON envelope (`{"version":1,"record":{...}}`) is also
//! understood and is unambiguous.

use crate::types::{FeatureRecord, LandmarkKind, Point, ScalarFeature};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const FACE_CONTOUR_KEY: &str = "faceContour";
pub const RECORD_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("malformed structured record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported record version {found} (expected {})", RECORD_VERSION)]
    UnsupportedVersion { found: u32 },
}

/// Serialize a record in the legacy text format, four fractional digits per number.
pub fn serialize(record: &FeatureRecord) -> String {
    let mut out = String::new();

    for kind in LandmarkKind::ALL {
        if let Some(p) = record.landmarks.get(&kind) {
            out.push_str(&format!("{}:{:.4},{:.4};", kind.key(), p.x, p.y));
        }
    }

    if !record.contour.is_empty() {
        out.push_str(FACE_CONTOUR_KEY);
        out.push(':');
        for p in &record.contour {
            out.push_str(&format!("{:.4},{:.4};", p.x, p.y));
        }
    }

    let scalars: Vec<String> = ScalarFeature::ALL
        .iter()
        .map(|&f| format!("{}:{:.4}", f.key(), record.scalar(f)))
        .collect();
    out.push_str(&scalars.join(";"));

    out
}

/// Split record text into `name -> raw value`.
///
/// Never fails. Entries without exactly one `:` are dropped, except bare
/// `x,y` tokens directly after a `faceContour` entry, which are folded
/// back into its value. Later duplicates overwrite earlier ones.
pub fn parse(text: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut contour: Option<String> = None;

    for token in text.split(';') {
        if token.is_empty() {
            continue;
        }

        let parts: Vec<&str> = token.split(':').collect();
        match parts.as_slice() {
            [name, value] if *name == FACE_CONTOUR_KEY => {
                flush_contour(&mut fields, &mut contour);
                contour = Some((*value).to_string());
            }
            [name, value] => {
                flush_contour(&mut fields, &mut contour);
                fields.insert((*name).to_string(), (*value).to_string());
            }
            [point] if contour.is_some() => {
                if let Some(acc) = contour.as_mut() {
                    if !acc.is_empty() {
                        acc.push(';');
                    }
                    acc.push_str(point);
                }
            }
            _ => {
                flush_contour(&mut fields, &mut contour);
                tracing::trace!(entry = token, "dropping malformed record entry");
            }
        }
    }
    flush_contour(&mut fields, &mut contour);

    fields
}

fn flush_contour(fields: &mut HashMap<String, String>, contour: &mut Option<String>) {
    if let Some(value) = contour.take() {
        fields.insert(FACE_CONTOUR_KEY.to_string(), value);
    }
}

/// Emit the versioned JSON form of a record.
pub fn to_versioned_json(record: &FeatureRecord) -> Result<String, CodecError> {
    #[derive(Serialize)]
    struct Envelope<'a> {
        version: u32,
        record: &'a FeatureRecord,
    }

    Ok(serde_json::to_string(&Envelope {
        version: RECORD_VERSION,
        record,
    })?)
}

/// Read the versioned JSON form of a record.
pub fn from_versioned_json(text: &str) -> Result<FeatureRecord, CodecError> {
    #[derive(Deserialize)]
    struct Envelope {
        version: u32,
        record: serde_json::Value,
    }

    let envelope: Envelope = serde_json::from_str(text)?;
    if envelope.version != RECORD_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: envelope.version,
        });
    }
    Ok(serde_json::from_value(envelope.record)?)
}

/// Typed, partial view of a stored record. Any feature may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub landmarks: BTreeMap<LandmarkKind, Point>,
    pub contour: Option<Vec<Point>>,
    pub scalars: BTreeMap<ScalarFeature, f32>,
}

impl FeatureSet {
    /// Build from parsed fields. Values with unparsable or non-finite numbers are left out.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let mut set = FeatureSet::default();

        for kind in LandmarkKind::ALL {
            if let Some(p) = fields.get(kind.key()).and_then(|v| parse_point(v)) {
                set.landmarks.insert(kind, p);
            }
        }

        set.contour = fields.get(FACE_CONTOUR_KEY).and_then(|v| parse_contour(v));

        for feature in ScalarFeature::ALL {
            if let Some(v) = fields.get(feature.key()).and_then(|v| parse_number(v)) {
                set.scalars.insert(feature, v);
            }
        }

        set
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty() && self.contour.is_none() && self.scalars.is_empty()
    }
}

impl From<&FeatureRecord> for FeatureSet {
    fn from(record: &FeatureRecord) -> Self {
        let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
        Self {
            landmarks: record
                .landmarks
                .iter()
                .filter(|(_, p)| finite(*p))
                .map(|(&k, &p)| (k, p))
                .collect(),
            contour: (!record.contour.is_empty() && record.contour.iter().all(finite))
                .then(|| record.contour.clone()),
            scalars: ScalarFeature::ALL
                .iter()
                .map(|&f| (f, record.scalar(f)))
                .filter(|(_, v)| v.is_finite())
                .collect(),
        }
    }
}

/// Decode either record format into a feature set. Undecodable input yields an empty set.
pub fn decode(text: &str) -> FeatureSet {
    let text = text.trim();
    if text.starts_with('{') {
        match from_versioned_json(text) {
            Ok(record) => FeatureSet::from(&record),
            Err(error) => {
                tracing::debug!(%error, "ignoring undecodable structured record");
                FeatureSet::default()
            }
        }
    } else {
        FeatureSet::from_fields(&parse(text))
    }
}

fn parse_number(s: &str) -> Option<f32> {
    s.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_point(s: &str) -> Option<Point> {
    let mut parts = s.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(x), Some(y), None) => Some(Point::new(parse_number(x)?, parse_number(y)?)),
        _ => None,
    }
}

/// All points must parse; one corrupt point drops the whole contour since pairing is positional.
fn parse_contour(s: &str) -> Option<Vec<Point>> {
    let points = s
        .split(';')
        .filter(|p| !p.is_empty())
        .map(parse_point)
        .collect::<Option<Vec<_>>>()?;
    (!points.is_empty()).then_some(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FeatureRecord {
        let mut landmarks = BTreeMap::new();
        landmarks.insert(LandmarkKind::RightEye, Point::new(0.1, -0.05));
        landmarks.insert(LandmarkKind::LeftEye, Point::new(-0.1, -0.05));
        FeatureRecord {
            landmarks,
            contour: vec![Point::new(-0.4, 0.1), Point::new(0.0, 0.45), Point::new(0.4, 0.1)],
            smile: 0.9,
            left_eye_open: 0.8,
            right_eye_open: 0.75,
            head_euler_y: 2.0,
            head_euler_z: -1.0,
        }
    }

    #[test]
    fn test_serialize_layout() {
        let text = serialize(&record());
        assert_eq!(
            text,
            "leftEye:-0.1000,-0.0500;rightEye:0.1000,-0.0500;\
             faceContour:-0.4000,0.1000;0.0000,0.4500;0.4000,0.1000;\
             smile:0.9000;leftEyeOpen:0.8000;rightEyeOpen:0.7500;\
             headEulerY:2.0000;headEulerZ:-1.0000"
        );
    }

    #[test]
    fn test_serialize_without_contour_or_landmarks() {
        let mut r = record();
        r.landmarks.clear();
        r.contour.clear();
        assert_eq!(
            serialize(&r),
            "smile:0.9000;leftEyeOpen:0.8000;rightEyeOpen:0.7500;\
             headEulerY:2.0000;headEulerZ:-1.0000"
        );
    }

    #[test]
    fn test_parse_folds_contour_points() {
        let fields = parse(&serialize(&record()));
        assert_eq!(fields[FACE_CONTOUR_KEY], "-0.4000,0.1000;0.0000,0.4500;0.4000,0.1000");
        assert_eq!(fields["smile"], "0.9000");
        assert_eq!(fields["leftEye"], "-0.1000,-0.0500");
        assert_eq!(fields.len(), 8);
    }

    #[test]
    fn test_parse_drops_malformed_entries() {
        let fields = parse("nose:0.1,0.2;garbage;a:b:c;;smile:0.5");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["nose"], "0.1,0.2");
        assert_eq!(fields["smile"], "0.5");
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let fields = parse("smile:0.1;smile:0.7");
        assert_eq!(fields["smile"], "0.7");
    }

    #[test]
    fn test_stray_token_after_scalar_is_not_contour() {
        let fields = parse("faceContour:0.1,0.2;smile:0.5;0.3,0.4");
        assert_eq!(fields[FACE_CONTOUR_KEY], "0.1,0.2");
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").is_empty());
        assert!(decode("").is_empty());
        assert!(decode("   \n").is_empty());
    }

    #[test]
    fn test_corrupt_numbers_make_feature_absent() {
        let set = decode(
            "leftEye:abc,0.1;nose:0.1;mouth:0.1,0.2,0.3;\
             smile:0,5;rightEyeOpen:NaN;headEulerY:3.0000",
        );
        assert!(set.landmarks.is_empty());
        assert!(!set.scalars.contains_key(&ScalarFeature::Smile));
        assert!(!set.scalars.contains_key(&ScalarFeature::RightEyeOpen));
        assert_eq!(set.scalars[&ScalarFeature::HeadEulerY], 3.0);
    }

    #[test]
    fn test_corrupt_contour_point_drops_contour() {
        let set = decode("faceContour:0.1,0.2;x,0.4;smile:0.5");
        assert!(set.contour.is_none());
        assert_eq!(set.scalars[&ScalarFeature::Smile], 0.5);
    }

    #[test]
    fn test_text_round_trip_within_precision() {
        let mut r = record();
        r.landmarks.insert(LandmarkKind::Nose, Point::new(0.012_345, -0.333_333));
        r.smile = 0.123_456;
        let set = decode(&serialize(&r));

        for (kind, p) in &r.landmarks {
            let q = set.landmarks[kind];
            assert!((p.x - q.x).abs() <= 5e-5 && (p.y - q.y).abs() <= 5e-5, "{kind:?}");
        }
        let contour = set.contour.expect("contour present");
        assert_eq!(contour.len(), r.contour.len());
        for (p, q) in r.contour.iter().zip(&contour) {
            assert!((p.x - q.x).abs() <= 5e-5 && (p.y - q.y).abs() <= 5e-5);
        }
        for f in ScalarFeature::ALL {
            assert!((set.scalars[&f] - r.scalar(f)).abs() <= 5e-5, "{f:?}");
        }
    }

    #[test]
    fn test_versioned_json_round_trip() {
        let r = record();
        let json = to_versioned_json(&r).unwrap();
        assert!(json.starts_with("{\"version\":1"));
        assert_eq!(from_versioned_json(&json).unwrap(), r);
        assert_eq!(decode(&json), FeatureSet::from(&r));
    }

    #[test]
    fn test_versioned_json_rejects_unknown_version() {
        let json = to_versioned_json(&record())
            .unwrap()
            .replacen("\"version\":1", "\"version\":7", 1);
        assert!(matches!(
            from_versioned_json(&json),
            Err(CodecError::UnsupportedVersion { found: 7 })
        ));
        assert!(decode(&json).is_empty());
    }
}
