//! Normalization of backend wire types into domain types.

use chrono::{DateTime, NaiveDateTime, Utc};
use rtumap_core::{Coordinates, Detection, DetectionResult, LeadScore, LocationRecord, RecordId};
use serde::Deserialize;

use crate::error::{DetectionError, FieldError};
use crate::types::{UploadResponse, WireDetection, WireRecord};

const PROCESSED_IMAGE_PREFIX: &str = "/uploads/processed/";

/// Reads an integer that may arrive as a JSON number or a numeric string.
fn lenient_i64(value: Option<&serde_json::Value>) -> Option<i64> {
    match value? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(truncate_f64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_f64(f: f64) -> i64 {
    f.trunc() as i64
}

/// Reads a float that may arrive as a JSON number or a numeric string.
fn lenient_f64(value: Option<&serde_json::Value>) -> Option<f64> {
    let parsed = match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Parses an RFC 3339 timestamp, falling back to a naive timestamp read as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Rewrites a stored image path to the `/uploads/processed/{filename}` form
/// the backend serves. Blank paths become `None`.
#[must_use]
pub fn normalize_processed_image(path: Option<&str>) -> Option<String> {
    let path = path.map(str::trim).filter(|p| !p.is_empty())?;
    if path.starts_with(PROCESSED_IMAGE_PREFIX) {
        return Some(path.to_string());
    }
    let filename = path.rsplit('/').next().unwrap_or(path);
    Some(format!("{PROCESSED_IMAGE_PREFIX}{filename}"))
}

/// Converts a backend record into a [`LocationRecord`].
///
/// Coordinates are only set when both `lat` and `lng` are present and in
/// range. A stored `lead_score` is read back unclamped; without one, the
/// score is derived from `rtu_count`.
#[must_use]
pub fn normalize_record(wire: WireRecord) -> LocationRecord {
    let rtu_count = lenient_i64(wire.rtu_count.as_ref())
        .and_then(|n| u32::try_from(n.max(0)).ok())
        .unwrap_or(0);

    let lead_score = lenient_i64(wire.lead_score.as_ref())
        .filter(|raw| *raw > 0)
        .map_or_else(|| LeadScore::from_rtu_count(rtu_count), LeadScore::from_raw);

    let coordinates = match (
        lenient_f64(wire.lat.as_ref()),
        lenient_f64(wire.lng.as_ref()),
    ) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng).ok(),
        _ => None,
    };

    let approved = wire.approved.unwrap_or(false);
    let status = wire.status.unwrap_or_else(|| {
        if approved {
            "approved".to_string()
        } else {
            "pending".to_string()
        }
    });

    LocationRecord {
        id: Some(RecordId(wire.id)),
        building_name: wire.building_name.unwrap_or_default(),
        address: wire.address.unwrap_or_default(),
        city: wire.city.unwrap_or_default(),
        state: wire.state.unwrap_or_default(),
        zip_code: wire.zip_code.unwrap_or_default(),
        coordinates,
        rtu_count,
        lead_score,
        processed_image: normalize_processed_image(wire.processed_image.as_deref()),
        filename: wire.filename.filter(|f| !f.is_empty()),
        status,
        approved,
        created_at: wire.created_at.as_deref().and_then(parse_timestamp),
        updated_at: wire.updated_at.as_deref().and_then(parse_timestamp),
    }
}

fn normalize_detection(wire: WireDetection, index: usize) -> Result<Detection, DetectionError> {
    if !wire.confidence.is_finite() {
        return Err(DetectionError::Malformed {
            reason: format!("detection {index} has a non-finite confidence"),
        });
    }

    let (x, y, width, height) = match (wire.x, wire.y, wire.bbox) {
        (Some(x), Some(y), bbox) => (
            x,
            y,
            bbox.map(|b| (b[2] - b[0]).abs()),
            bbox.map(|b| (b[3] - b[1]).abs()),
        ),
        (_, _, Some([x1, y1, x2, y2])) => (
            (x1 + x2) / 2.0,
            (y1 + y2) / 2.0,
            Some((x2 - x1).abs()),
            Some((y2 - y1).abs()),
        ),
        _ => {
            return Err(DetectionError::Malformed {
                reason: format!("detection {index} has neither x/y nor bbox"),
            })
        }
    };

    Ok(Detection {
        confidence: wire.confidence.clamp(0.0, 1.0),
        x,
        y,
        width,
        height,
        class_name: wire.class_name,
    })
}

/// Converts the body of `POST /upload` into a [`DetectionResult`].
///
/// # Errors
///
/// Returns [`DetectionError::Malformed`] if the body does not parse or any
/// detection lacks a position.
pub fn normalize_upload(body: &str) -> Result<DetectionResult, DetectionError> {
    let wire: UploadResponse =
        serde_json::from_str(body).map_err(|e| DetectionError::Malformed {
            reason: e.to_string(),
        })?;

    let detections = wire
        .detections
        .into_iter()
        .enumerate()
        .map(|(i, d)| normalize_detection(d, i))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DetectionResult::new(
        wire.rtu_count,
        detections,
        normalize_processed_image(wire.processed_image.as_deref()),
        wire.lead_score,
    ))
}

#[derive(Deserialize)]
struct ValidationItem {
    #[serde(default)]
    loc: Vec<serde_json::Value>,
    msg: String,
}

/// Message and per-field errors extracted from a non-2xx body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ErrorDetail {
    pub message: String,
    pub fields: Vec<FieldError>,
}

/// Extracts a readable message and per-field errors from an error body.
///
/// Understands `{"detail": "..."}`, `{"detail": [{"loc": [...], "msg": "..."}]}`,
/// `{"error": "..."}` and `{"message": "..."}`; anything else is returned
/// verbatim.
#[must_use]
pub fn parse_error_body(body: &str) -> ErrorDetail {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return ErrorDetail {
            message: body.trim().to_string(),
            fields: Vec::new(),
        };
    };

    if let Some(items) = json.get("detail").and_then(serde_json::Value::as_array) {
        let fields: Vec<FieldError> = items
            .iter()
            .filter_map(|item| serde_json::from_value::<ValidationItem>(item.clone()).ok())
            .map(|item| FieldError {
                field: field_path(&item.loc),
                message: item.msg,
            })
            .collect();
        return ErrorDetail {
            message: "validation failed".to_string(),
            fields,
        };
    }

    let message = ["detail", "error", "message"]
        .iter()
        .find_map(|key| json.get(key).and_then(serde_json::Value::as_str))
        .map_or_else(|| json.to_string(), str::to_string);

    ErrorDetail {
        message,
        fields: Vec::new(),
    }
}

/// Joins a `loc` path with dots, dropping the leading request-location
/// segment (`body`, `query`, `path`, `form`).
fn field_path(loc: &[serde_json::Value]) -> String {
    let parts: Vec<String> = loc
        .iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    let skip = usize::from(matches!(
        parts.first().map(String::as_str),
        Some("body" | "query" | "path" | "form")
    ) && parts.len() > 1);
    parts[skip..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(json: serde_json::Value) -> WireRecord {
        serde_json::from_value(json).expect("fixture should parse")
    }

    #[test]
    fn normalize_record_reads_string_numbers() {
        let record = normalize_record(wire(serde_json::json!({
            "id": 7,
            "rtu_count": "12",
            "lat": "40.4406",
            "lng": -79.9959,
            "address": "123 Main St",
            "processed_image": "uploads/processed/a.png"
        })));
        assert_eq!(record.id, Some(RecordId(7)));
        assert_eq!(record.rtu_count, 12);
        assert_eq!(record.lead_score.label(), "Good");
        assert!(record.coordinates.is_some());
        assert_eq!(
            record.processed_image.as_deref(),
            Some("/uploads/processed/a.png")
        );
        assert_eq!(record.status, "pending");
    }

    #[test]
    fn normalize_record_defaults_missing_values() {
        let record = normalize_record(wire(serde_json::json!({ "id": 1, "lat": 40.0 })));
        assert_eq!(record.rtu_count, 0);
        assert_eq!(record.lead_score.label(), "N/A");
        assert!(record.coordinates.is_none(), "lng missing means unlocated");
        assert!(record.processed_image.is_none());
    }

    #[test]
    fn normalize_record_keeps_stored_score_above_clamp() {
        let record = normalize_record(wire(serde_json::json!({
            "id": 1, "rtu_count": 3, "lead_score": 20
        })));
        assert_eq!(record.lead_score.label(), "Excellent");
    }

    #[test]
    fn parse_timestamp_accepts_naive_and_offset_forms() {
        assert!(parse_timestamp("2025-01-15T10:00:00+00:00").is_some());
        assert!(parse_timestamp("2025-01-15T10:00:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn normalize_upload_defaults_provider_score() {
        let result = normalize_upload(
            r#"{"rtu_count": 4, "detections": [{"confidence": 0.91, "x": 10, "y": 20}], "processed_image": "/uploads/processed/map.png"}"#,
        )
        .unwrap();
        assert_eq!(result.rtu_count, 4);
        assert_eq!(result.detections.len(), 1);
        assert!((result.provider_score - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.lead_score.label(), "Bad");
    }

    #[test]
    fn normalize_upload_derives_center_from_bbox() {
        let result = normalize_upload(
            r#"{"rtu_count": 1, "detections": [{"confidence": 0.7, "bbox": [10, 10, 30, 50]}]}"#,
        )
        .unwrap();
        let det = &result.detections[0];
        assert!((det.x - 20.0).abs() < f64::EPSILON);
        assert!((det.y - 30.0).abs() < f64::EPSILON);
        assert_eq!(det.width, Some(20.0));
        assert_eq!(det.height, Some(40.0));
    }

    #[test]
    fn normalize_upload_rejects_missing_count() {
        let err = normalize_upload(r#"{"detections": []}"#).unwrap_err();
        assert!(matches!(err, DetectionError::Malformed { .. }));
    }

    #[test]
    fn normalize_upload_rejects_unpositioned_detection() {
        let err = normalize_upload(r#"{"rtu_count": 1, "detections": [{"confidence": 0.7}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("detection 0"));
    }

    #[test]
    fn parse_error_body_extracts_field_errors() {
        let detail = parse_error_body(
            r#"{"detail": [{"loc": ["body", "zip_code"], "msg": "field required", "type": "value_error.missing"}]}"#,
        );
        assert_eq!(
            detail.fields,
            vec![FieldError {
                field: "zip_code".to_string(),
                message: "field required".to_string(),
            }]
        );
    }

    #[test]
    fn parse_error_body_reads_plain_messages() {
        assert_eq!(
            parse_error_body(r#"{"detail": "Record not found"}"#).message,
            "Record not found"
        );
        assert_eq!(
            parse_error_body(r#"{"error": "model offline"}"#).message,
            "model offline"
        );
        assert_eq!(parse_error_body("Bad Gateway").message, "Bad Gateway");
    }
}
