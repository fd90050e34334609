//! Unit tests for submission validation

use super::*;
use crate::domain::JobKind;
use serde_json::json;

fn request(kind: JobKind, inputs: &[&str]) -> SubmitRequest {
    SubmitRequest {
        kind,
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        settings: json!({}),
        label: None,
    }
}

fn nested(depth: usize) -> serde_json::Value {
    let mut value = json!(1);
    for _ in 0..depth {
        value = json!({ "x": value });
    }
    value
}

#[test]
fn test_valid_single_input() {
    assert!(validate_request(&request(JobKind::Audio, &["/tmp/a.MP3"])).is_ok());
}

#[test]
fn test_empty_inputs_rejected() {
    let err = validate_request(&request(JobKind::Audio, &[])).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn test_too_many_inputs_rejected() {
    let inputs: Vec<String> = (0..=MAX_BATCH_INPUTS).map(|i| format!("{i}.txt")).collect();
    let req = SubmitRequest {
        inputs,
        ..request(JobKind::Summary, &[])
    };
    let err = validate_request(&req).unwrap_err();
    assert!(err.to_string().contains("Too many inputs"));
}

#[test]
fn test_wrong_extension_rejected() {
    let err = validate_request(&request(JobKind::Video, &["a.mp4", "b.mp3"])).unwrap_err();
    assert!(err.to_string().contains("b.mp3"));
}

#[test]
fn test_blank_input_rejected() {
    let err = validate_request(&request(JobKind::Audio, &["  "])).unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[test]
fn test_settings_must_be_object() {
    let req = SubmitRequest {
        settings: json!([1, 2]),
        ..request(JobKind::Audio, &["a.wav"])
    };
    assert!(validate_request(&req).is_err());
}

#[test]
fn test_settings_depth_limit() {
    let ok = SubmitRequest {
        settings: nested(MAX_SETTINGS_DEPTH),
        ..request(JobKind::Audio, &["a.wav"])
    };
    assert!(validate_request(&ok).is_ok());

    let deep = SubmitRequest {
        settings: nested(MAX_SETTINGS_DEPTH + 1),
        ..request(JobKind::Audio, &["a.wav"])
    };
    assert!(validate_request(&deep)
        .unwrap_err()
        .to_string()
        .contains("nested too deeply"));
}

#[test]
fn test_label_length_limit() {
    let req = SubmitRequest {
        label: Some("x".repeat(MAX_LABEL_LEN + 1)),
        ..request(JobKind::Audio, &["a.wav"])
    };
    assert!(validate_request(&req).is_err());
}

#[test]
fn test_json_depth() {
    assert_eq!(json_depth(&json!(3)), 0);
    assert_eq!(json_depth(&json!({})), 1);
    assert_eq!(json_depth(&json!({"a": [1, {"b": 2}]})), 3);
}

#[test]
fn test_default_label() {
    assert_eq!(default_label(&["/data/talk.mp3".to_string()]), "talk.mp3");
    assert_eq!(
        default_label(&["a.mp3".to_string(), "b.mp3".to_string()]),
        "Batch (2 files)"
    );
}
