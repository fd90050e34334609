// Submission request validation
// Everything here runs before a Job exists; failures are VALIDATION.

use super::SubmitRequest;
use crate::error::{AppError, Result};
use std::path::Path;

pub const MAX_BATCH_INPUTS: usize = 500;
pub const MAX_SETTINGS_DEPTH: usize = 32;
pub const MAX_LABEL_LEN: usize = 256;

pub fn validate_request(req: &SubmitRequest) -> Result<()> {
    if req.inputs.is_empty() {
        return Err(AppError::Validation("No input files given".to_string()));
    }
    if req.inputs.len() > MAX_BATCH_INPUTS {
        return Err(AppError::Validation(format!(
            "Too many inputs: {} (max {MAX_BATCH_INPUTS})",
            req.inputs.len()
        )));
    }
    for input in &req.inputs {
        if input.trim().is_empty() {
            return Err(AppError::Validation("Input path is empty".to_string()));
        }
        if !req.kind.accepts(input) {
            return Err(AppError::Validation(format!(
                "Unsupported file type for {} job: {input} (accepted: {})",
                req.kind,
                req.kind.accepted_extensions().join(", ")
            )));
        }
    }

    if !req.settings.is_object() {
        return Err(AppError::Validation(
            "Settings must be a JSON object".to_string(),
        ));
    }
    let depth = json_depth(&req.settings);
    if depth > MAX_SETTINGS_DEPTH {
        return Err(AppError::Validation(format!(
            "Settings nested too deeply: {depth} (max {MAX_SETTINGS_DEPTH})"
        )));
    }

    if let Some(label) = &req.label {
        if label.chars().count() > MAX_LABEL_LEN {
            return Err(AppError::Validation(format!(
                "Label too long (max {MAX_LABEL_LEN} characters)"
            )));
        }
    }
    Ok(())
}

/// Scalars are depth 0; each enclosing object or array adds one
pub fn json_depth(value: &serde_json::Value) -> usize {
    let mut max = 0;
    let mut stack = vec![(value, 0usize)];
    while let Some((value, depth)) = stack.pop() {
        match value {
            serde_json::Value::Object(map) => {
                max = max.max(depth + 1);
                stack.extend(map.values().map(|child| (child, depth + 1)));
            }
            serde_json::Value::Array(items) => {
                max = max.max(depth + 1);
                stack.extend(items.iter().map(|child| (child, depth + 1)));
            }
            _ => {}
        }
    }
    max
}

/// File name for one input, `Batch (N files)` for several
pub fn default_label(inputs: &[String]) -> String {
    match inputs {
        [single] => display_name(single),
        many => format!("Batch ({} files)", many.len()),
    }
}

pub fn display_name(input: &str) -> String {
    Path::new(input)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(input)
        .to_string()
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;
