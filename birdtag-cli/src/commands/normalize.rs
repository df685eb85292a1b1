//! Normalize command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use birdtag_core::{normalize, BirdtagError, FileType, RawDetections};
use colored::Colorize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::utils::{format_tags, read_input, Output};

/// Build the tagged detector document from the file's JSON.
///
/// A bare array is taken as the detections (image, audio) or frames (video)
/// of the given media kind. An object without `media` gets it filled in.
fn to_raw(value: Value, file_type: FileType) -> Result<RawDetections> {
    let media = file_type.as_str();
    let document = match value {
        Value::Array(entries) => match file_type {
            FileType::Video => json!({"media": media, "frames": entries}),
            FileType::Image | FileType::Audio => json!({"media": media, "detections": entries}),
        },
        Value::Object(mut object) => {
            match object.get("media").and_then(Value::as_str) {
                Some(found) if found != media => {
                    return Err(BirdtagError::validation(format!(
                        "file holds {found} detections but --media is {media}"
                    ))
                    .into());
                }
                Some(_) => {}
                None => {
                    object.insert("media".to_string(), json!(media));
                }
            }
            Value::Object(object)
        }
        other => {
            return Err(BirdtagError::validation(format!(
                "expected a JSON object or array of detections, got {other}"
            ))
            .into())
        }
    };
    serde_json::from_value(document).context("Failed to parse detections")
}

/// Execute the normalize command.
pub fn execute(file: PathBuf, file_type: FileType, confidence: f32, output: Output) -> Result<()> {
    let content = read_input(&file)?;
    info!(path = %file.display(), bytes = content.len(), "Read detections");

    let value: Value = serde_json::from_slice(&content).context("Failed to parse detections")?;
    let raw = to_raw(value, file_type)?;
    let tags = normalize(&raw, confidence);
    debug!(species = tags.len(), "Normalized detections");

    if output.is_json() {
        return output.json(&tags);
    }

    output.line(format!(
        "{} {}",
        format!("Species tags ({file_type}, confidence >= {confidence:.2}):").bold(),
        format_tags(&tags)
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_array_takes_media_kind() {
        let raw = to_raw(
            json!([{"label": "crow", "confidence": 0.8}]),
            FileType::Audio,
        )
        .unwrap();
        assert_eq!(raw.file_type(), FileType::Audio);
    }

    #[test]
    fn test_media_mismatch_is_rejected() {
        let err = to_raw(json!({"media": "video", "frames": []}), FileType::Image).unwrap_err();
        assert!(err.to_string().contains("--media is image"));
    }
}
