//! Raw detector output to canonical species counts.
//!
//! - Image: count of detections per species above the confidence threshold.
//! - Video: per frame, count distinct tracked individuals per species; the
//!   final count is the maximum seen in any single frame.
//! - Audio: every species detected anywhere in the clip counts once.
//!
//! The threshold is strict: a detection must have `confidence > threshold`.

use std::collections::{BTreeMap, BTreeSet};

use super::{Detection, FrameDetections, RawDetections};
use crate::tags::{normalize_label, TagMap};

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f32 = 0.3;

/// Normalize raw output for any media kind.
pub fn normalize(raw: &RawDetections, threshold: f32) -> TagMap {
    match raw {
        RawDetections::Image { detections } => normalize_image(detections, threshold),
        RawDetections::Video { frames } => normalize_video(frames, threshold),
        RawDetections::Audio { detections } => normalize_audio(detections, threshold),
    }
}

fn confident<'a>(
    detections: &'a [Detection],
    threshold: f32,
) -> impl Iterator<Item = (String, &'a Detection)> + 'a {
    detections.iter().filter_map(move |d| {
        if d.confidence > threshold {
            normalize_label(&d.label).map(|label| (label, d))
        } else {
            None
        }
    })
}

pub fn normalize_image(detections: &[Detection], threshold: f32) -> TagMap {
    let mut tags = TagMap::new();
    for (label, _) in confident(detections, threshold) {
        tags.add(&label, 1);
    }
    tags
}

pub fn normalize_video(frames: &[FrameDetections], threshold: f32) -> TagMap {
    let mut tags = TagMap::new();
    for frame in frames {
        let mut individuals: BTreeMap<String, BTreeSet<u64>> = BTreeMap::new();
        for (label, detection) in confident(&frame.detections, threshold) {
            // Untracked detections cannot be de-duplicated across frames.
            if let Some(tracker_id) = detection.tracker_id {
                individuals.entry(label).or_default().insert(tracker_id);
            }
        }
        for (label, ids) in individuals {
            tags.raise_to(&label, u32::try_from(ids.len()).unwrap_or(u32::MAX));
        }
    }
    tags
}

pub fn normalize_audio(detections: &[Detection], threshold: f32) -> TagMap {
    let mut tags = TagMap::new();
    for (label, _) in confident(detections, threshold) {
        tags.set(&label, 1);
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            tracker_id: None,
        }
    }

    fn tracked(label: &str, id: u64) -> Detection {
        Detection {
            label: label.to_string(),
            confidence: 0.9,
            tracker_id: Some(id),
        }
    }

    #[test]
    fn test_image_counts_above_threshold() {
        let tags = normalize_image(
            &[
                det("Crow", 0.9),
                det("crow", 0.5),
                det("crow", 0.3),
                det("sparrow", 0.31),
            ],
            DEFAULT_CONFIDENCE,
        );
        assert_eq!(tags.get("crow"), 2);
        assert_eq!(tags.get("sparrow"), 1);
    }

    #[test]
    fn test_video_takes_max_frame() {
        let frames = vec![
            FrameDetections {
                index: 0,
                detections: vec![tracked("crow", 1), tracked("crow", 2)],
            },
            FrameDetections {
                index: 1,
                detections: (1..=5).map(|id| tracked("crow", id)).collect(),
            },
            FrameDetections {
                index: 2,
                detections: (1..=3).map(|id| tracked("crow", id)).collect(),
            },
        ];
        let tags = normalize_video(&frames, DEFAULT_CONFIDENCE);
        assert_eq!(tags.get("crow"), 5);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_video_ignores_untracked_and_duplicate_ids() {
        let frames = vec![FrameDetections {
            index: 0,
            detections: vec![tracked("owl", 7), tracked("owl", 7), det("owl", 0.99)],
        }];
        let tags = normalize_video(&frames, DEFAULT_CONFIDENCE);
        assert_eq!(tags.get("owl"), 1);
    }

    #[test]
    fn test_audio_presence_only() {
        let tags = normalize_audio(
            &[det("crow", 0.8), det("crow", 0.9), det("sparrow", 0.7)],
            DEFAULT_CONFIDENCE,
        );
        assert_eq!(tags.get("crow"), 1);
        assert_eq!(tags.get("sparrow"), 1);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_empty_output_is_empty_map() {
        let raw = RawDetections::Image { detections: vec![] };
        assert!(normalize(&raw, DEFAULT_CONFIDENCE).is_empty());
    }
}
