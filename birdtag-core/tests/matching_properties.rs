//! Property tests for the tag matching engine and detection normalizer.
//!
//! Inputs are generated from a small deterministic generator so failures
//! reproduce exactly.

use birdtag_core::detect::normalize::{normalize_audio, normalize_video};
use birdtag_core::{Detection, FrameDetections, TagEdit, TagMap, TagQuery};

const SPECIES: &[&str] = &["crow", "sparrow", "pelican", "heron", "owl", "duck"];
const CASES: usize = 500;

/// Linear congruential generator, enough for varied test inputs.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    fn tags(&mut self) -> TagMap {
        let mut tags = TagMap::new();
        for species in SPECIES {
            if self.below(2) == 0 {
                tags.set(species, self.below(5) as u32);
            }
        }
        tags
    }

    fn query(&mut self) -> TagQuery {
        let mut query = TagQuery::new();
        for species in SPECIES {
            if self.below(3) == 0 {
                query.require(species, self.below(5) as u32);
            }
        }
        query
    }
}

fn reference_match(tags: &TagMap, query: &TagQuery) -> bool {
    query.iter().all(|(species, min)| tags.get(species) >= min)
}

// ============================================================================
// Matching
// ============================================================================

#[test]
fn test_match_agrees_with_definition() {
    let mut rng = Lcg(7);
    for _ in 0..CASES {
        let tags = rng.tags();
        let query = rng.query();
        assert_eq!(
            query.matches(&tags),
            reference_match(&tags, &query),
            "tags={tags:?} query={query:?}"
        );
    }
}

#[test]
fn test_item_matches_query_built_from_its_own_tags() {
    let mut rng = Lcg(11);
    for _ in 0..CASES {
        let tags = rng.tags();
        assert!(TagQuery::from(&tags).matches(&tags));
    }
}

#[test]
fn test_pelican_example() {
    let query: TagQuery = [("pelican", 2)].into_iter().collect();
    let a: TagMap = [("pelican", 3), ("duck", 1)].into_iter().collect();
    let b: TagMap = [("pelican", 1)].into_iter().collect();
    assert!(query.matches(&a));
    assert!(!query.matches(&b));
}

// ============================================================================
// Tag edits
// ============================================================================

#[test]
fn test_add_is_accumulative() {
    let mut rng = Lcg(13);
    for _ in 0..CASES {
        let base = rng.tags();
        let species = SPECIES[rng.below(SPECIES.len() as u64) as usize];
        let c1 = rng.below(10) as u32;
        let c2 = rng.below(10) as u32;

        let one: TagMap = [(species, c1)].into_iter().collect();
        let two: TagMap = [(species, c2)].into_iter().collect();
        let both: TagMap = [(species, c1 + c2)].into_iter().collect();

        let stepwise = TagEdit::Add.apply(&TagEdit::Add.apply(&base, &one), &two);
        let at_once = TagEdit::Add.apply(&base, &both);
        assert_eq!(stepwise, at_once);
    }
}

#[test]
fn test_remove_is_unconditional() {
    let mut rng = Lcg(17);
    for _ in 0..CASES {
        let base = rng.tags();
        let species = SPECIES[rng.below(SPECIES.len() as u64) as usize];
        let edit: TagMap = [(species, rng.below(10) as u32)].into_iter().collect();

        let out = TagEdit::Remove.apply(&base, &edit);
        assert!(!out.contains(species));
        for other in SPECIES.iter().filter(|s| **s != species) {
            assert_eq!(out.get(other), base.get(other));
        }
    }
}

// ============================================================================
// Normalizer
// ============================================================================

fn tracked(label: &str, id: u64) -> Detection {
    Detection {
        label: label.to_string(),
        confidence: 0.95,
        tracker_id: Some(id),
    }
}

#[test]
fn test_video_peak_frame() {
    let frames: Vec<FrameDetections> = [2u64, 5, 3]
        .iter()
        .enumerate()
        .map(|(i, n)| FrameDetections {
            index: i as u64,
            detections: (0..*n).map(|id| tracked("crow", id)).collect(),
        })
        .collect();
    let tags = normalize_video(&frames, 0.3);
    let expected: TagMap = [("crow", 5)].into_iter().collect();
    assert_eq!(tags, expected);
}

#[test]
fn test_audio_presence() {
    let detections: Vec<Detection> = ["crow", "crow", "sparrow"]
        .iter()
        .map(|label| Detection {
            label: label.to_string(),
            confidence: 0.9,
            tracker_id: None,
        })
        .collect();
    let tags = normalize_audio(&detections, 0.3);
    let expected: TagMap = [("crow", 1), ("sparrow", 1)].into_iter().collect();
    assert_eq!(tags, expected);
}

#[test]
fn test_video_frame_order_does_not_matter() {
    let mut rng = Lcg(23);
    for _ in 0..100 {
        let mut frames: Vec<FrameDetections> = (0..6)
            .map(|i| FrameDetections {
                index: i,
                detections: (0..rng.below(6)).map(|id| tracked("owl", id)).collect(),
            })
            .collect();
        let forward = normalize_video(&frames, 0.3);
        frames.reverse();
        assert_eq!(forward, normalize_video(&frames, 0.3));
    }
}
