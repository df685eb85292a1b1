//! BirdTag Core - species tagging and tag search primitives
//!
//! This crate holds the domain logic of BirdTag, independent of any storage or
//! transport:
//!
//! - Species tag maps and superset-threshold tag queries
//! - Tag add/remove arithmetic for manual edits
//! - Boundary adapters for the accepted tag payload shapes
//! - Detection normalization (image counts, video peak-frame counts, audio presence)
//! - The detector seam with HTTP and mock implementations
//! - The content-search job state machine and result assembly
//! - Catalog mutation events and tag subscriptions
//!
//! # Example
//!
//! ```
//! use birdtag_core::{TagMap, TagQuery};
//!
//! let item: TagMap = [("pelican", 3), ("duck", 1)].into_iter().collect();
//! let query: TagQuery = [("pelican", 2)].into_iter().collect();
//! assert!(query.matches(&item));
//! ```

pub mod assemble;
pub mod detect;
pub mod error;
pub mod events;
pub mod job;
pub mod keys;
pub mod media;
pub mod payload;
pub mod subscription;
pub mod tags;

// Re-export main types for convenience
pub use assemble::{assemble, completed_outcome, display_key, UrlResolver};
pub use detect::{normalize, Detection, FrameDetections, RawDetections, DEFAULT_CONFIDENCE};
pub use error::{BirdtagError, Result};
pub use events::{CatalogEvent, MutationKind, NOTIFICATION_SUBJECT, USER_ID_ATTRIBUTE};
pub use job::{JobOutcome, JobStatus, MatchView, SearchJob};
pub use keys::{key_from_url, KeyKind, ObjectKey};
pub use media::{FileType, MediaItem};
pub use payload::{parse_query, parse_tags, subscription_labels, TagPayload};
pub use subscription::Subscription;
pub use tags::{matches, normalize_label, TagEdit, TagMap, TagQuery};

// Network-dependent exports
#[cfg(feature = "network")]
pub use detect::{
    detect_species, Detector, DetectorConfig, DetectorFactory, DetectorHandle, HttpDetector,
    HttpDetectorConfig, MockDetector,
};
