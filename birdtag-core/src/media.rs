//! Media kinds and extension classification.

use serde::{Deserialize, Serialize};

use crate::error::{BirdtagError, Result};
use crate::keys::file_name_of;
use crate::tags::TagMap;

/// Kind of media a stored object holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Audio,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3"];

impl FileType {
    /// Classify an extension, with or without its leading dot. Case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Audio)
        } else {
            None
        }
    }

    /// Classify an object key or file name by its final extension.
    pub fn classify(name: &str) -> Result<Self> {
        extension_of(name)
            .and_then(Self::from_extension)
            .ok_or_else(|| BirdtagError::UnsupportedMediaType(name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileType {
    type Err = BirdtagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(BirdtagError::UnsupportedMediaType(other.to_string())),
        }
    }
}

/// A catalog record for one uploaded asset and its detected tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub file_type: FileType,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub tags: TagMap,
}

impl MediaItem {
    pub fn new(id: &str, owner_id: &str, file_type: FileType, original_url: &str) -> Self {
        Self {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            file_type,
            original_url: original_url.to_string(),
            thumbnail_url: None,
            tags: TagMap::new(),
        }
    }

    pub fn with_tags(mut self, tags: TagMap) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail_url: &str) -> Self {
        self.thumbnail_url = Some(thumbnail_url.to_string());
        self
    }

    /// File name shown to users, taken from the original URL.
    pub fn file_name(&self) -> String {
        file_name_of(&self.original_url)
    }

    /// Whether `reference` names this item by id, original URL or thumbnail URL.
    pub fn is_referenced_by(&self, reference: &str) -> bool {
        self.id == reference
            || self.original_url == reference
            || self.thumbnail_url.as_deref() == Some(reference)
    }
}

/// Extension of the last path segment, without the dot.
pub fn extension_of(name: &str) -> Option<&str> {
    let file = name.rsplit('/').next().unwrap_or(name);
    match file.rfind('.') {
        Some(idx) if idx + 1 < file.len() => Some(&file[idx + 1..]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(FileType::from_extension(".JPG"), Some(FileType::Image));
        assert_eq!(FileType::from_extension("png"), Some(FileType::Image));
        assert_eq!(FileType::from_extension(".mov"), Some(FileType::Video));
        assert_eq!(FileType::from_extension("mp3"), Some(FileType::Audio));
        assert_eq!(FileType::from_extension(".gif"), None);
        assert_eq!(FileType::from_extension(""), None);
    }

    #[test]
    fn test_classify_uses_last_segment() {
        assert_eq!(
            FileType::classify("users/u1/raw/a.b/bird.Wav").unwrap(),
            FileType::Audio
        );
        assert!(matches!(
            FileType::classify("users/u1/raw/noext"),
            Err(BirdtagError::UnsupportedMediaType(_))
        ));
        assert!(FileType::classify("users/u1/raw/trailing.").is_err());
    }

    #[test]
    fn test_media_item_references() {
        let item = MediaItem::new("a1", "u1", FileType::Image, "https://h/objects/users/u1/raw/a1.jpg")
            .with_thumbnail("https://h/objects/users/u1/thumbnail/a1.jpg");
        assert_eq!(item.file_name(), "a1.jpg");
        assert!(item.is_referenced_by("a1"));
        assert!(item.is_referenced_by("https://h/objects/users/u1/thumbnail/a1.jpg"));
        assert!(!item.is_referenced_by("a2"));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&FileType::Video).unwrap();
        assert_eq!(json, "\"video\"");
        let back: FileType = serde_json::from_str("\"audio\"").unwrap();
        assert_eq!(back, FileType::Audio);
    }
}
