//! Object key conventions.
//!
//! Keys encode `<prefix>/<owner_id>/<id><ext>`:
//!
//! - catalog uploads: `users/<owner_id>/raw/<id><ext>`
//! - thumbnails: `users/<owner_id>/thumbnail/<id><ext>`
//! - search probes: `tmp/<owner_id>/<job_id><ext>`

use url::Url;

use crate::error::{BirdtagError, Result};
use crate::media::FileType;

const USERS_PREFIX: &str = "users";
const RAW_SEGMENT: &str = "raw";
const THUMBNAIL_SEGMENT: &str = "thumbnail";
const PROBE_PREFIX: &str = "tmp";

/// Path segment under which the object store serves objects over HTTP.
pub const OBJECTS_PATH: &str = "objects";

/// What an object key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Catalog media upload
    Upload,
    /// Thumbnail derived from a catalog upload
    Thumbnail,
    /// Content-search probe
    Probe,
}

/// A parsed object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub kind: KeyKind,
    pub owner_id: String,
    /// Item id for uploads and thumbnails, job id for probes.
    pub id: String,
    /// Extension including the leading dot (may be empty).
    pub extension: String,
}

impl ObjectKey {
    pub fn upload(owner_id: &str, id: &str, extension: &str) -> Result<Self> {
        Self::build(KeyKind::Upload, owner_id, id, extension)
    }

    pub fn thumbnail(owner_id: &str, id: &str, extension: &str) -> Result<Self> {
        Self::build(KeyKind::Thumbnail, owner_id, id, extension)
    }

    pub fn probe(owner_id: &str, job_id: &str, extension: &str) -> Result<Self> {
        Self::build(KeyKind::Probe, owner_id, job_id, extension)
    }

    fn build(kind: KeyKind, owner_id: &str, id: &str, extension: &str) -> Result<Self> {
        validate_segment("owner id", owner_id)?;
        validate_segment("id", id)?;
        if extension.contains('/') {
            return Err(BirdtagError::validation("extension must not contain '/'"));
        }
        let extension = match extension {
            "" => String::new(),
            e if e.starts_with('.') => e.to_string(),
            e => format!(".{e}"),
        };
        Ok(Self {
            kind,
            owner_id: owner_id.to_string(),
            id: id.to_string(),
            extension,
        })
    }

    /// Parse a key emitted by the object store.
    pub fn parse(key: &str) -> Result<Self> {
        let segments: Vec<&str> = key.split('/').collect();
        let (kind, owner_id, file) = match segments.as_slice() {
            [USERS_PREFIX, owner, RAW_SEGMENT, file] => (KeyKind::Upload, *owner, *file),
            [USERS_PREFIX, owner, THUMBNAIL_SEGMENT, file] => (KeyKind::Thumbnail, *owner, *file),
            [PROBE_PREFIX, owner, file] => (KeyKind::Probe, *owner, *file),
            _ => {
                return Err(BirdtagError::validation(format!(
                    "unrecognized object key layout: {key}"
                )))
            }
        };

        let (id, extension) = match file.rfind('.') {
            Some(0) | None => (file, ""),
            Some(idx) => (&file[..idx], &file[idx..]),
        };
        Self::build(kind, owner_id, id, extension)
    }

    /// Render the key string.
    pub fn key(&self) -> String {
        match self.kind {
            KeyKind::Upload => format!(
                "{USERS_PREFIX}/{}/{RAW_SEGMENT}/{}{}",
                self.owner_id, self.id, self.extension
            ),
            KeyKind::Thumbnail => format!(
                "{USERS_PREFIX}/{}/{THUMBNAIL_SEGMENT}/{}{}",
                self.owner_id, self.id, self.extension
            ),
            KeyKind::Probe => format!(
                "{PROBE_PREFIX}/{}/{}{}",
                self.owner_id, self.id, self.extension
            ),
        }
    }

    /// File name portion of the key (`<id><ext>`).
    pub fn file_name(&self) -> String {
        format!("{}{}", self.id, self.extension)
    }

    pub fn file_type(&self) -> Result<FileType> {
        FileType::classify(&self.file_name())
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

fn validate_segment(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(BirdtagError::validation(format!("{name} is required")));
    }
    if value.contains('/') {
        return Err(BirdtagError::validation(format!(
            "{name} must not contain '/'"
        )));
    }
    Ok(())
}

/// Resolve a stored URL or key to an object key.
///
/// `http(s)://` URLs yield their percent-decoded path, with a leading
/// `objects/` segment stripped. Anything else is taken to be a key already.
pub fn key_from_url(value: &str) -> String {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let segments: Vec<String> = url
                .path_segments()
                .map(|segments| {
                    segments
                        .filter(|s| !s.is_empty())
                        .map(|s| {
                            urlencoding::decode(s)
                                .map(|decoded| decoded.into_owned())
                                .unwrap_or_else(|_| s.to_string())
                        })
                        .collect()
                })
                .unwrap_or_default();
            match segments.split_first() {
                Some((first, rest)) if first == OBJECTS_PATH => rest.join("/"),
                _ => segments.join("/"),
            }
        }
        _ => value.trim_start_matches('/').to_string(),
    }
}

/// Last path segment of a URL or key.
pub fn file_name_of(value: &str) -> String {
    let key = key_from_url(value);
    key.rsplit('/').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_key() {
        let key = ObjectKey::parse("users/alice/raw/abc123.JPG").unwrap();
        assert_eq!(key.kind, KeyKind::Upload);
        assert_eq!(key.owner_id, "alice");
        assert_eq!(key.id, "abc123");
        assert_eq!(key.extension, ".JPG");
        assert_eq!(key.file_type().unwrap(), FileType::Image);
        assert_eq!(key.key(), "users/alice/raw/abc123.JPG");
    }

    #[test]
    fn test_parse_probe_and_thumbnail() {
        let probe = ObjectKey::parse("tmp/bob/job-1.wav").unwrap();
        assert_eq!(probe.kind, KeyKind::Probe);
        assert_eq!(probe.id, "job-1");

        let thumb = ObjectKey::parse("users/bob/thumbnail/x.png").unwrap();
        assert_eq!(thumb.kind, KeyKind::Thumbnail);
        assert_eq!(thumb.owner_id, "bob");
    }

    #[test]
    fn test_parse_rejects_unknown_layout() {
        assert!(ObjectKey::parse("users/alice/abc.jpg").is_err());
        assert!(ObjectKey::parse("other/alice/raw/abc.jpg").is_err());
        assert!(ObjectKey::parse("tmp//abc.jpg").is_err());
        assert!(ObjectKey::parse("tmp/alice/").is_err());
    }

    #[test]
    fn test_build_normalizes_extension() {
        let key = ObjectKey::upload("u1", "id1", "mp4").unwrap();
        assert_eq!(key.key(), "users/u1/raw/id1.mp4");
        assert!(ObjectKey::probe("a/b", "j", ".wav").is_err());
    }

    #[test]
    fn test_key_from_url() {
        assert_eq!(
            key_from_url("https://cdn.example.com/objects/users/u/raw/a.jpg"),
            "users/u/raw/a.jpg"
        );
        assert_eq!(
            key_from_url("https://bucket.s3.amazonaws.com/users/u/raw/a.jpg"),
            "users/u/raw/a.jpg"
        );
        assert_eq!(key_from_url("users/u/raw/a.jpg"), "users/u/raw/a.jpg");
        assert_eq!(file_name_of("http://h/objects/users/u/raw/a.jpg"), "a.jpg");
    }

    #[test]
    fn test_key_from_url_decodes_segments() {
        let key = ObjectKey::upload("alice smith", "x", ".jpg").unwrap().key();

        let mut url = Url::parse("http://localhost:3000").unwrap();
        url.path_segments_mut()
            .unwrap()
            .pop_if_empty()
            .push(OBJECTS_PATH)
            .extend(key.split('/'));
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/objects/users/alice%20smith/raw/x.jpg"
        );

        assert_eq!(key_from_url(url.as_str()), "users/alice smith/raw/x.jpg");
        assert_eq!(
            key_from_url("https://cdn.example.com/objects/users/j%C3%BCrgen/raw/a.png"),
            "users/jürgen/raw/a.png"
        );
        assert_eq!(file_name_of(url.as_str()), "x.jpg");
    }
}
