use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Three-state patch value for partial updates that survives serialization round-trips.
/// Unlike `Option<Option<T>>`, each variant has a distinct wire representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Patch<T> {
    /// Field was not included in the request (no change).
    #[default]
    Absent,
    /// Field was explicitly set to null (clear it).
    Null,
    /// Field was set to a new value.
    Value(T),
}

impl<T> From<Option<Option<T>>> for Patch<T> {
    fn from(v: Option<Option<T>>) -> Self {
        match v {
            None => Patch::Absent,
            Some(None) => Patch::Null,
            Some(Some(v)) => Patch::Value(v),
        }
    }
}

impl Patch<String> {
    /// Convert to the `Option<Option<&str>>` form that storage operations expect.
    pub fn as_deref(&self) -> Option<Option<&str>> {
        match self {
            Patch::Absent => None,
            Patch::Null => Some(None),
            Patch::Value(v) => Some(Some(v.as_str())),
        }
    }
}

/// Classification of a file derived from its MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Audio,
    Binary,
    Document,
    Image,
    Video,
}

impl FileType {
    /// Derive a file type classification from a MIME type string.
    pub fn from_mime(mime_type: &str) -> Self {
        let (primary, sub) = mime_type.split_once('/').unwrap_or((mime_type, ""));
        match primary {
            "audio" => FileType::Audio,
            "image" => FileType::Image,
            "video" => FileType::Video,
            "text" => FileType::Document,
            "application" => match sub {
                "pdf"
                | "msword"
                | "rtf"
                | "vnd.openxmlformats-officedocument.wordprocessingml.document"
                | "vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "vnd.openxmlformats-officedocument.presentationml.presentation"
                | "vnd.ms-excel"
                | "vnd.ms-powerpoint" => FileType::Document,
                _ => FileType::Binary,
            },
            _ => FileType::Binary,
        }
    }
}

/// MIME type for an uploaded filename, decided by its extension alone.
///
/// Office, archive and common image formats use a fixed table; anything else
/// falls back to `mime_guess` and finally to `application/octet-stream`.
pub fn mime_type_for(filename: &str) -> String {
    let Some(ext) = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    else {
        return DEFAULT_MIME_TYPE.to_string();
    };

    let known = match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "zip" => "application/zip",
        "rar" => "application/x-rar-compressed",
        _ => {
            return mime_guess::from_ext(&ext)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        }
    };
    known.to_string()
}

/// A folder record stored in redb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub parent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FolderRecord {
    pub fn new(name: &str, owner: &str, parent: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
            parent: parent.map(str::to_string),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A file record stored in redb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub folder: Option<String>,
    pub blob_key: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub file_type: FileType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub share_token: Option<String>,
}

impl FileRecord {
    /// Build a new active, unshared record. The MIME type comes from `name`.
    pub fn new(
        name: &str,
        owner: &str,
        folder: Option<&str>,
        blob_key: &str,
        byte_size: u64,
    ) -> Self {
        let now = Utc::now();
        let mime_type = mime_type_for(name);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
            folder: folder.map(str::to_string),
            blob_key: blob_key.to_string(),
            byte_size,
            file_type: FileType::from_mime(&mime_type),
            mime_type,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            share_token: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_shared(&self) -> bool {
        self.share_token.is_some()
    }
}

/// Per-user storage accounting. `used_space` is a cache of the sum of the
/// user's non-deleted file sizes and is overwritten on every recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStorage {
    pub user_id: String,
    pub used_space: u64,
    pub total_space: u64,
    pub updated_at: DateTime<Utc>,
}

impl UserStorage {
    pub fn new(user_id: &str, total_space: u64) -> Self {
        Self {
            user_id: user_id.to_string(),
            used_space: 0,
            total_space,
            updated_at: Utc::now(),
        }
    }

    /// Admission check against the stored usage.
    pub fn has_space_for(&self, incoming: u64) -> bool {
        self.used_space
            .checked_add(incoming)
            .is_some_and(|total| total <= self.total_space)
    }

    pub fn available(&self) -> u64 {
        self.total_space.saturating_sub(self.used_space)
    }

    pub fn usage_percent(&self) -> f64 {
        if self.total_space == 0 {
            return 0.0;
        }
        self.used_space as f64 / self.total_space as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_fixed_table() {
        assert_eq!(mime_type_for("report.PDF"), "application/pdf");
        assert_eq!(mime_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_type_for("archive.rar"), "application/x-rar-compressed");
        assert_eq!(
            mime_type_for("deck.pptx"),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        );
    }

    #[test]
    fn mime_defaults_to_octet_stream() {
        assert_eq!(mime_type_for("README"), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_for("data.zzunknownzz"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn admission_boundary() {
        let mut storage = UserStorage::new("u", 1000);
        storage.used_space = 600;
        assert!(storage.has_space_for(400));
        assert!(!storage.has_space_for(401));
        assert!(!storage.has_space_for(u64::MAX));
        assert_eq!(storage.available(), 400);
    }

    #[test]
    fn usage_percent_guards_zero_total() {
        let storage = UserStorage::new("u", 0);
        assert_eq!(storage.usage_percent(), 0.0);

        let mut storage = UserStorage::new("u", 200);
        storage.used_space = 50;
        assert_eq!(storage.usage_percent(), 25.0);
    }

    #[test]
    fn new_file_is_unshared_and_typed() {
        let file = FileRecord::new("cat.png", "alice", None, "k.png", 10);
        assert!(!file.is_shared());
        assert!(!file.is_deleted());
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.file_type, FileType::Image);
    }
}
