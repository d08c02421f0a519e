//! Document model shared by the store, the session and the surfaces

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Body seeded into a document created with "new document"
pub const BLANK_DOCUMENT: &str = "<!DOCTYPE html>
<html>
<head>
<meta charset=\"utf-8\">
<title></title>
</head>
<body>
</body>
</html>
";

/// A named markup document as held by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub content: String,
}

impl Document {
    /// Create a document after normalising its filename
    pub fn new(filename: &str, content: impl Into<String>) -> Result<Self> {
        Ok(Self {
            filename: normalize_filename(filename)?,
            content: content.into(),
        })
    }
}

/// Document content together with its revision history, as returned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub filename: String,
    pub content: String,
    pub versions: Vec<DocumentVersion>,
}

/// One row of the store's document listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<FixedOffset>,
}

/// One committed revision of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub hash: String,
    pub modified: DateTime<FixedOffset>,
    #[serde(default)]
    pub comment: String,
}

/// Payload of a single publish request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub filename: String,
    pub comment: String,
    pub body: String,
}

/// Normalise a document name the way the store does before touching disk.
///
/// Leading slashes and empty or `.` segments are dropped. Names that would
/// climb out of the document root are rejected rather than cleaned.
pub fn normalize_filename(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.contains('\\') || trimmed.contains('\0') {
        return Err(FolioError::invalid_filename(raw));
    }

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(FolioError::invalid_filename(raw)),
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(FolioError::invalid_filename(raw));
    }

    Ok(segments.join("/"))
}

/// Format a byte count for listing tables
pub fn human_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", size, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_filename() {
        assert_eq!(normalize_filename("index.html").unwrap(), "index.html");
        assert_eq!(normalize_filename("/blog/post.html").unwrap(), "blog/post.html");
        assert_eq!(normalize_filename(" ./a//b.html ").unwrap(), "a/b.html");
    }

    #[test]
    fn test_normalize_filename_rejects_escapes() {
        assert!(normalize_filename("").is_err());
        assert!(normalize_filename("/").is_err());
        assert!(normalize_filename("../secret").is_err());
        assert!(normalize_filename("a/../../b").is_err());
        assert!(normalize_filename("a\\b.html").is_err());
    }

    #[test]
    fn test_document_normalizes_filename() {
        let doc = Document::new("/foo.html", BLANK_DOCUMENT).unwrap();
        assert_eq!(doc.filename, "foo.html");
        assert_eq!(doc.content, BLANK_DOCUMENT);
        assert!(Document::new("../foo.html", "").is_err());
    }

    #[test]
    fn test_listing_entry_from_store_json() {
        let json = r#"{"name":"a.html","size":120,"modified":"2016-03-01T10:20:30.123456789-05:00"}"#;
        let entry: ListingEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name, "a.html");
        assert_eq!(entry.size, 120);
        assert_eq!(entry.modified.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }
}
