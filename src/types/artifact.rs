use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque identifier of an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ArtifactId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fleet identifier of a rail vehicle (train set, unit or car).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

impl From<String> for VehicleId {
    fn from(s: String) -> Self {
        Self(s.trim().to_string())
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of an artifact's bytes inside a `ByteStore`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRef(String);

impl StorageRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Category
// ============================================================================

/// Submitting department. Each category owns a disjoint set of aggregate fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Category {
    RollingStock,
    Safety,
    HumanResources,
    Operations,
    Engineering,
    Coordination,
    /// Any department without a dedicated reducer.
    Other(String),
}

impl Category {
    /// Parse a department name. Unrecognized names become `Other`.
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "rolling stock" | "rollingstock" | "mechanical" => Self::RollingStock,
            "safety" => Self::Safety,
            "human resources" | "humanresources" | "hr" | "crew" => Self::HumanResources,
            "operations" | "ops" | "scheduling" => Self::Operations,
            "engineering" => Self::Engineering,
            "coordination" => Self::Coordination,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::RollingStock => "Rolling Stock",
            Self::Safety => "Safety",
            Self::HumanResources => "Human Resources",
            Self::Operations => "Operations",
            Self::Engineering => "Engineering",
            Self::Coordination => "Coordination",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.label().to_string()
    }
}

// ============================================================================
// Content Kind
// ============================================================================

/// Coarse classification of an artifact's declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Pdf,
    Spreadsheet,
    Document,
    Image,
    Video,
    Audio,
    Text,
    Archive,
    Other,
}

impl ContentKind {
    /// Classify a MIME type string by substring.
    pub fn from_mime(mime: &str) -> Self {
        let m = mime.to_ascii_lowercase();
        if m.contains("pdf") {
            Self::Pdf
        } else if m.contains("excel") || m.contains("spreadsheet") || m.contains("csv") {
            Self::Spreadsheet
        } else if m.contains("word") || m.contains("document") {
            Self::Document
        } else if m.starts_with("image") {
            Self::Image
        } else if m.starts_with("video") {
            Self::Video
        } else if m.starts_with("audio") {
            Self::Audio
        } else if m.contains("text") || m.contains("plain") {
            Self::Text
        } else if m.contains("zip") || m.contains("rar") || m.contains("archive") {
            Self::Archive
        } else {
            Self::Other
        }
    }

    /// Guess from a file name extension.
    pub fn guess(file_name: &str) -> Self {
        mime_guess::from_path(file_name)
            .first()
            .map_or(Self::Other, |mime| Self::from_mime(mime.essence_str()))
    }

    /// Accepts either a MIME string or a kind name (`pdf`, `text`, ...).
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "spreadsheet" | "excel" | "csv" => Self::Spreadsheet,
            "document" | "doc" | "docx" => Self::Document,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "text" | "txt" => Self::Text,
            "archive" => Self::Archive,
            other => Self::from_mime(other),
        }
    }

    /// Confidence multiplier applied by analyzers for this kind of source.
    pub const fn reliability(self) -> f64 {
        match self {
            Self::Pdf | Self::Spreadsheet => 1.0,
            Self::Text => 0.95,
            Self::Image | Self::Video => 0.85,
            Self::Document | Self::Audio | Self::Archive | Self::Other => 0.8,
        }
    }

    pub const fn is_textual(self) -> bool {
        matches!(self, Self::Text)
    }
}

// ============================================================================
// Artifact
// ============================================================================

/// One uploaded document, tied to one vehicle and one category. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub category: Category,
    pub vehicle_id: VehicleId,
    pub file_name: String,
    pub declared_kind: ContentKind,
    pub storage_ref: StorageRef,
    /// md5 hex digest of the stored bytes
    pub content_digest: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// md5 hex digest used for `Artifact::content_digest`.
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}
