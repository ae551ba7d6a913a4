//! Normalized status labels and the analyzer output bundle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mechanical condition reported by Rolling Stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub const ALL: [Self; 3] = [Self::Good, Self::Fair, Self::Poor];

    /// Map a free-text label by keyword, so "Good condition" is `Good`.
    /// Anything unrecognized is treated as `Poor`.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_ascii_lowercase();
        if contains_any(&lower, &["good", "excellent", "optimal"]) {
            Self::Good
        } else if contains_any(&lower, &["fair", "average", "acceptable"]) {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "Good"),
            Self::Fair => write!(f, "Fair"),
            Self::Poor => write!(f, "Poor"),
        }
    }
}

/// Safety clearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clearance {
    Cleared,
    Pending,
    Failed,
}

impl Clearance {
    pub const ALL: [Self; 3] = [Self::Cleared, Self::Pending, Self::Failed];

    /// Map a free-text label by keyword. Cleared keywords win over pending
    /// ones; anything unrecognized is treated as `Failed`.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_ascii_lowercase();
        if contains_any(&lower, &["cleared", "passed", "approved"]) {
            Self::Cleared
        } else if contains_any(&lower, &["pending", "review", "processing"]) {
            Self::Pending
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for Clearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cleared => write!(f, "Cleared"),
            Self::Pending => write!(f, "Pending"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Timetable adherence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimetableState {
    #[serde(rename = "On-Time")]
    OnTime,
    Delayed,
    Cancelled,
}

impl TimetableState {
    /// Map a free-text label. `None` when the label is not a timetable state.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "on-time" | "ontime" | "scheduled" => Some(Self::OnTime),
            "delayed" | "late" => Some(Self::Delayed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TimetableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnTime => write!(f, "On-Time"),
            Self::Delayed => write!(f, "Delayed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Cross-department coordination status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinationState {
    Coordinated,
    Pending,
    Issues,
}

impl CoordinationState {
    pub const ALL: [Self; 3] = [Self::Coordinated, Self::Pending, Self::Issues];

    /// Map a free-text label. `None` when the label is not a coordination state.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "coordinated" | "aligned" => Some(Self::Coordinated),
            "pending" => Some(Self::Pending),
            "issues" | "issue" | "conflict" => Some(Self::Issues),
            _ => None,
        }
    }
}

impl fmt::Display for CoordinationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinated => write!(f, "Coordinated"),
            Self::Pending => write!(f, "Pending"),
            Self::Issues => write!(f, "Issues"),
        }
    }
}

/// Whether Rolling Stock flagged maintenance work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceNeed {
    Required,
    #[serde(rename = "Not Required")]
    NotRequired,
}

impl MaintenanceNeed {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "required" | "yes" | "due" => Some(Self::Required),
            "not required" | "not-required" | "no" | "none" => Some(Self::NotRequired),
            _ => None,
        }
    }
}

impl fmt::Display for MaintenanceNeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "Required"),
            Self::NotRequired => write!(f, "Not Required"),
        }
    }
}

/// Parse a yes/no style crew availability label.
pub fn crew_from_label(label: &str) -> Option<bool> {
    match label.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "available" | "assigned" => Some(true),
        "no" | "false" | "unavailable" | "unassigned" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Signal Bundle
// ============================================================================

/// Structured output of analyzing one artifact.
///
/// Absent fields mean "no information", never a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<MaintenanceNeed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearance: Option<Clearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crew_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timetable: Option<TimetableState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordination: Option<CoordinationState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Advisory only; never gates the merge.
    pub confidence: f64,
}

impl SignalBundle {
    pub fn with_confidence(confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            ..Self::default()
        }
    }
}
