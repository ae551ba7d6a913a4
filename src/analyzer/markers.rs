//! Explicit `key: value` status markers in plain-text documents.
//!
//! A line such as `Safety: Approved` or `crew = unavailable` states the
//! outcome directly; the reference analyzer prefers these over its draw.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::{
    crew_from_label, Clearance, Condition, CoordinationState, MaintenanceNeed, TimetableState,
};

/// Markers found in a document. Later lines override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markers {
    pub condition: Option<Condition>,
    pub maintenance: Option<MaintenanceNeed>,
    pub clearance: Option<Clearance>,
    pub crew_available: Option<bool>,
    pub timetable: Option<TimetableState>,
    pub coordination: Option<CoordinationState>,
}

impl Markers {
    pub const fn is_empty(&self) -> bool {
        self.condition.is_none()
            && self.maintenance.is_none()
            && self.clearance.is_none()
            && self.crew_available.is_none()
            && self.timetable.is_none()
            && self.coordination.is_none()
    }
}

#[allow(clippy::expect_used)]
fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?im)^\s*(condition|health|maintenance|clearance|safety|crew|timetable|coordination)\s*[:=]\s*(.+?)\s*$",
        )
        .expect("marker pattern compiles")
    })
}

/// Scan `text` for status markers.
pub fn parse_markers(text: &str) -> Markers {
    let mut markers = Markers::default();
    for caps in marker_pattern().captures_iter(text) {
        let key = caps[1].to_ascii_lowercase();
        let value = &caps[2];
        match key.as_str() {
            "condition" | "health" => markers.condition = Some(Condition::from_label(value)),
            "maintenance" => {
                if let Some(m) = MaintenanceNeed::from_label(value) {
                    markers.maintenance = Some(m);
                }
            }
            "clearance" | "safety" => markers.clearance = Some(Clearance::from_label(value)),
            "crew" => {
                if let Some(c) = crew_from_label(value) {
                    markers.crew_available = Some(c);
                }
            }
            "timetable" => {
                if let Some(t) = TimetableState::from_label(value) {
                    markers.timetable = Some(t);
                }
            }
            "coordination" => {
                if let Some(c) = CoordinationState::from_label(value) {
                    markers.coordination = Some(c);
                }
            }
            _ => {}
        }
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_case_markers() {
        let text = "Inspection report\nHealth: Excellent\nMaintenance = not required\nCREW: assigned\n";
        let m = parse_markers(text);
        assert_eq!(m.condition, Some(Condition::Good));
        assert_eq!(m.maintenance, Some(MaintenanceNeed::NotRequired));
        assert_eq!(m.crew_available, Some(true));
        assert!(m.clearance.is_none());
    }

    #[test]
    fn later_marker_wins() {
        let m = parse_markers("safety: pending\nsafety: approved\n");
        assert_eq!(m.clearance, Some(Clearance::Cleared));
    }

    #[test]
    fn prose_without_markers_is_empty() {
        assert!(parse_markers("All systems nominal, see attached sheet.").is_empty());
    }

    #[test]
    fn free_text_marker_values_map_by_keyword() {
        let m = parse_markers("Safety: Passed inspection\nHealth: Excellent overall\n");
        assert_eq!(m.clearance, Some(Clearance::Cleared));
        assert_eq!(m.condition, Some(Condition::Good));

        let m = parse_markers("Clearance: under review by depot\n");
        assert_eq!(m.clearance, Some(Clearance::Pending));
    }

    #[test]
    fn unknown_timetable_label_is_ignored() {
        let m = parse_markers("timetable: whenever\n");
        assert!(m.timetable.is_none());
    }
}
