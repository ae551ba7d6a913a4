//! Category reducers.
//!
//! Each category writes only the aggregate fields it owns, and only the ones
//! its bundle actually carries. Later writes replace earlier ones.

use crate::types::{Category, SignalBundle, VehicleAggregate};

/// Fold `bundle` into `aggregate`. Returns the names of the fields written.
pub fn apply(
    aggregate: &mut VehicleAggregate,
    category: &Category,
    bundle: &SignalBundle,
) -> Vec<&'static str> {
    let mut written = Vec::new();
    match category {
        Category::RollingStock => {
            if let Some(condition) = bundle.condition {
                aggregate.condition = condition;
                written.push("condition");
            }
        }
        Category::Safety => {
            if let Some(clearance) = bundle.clearance {
                aggregate.clearance = clearance;
                written.push("clearance");
            }
        }
        Category::HumanResources => {
            if let Some(crew) = bundle.crew_available {
                aggregate.crew_available = crew;
                written.push("crew_available");
            }
        }
        Category::Operations => {
            if let Some(timetable) = bundle.timetable {
                aggregate.timetable = timetable;
                written.push("timetable");
            }
        }
        Category::Coordination => {
            if let Some(coordination) = bundle.coordination {
                aggregate.coordination = coordination;
                written.push("coordination");
            }
        }
        // recorded in the log only
        Category::Engineering | Category::Other(_) => {}
    }
    written
}

/// Log line for one merge: `[Category] notes Recommendations: text`.
pub fn compose_note(category: &Category, bundle: &SignalBundle, recommendation: &str) -> String {
    let mut note = format!("[{category}]");
    if let Some(notes) = bundle.notes.as_deref().filter(|n| !n.is_empty()) {
        note.push(' ');
        note.push_str(notes);
    }
    if !recommendation.is_empty() {
        note.push_str(" Recommendations: ");
        note.push_str(recommendation);
    }
    note
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Clearance, Condition, CoordinationState, VehicleId};

    fn full_bundle() -> SignalBundle {
        SignalBundle {
            condition: Some(Condition::Poor),
            clearance: Some(Clearance::Cleared),
            crew_available: Some(true),
            coordination: Some(CoordinationState::Issues),
            ..SignalBundle::with_confidence(0.9)
        }
    }

    #[test]
    fn safety_touches_only_clearance() {
        let mut agg = VehicleAggregate::new(VehicleId::from("V1"));
        let before = agg.clone();
        let written = apply(&mut agg, &Category::Safety, &full_bundle());
        assert_eq!(written, vec!["clearance"]);
        assert_eq!(agg.clearance, Clearance::Cleared);
        assert_eq!(agg.condition, before.condition);
        assert_eq!(agg.crew_available, before.crew_available);
        assert_eq!(agg.coordination, before.coordination);
        assert_eq!(agg.timetable, before.timetable);
    }

    #[test]
    fn omitted_field_is_left_alone() {
        let mut agg = VehicleAggregate::new(VehicleId::from("V1"));
        agg.condition = Condition::Good;
        let written = apply(&mut agg, &Category::RollingStock, &SignalBundle::with_confidence(0.5));
        assert!(written.is_empty());
        assert_eq!(agg.condition, Condition::Good);
    }

    #[test]
    fn engineering_writes_nothing() {
        let mut agg = VehicleAggregate::new(VehicleId::from("V1"));
        let before = agg.clone();
        assert!(apply(&mut agg, &Category::Engineering, &full_bundle()).is_empty());
        assert_eq!(agg, before);
    }

    #[test]
    fn note_includes_category_and_recommendation() {
        let bundle = SignalBundle {
            notes: Some("Health Status: Good. Maintenance: Required.".into()),
            ..SignalBundle::with_confidence(0.9)
        };
        assert_eq!(
            compose_note(&Category::RollingStock, &bundle, "Keep going."),
            "[Rolling Stock] Health Status: Good. Maintenance: Required. Recommendations: Keep going."
        );
    }
}
