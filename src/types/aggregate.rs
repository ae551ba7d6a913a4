//! Per-vehicle merged status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ArtifactId, Category, Clearance, Condition, CoordinationState, TimetableState, VehicleId};
use crate::config::defaults::DEFAULT_YARD_POSITION;

/// Service verdict derived from the decision inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Ready,
    Standby,
    Maintenance,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Standby => write!(f, "Standby"),
            Self::Maintenance => write!(f, "Maintenance"),
        }
    }
}

/// The four aggregate fields that feed the decision function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessGates {
    pub condition: Condition,
    pub clearance: Clearance,
    pub crew_available: bool,
    pub coordination: CoordinationState,
}

/// One entry of a vehicle's rolling recommendation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub category: Category,
    pub artifact_id: ArtifactId,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

/// Merged current-best-known status for one vehicle.
///
/// `verdict` is private: it can only be recomputed from the other fields via
/// [`VehicleAggregate::refresh_verdict`], never assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleAggregate {
    pub vehicle_id: VehicleId,
    pub condition: Condition,
    pub clearance: Clearance,
    pub timetable: TimetableState,
    pub crew_available: bool,
    pub yard_position: String,
    pub coordination: CoordinationState,
    pub recommendations: Vec<RecommendationEntry>,
    verdict: Verdict,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VehicleAggregate {
    /// Fresh aggregate with the documented defaults.
    pub fn new(vehicle_id: VehicleId) -> Self {
        let now = Utc::now();
        let mut aggregate = Self {
            vehicle_id,
            condition: Condition::Fair,
            clearance: Clearance::Pending,
            timetable: TimetableState::OnTime,
            crew_available: false,
            yard_position: DEFAULT_YARD_POSITION.to_string(),
            coordination: CoordinationState::Pending,
            recommendations: Vec::new(),
            verdict: Verdict::Standby,
            created_at: now,
            updated_at: now,
        };
        aggregate.refresh_verdict();
        aggregate
    }

    pub const fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub const fn gates(&self) -> ReadinessGates {
        ReadinessGates {
            condition: self.condition,
            clearance: self.clearance,
            crew_available: self.crew_available,
            coordination: self.coordination,
        }
    }

    /// Recompute the verdict from the current fields.
    pub fn refresh_verdict(&mut self) -> Verdict {
        self.verdict = crate::merge::decide(self.gates());
        self.verdict
    }

    /// Append a recommendation, dropping the oldest entries beyond `cap`.
    pub fn push_recommendation(&mut self, entry: RecommendationEntry, cap: usize) {
        self.recommendations.push(entry);
        if self.recommendations.len() > cap {
            let excess = self.recommendations.len() - cap;
            self.recommendations.drain(..excess);
        }
    }

    /// Most recent recommendation, if any.
    pub fn latest_recommendation(&self) -> Option<&RecommendationEntry> {
        self.recommendations.last()
    }
}
