//! Fleet readiness reports
//!
//! Read-only summaries over the aggregate store and ledger: current verdict,
//! condition and clearance tallies across the fleet, one line per vehicle,
//! and ingestion activity within the report window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::ledger::{LedgerError, ProcessingLedger};
use crate::merge::{MergeEngine, MergeError};
use crate::types::{
    Clearance, Condition, CoordinationState, ProcessingRecord, ProcessingState, TimetableState,
    VehicleAggregate, VehicleId, Verdict,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Daily,
    Weekly,
    Monthly,
}

impl ReportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Some(Self::Daily),
            "weekly" | "week" => Some(Self::Weekly),
            "monthly" | "month" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn window(self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Weekly => Duration::days(7),
            Self::Monthly => Duration::days(30),
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub ready: usize,
    pub standby: usize,
    pub maintenance: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCounts {
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceCounts {
    pub cleared: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Ledger activity for records created inside the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleLine {
    pub vehicle_id: VehicleId,
    pub verdict: Verdict,
    pub condition: Condition,
    pub clearance: Clearance,
    pub crew_available: bool,
    pub coordination: CoordinationState,
    pub timetable: TimetableState,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_recommendation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    pub kind: ReportKind,
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub vehicles: usize,
    pub verdicts: VerdictCounts,
    pub condition: ConditionCounts,
    pub clearance: ClearanceCounts,
    pub crew_available: usize,
    pub processing: ProcessingSummary,
    pub lines: Vec<VehicleLine>,
}

/// Build a report from already-loaded data.
pub fn build_report(
    kind: ReportKind,
    aggregates: &[VehicleAggregate],
    records: &[ProcessingRecord],
    now: DateTime<Utc>,
) -> FleetReport {
    let window_start = now - kind.window();
    let mut verdicts = VerdictCounts::default();
    let mut condition = ConditionCounts::default();
    let mut clearance = ClearanceCounts::default();
    let mut crew_available = 0;

    let mut lines: Vec<VehicleLine> = aggregates
        .iter()
        .map(|agg| {
            match agg.verdict() {
                Verdict::Ready => verdicts.ready += 1,
                Verdict::Standby => verdicts.standby += 1,
                Verdict::Maintenance => verdicts.maintenance += 1,
            }
            match agg.condition {
                Condition::Good => condition.good += 1,
                Condition::Fair => condition.fair += 1,
                Condition::Poor => condition.poor += 1,
            }
            match agg.clearance {
                Clearance::Cleared => clearance.cleared += 1,
                Clearance::Pending => clearance.pending += 1,
                Clearance::Failed => clearance.failed += 1,
            }
            if agg.crew_available {
                crew_available += 1;
            }
            VehicleLine {
                vehicle_id: agg.vehicle_id.clone(),
                verdict: agg.verdict(),
                condition: agg.condition,
                clearance: agg.clearance,
                crew_available: agg.crew_available,
                coordination: agg.coordination,
                timetable: agg.timetable,
                updated_at: agg.updated_at,
                latest_recommendation: agg.latest_recommendation().map(|e| e.text.clone()),
            }
        })
        .collect();
    lines.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));

    let mut processing = ProcessingSummary::default();
    for record in records.iter().filter(|r| r.created_at >= window_start) {
        match record.state {
            ProcessingState::Pending => processing.pending += 1,
            ProcessingState::Processing => processing.processing += 1,
            ProcessingState::Completed => processing.completed += 1,
            ProcessingState::Failed => processing.failed += 1,
        }
    }

    FleetReport {
        kind,
        generated_at: now,
        window_start,
        vehicles: aggregates.len(),
        verdicts,
        condition,
        clearance,
        crew_available,
        processing,
        lines,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Generate a report from live stores.
pub fn generate(
    kind: ReportKind,
    merge: &MergeEngine,
    ledger: &ProcessingLedger,
) -> Result<FleetReport, ReportError> {
    let aggregates = merge.aggregates(usize::MAX)?;
    let records = ledger.recent(usize::MAX)?;
    Ok(build_report(kind, &aggregates, &records, Utc::now()))
}

impl FleetReport {
    /// Plain-text rendering for the CLI.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Fleet {} report, {} to {}",
            self.kind,
            self.window_start.format("%Y-%m-%d %H:%M"),
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        let _ = writeln!(
            out,
            "Vehicles: {} (ready {}, standby {}, maintenance {})",
            self.vehicles, self.verdicts.ready, self.verdicts.standby, self.verdicts.maintenance
        );
        let _ = writeln!(
            out,
            "Condition: good {}, fair {}, poor {} | Safety: cleared {}, pending {}, failed {} | Crew available: {}",
            self.condition.good,
            self.condition.fair,
            self.condition.poor,
            self.clearance.cleared,
            self.clearance.pending,
            self.clearance.failed,
            self.crew_available
        );
        let _ = writeln!(
            out,
            "Documents in window: {} completed, {} failed, {} pending, {} processing",
            self.processing.completed,
            self.processing.failed,
            self.processing.pending,
            self.processing.processing
        );
        for line in &self.lines {
            let _ = writeln!(
                out,
                "  {:<12} {:<11} condition={:<4} safety={:<7} crew={:<3} coordination={} timetable={}",
                line.vehicle_id.as_str(),
                line.verdict.to_string(),
                line.condition.to_string(),
                line.clearance.to_string(),
                if line.crew_available { "yes" } else { "no" },
                line.coordination,
                line.timetable
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactId;

    fn aggregate(id: &str, condition: Condition, clearance: Clearance) -> VehicleAggregate {
        let mut agg = VehicleAggregate::new(VehicleId::from(id));
        agg.condition = condition;
        agg.clearance = clearance;
        agg.refresh_verdict();
        agg
    }

    #[test]
    fn tallies_current_fleet_state() {
        let aggs = vec![
            aggregate("V2", Condition::Poor, Clearance::Cleared),
            aggregate("V1", Condition::Good, Clearance::Cleared),
            aggregate("V3", Condition::Fair, Clearance::Failed),
        ];
        let report = build_report(ReportKind::Daily, &aggs, &[], Utc::now());
        assert_eq!(report.vehicles, 3);
        assert_eq!(report.verdicts.maintenance, 2);
        assert_eq!(report.verdicts.standby, 1);
        assert_eq!(report.condition, ConditionCounts { good: 1, fair: 1, poor: 1 });
        assert_eq!(report.clearance.cleared, 2);
        let order: Vec<_> = report.lines.iter().map(|l| l.vehicle_id.to_string()).collect();
        assert_eq!(order, vec!["V1", "V2", "V3"]);
    }

    #[test]
    fn processing_summary_respects_window() {
        let now = Utc::now();
        let mut old = ProcessingRecord::pending(ArtifactId::from("old"), VehicleId::from("V1"), 1);
        old.created_at = now - Duration::days(3);
        let fresh = ProcessingRecord::pending(ArtifactId::from("new"), VehicleId::from("V1"), 1);

        let daily = build_report(ReportKind::Daily, &[], &[old.clone(), fresh.clone()], now);
        assert_eq!(daily.processing.pending, 1);
        let weekly = build_report(ReportKind::Weekly, &[], &[old, fresh], now);
        assert_eq!(weekly.processing.pending, 2);
    }

    #[test]
    fn report_kind_parses() {
        assert_eq!(ReportKind::parse("Weekly"), Some(ReportKind::Weekly));
        assert_eq!(ReportKind::parse("yearly"), None);
    }

    #[test]
    fn text_rendering_lists_vehicles() {
        let aggs = vec![aggregate("V1", Condition::Good, Clearance::Cleared)];
        let text = build_report(ReportKind::Daily, &aggs, &[], Utc::now()).render_text();
        assert!(text.contains("Vehicles: 1"));
        assert!(text.contains("V1"));
    }
}
