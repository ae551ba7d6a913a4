//! Reference analyzer.
//!
//! Stands in for real document understanding: explicit markers in text
//! payloads decide outcomes when present, otherwise a single draw from the
//! injected `OutcomeSource` does. Confidence scales with the content kind.

use async_trait::async_trait;
use std::sync::Arc;

use super::{parse_markers, Analysis, AnalysisRequest, Analyzer, AnalyzerError, Markers, OutcomeSource};
use crate::types::{
    Category, Clearance, Condition, ContentKind, CoordinationState, MaintenanceNeed, SignalBundle,
    TimetableState,
};

// ============================================================================
// Recommendation texts
// ============================================================================

const REC_CONDITION_POOR: &str = "Immediate maintenance required before service. Conduct comprehensive system check and address all identified issues.";
const REC_CONDITION_FAIR: &str = "Schedule preventive maintenance within next service window. Monitor performance closely and address minor issues.";
const REC_CONDITION_GOOD: &str = "Continue regular maintenance schedule. Systems operating within normal parameters. Maintain current service intervals.";

const REC_SAFETY_FAILED: &str = "Critical safety issues identified. Train must not enter service until all safety deficiencies are resolved and re-inspection completed.";
const REC_SAFETY_PENDING: &str = "Minor safety items require attention. Complete outstanding safety tasks before next scheduled service.";
const REC_SAFETY_CLEARED: &str = "All safety systems operational and compliant. Maintain regular inspection schedule and continue monitoring safety performance.";

const REC_CREW_MISSING: &str = "Crew assignment required. Verify driver and conductor availability, certification status, and complete crew assignment process.";
const REC_CREW_READY: &str = "Crew assigned and certified. Confirm pre-service briefing completion and verify all personnel are ready for operational duties.";

const REC_OPERATIONS: &str = "Operational parameters confirmed and verified. Proceed with scheduled service as planned. Continue monitoring operational performance and maintain coordination with network control.";
const REC_OPERATIONS_DISRUPTED: &str = "Timetable disruption reported. Confirm revised paths with network control and update service plans before dispatch.";
const REC_ENGINEERING: &str = "Infrastructure systems operational and ready. Continue monitoring engineering systems for optimal performance and maintain preventive maintenance schedules.";
const REC_COORDINATION: &str = "Coordination protocols active and effective. All departments aligned for service operations. Continue maintaining communication channels and coordination procedures.";
const REC_COORDINATION_OPEN: &str = "Coordination items outstanding. Resolve open inter-department actions before confirming service allocation.";
const REC_GENERIC: &str = "Review document content for specific operational requirements. Consider specialized processing for enhanced data extraction and analysis.";

/// Base and span of the pre-multiplier confidence, per category.
fn confidence_band(category: &Category) -> (f64, f64) {
    match category {
        Category::RollingStock | Category::Engineering => (0.8, 0.2),
        Category::Safety | Category::Operations => (0.85, 0.15),
        Category::HumanResources | Category::Coordination => (0.9, 0.1),
        Category::Other(_) => (0.7, 0.3),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Reference `Analyzer` driven by markers and an `OutcomeSource`.
pub struct TemplateAnalyzer {
    outcomes: Arc<dyn OutcomeSource>,
}

impl TemplateAnalyzer {
    pub fn new(outcomes: Arc<dyn OutcomeSource>) -> Self {
        Self { outcomes }
    }

    fn read_markers(request: &AnalysisRequest<'_>) -> Result<Markers, AnalyzerError> {
        if !request.declared_kind.is_textual() {
            return Ok(Markers::default());
        }
        let text = std::str::from_utf8(request.bytes).map_err(|e| {
            AnalyzerError::ExtractionFailure(format!(
                "{} declared as text but is not valid UTF-8: {e}",
                request.file_name
            ))
        })?;
        Ok(parse_markers(text))
    }

    fn confidence(category: &Category, kind: ContentKind, r: f64) -> f64 {
        let (base, span) = confidence_band(category);
        round2((base + r * span) * kind.reliability()).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Analyzer for TemplateAnalyzer {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<Analysis, AnalyzerError> {
        if request.bytes.is_empty() {
            return Err(AnalyzerError::ExtractionFailure(format!(
                "{} is empty",
                request.file_name
            )));
        }

        let markers = Self::read_markers(&request)?;
        let r = self.outcomes.draw();
        let mut bundle =
            SignalBundle::with_confidence(Self::confidence(request.category, request.declared_kind, r));

        let (summary, recommendation) = match request.category {
            Category::RollingStock => {
                let condition = markers.condition.unwrap_or(if r > 0.7 {
                    Condition::Good
                } else if r > 0.4 {
                    Condition::Fair
                } else {
                    Condition::Poor
                });
                let maintenance = markers.maintenance.unwrap_or(if r > 0.8 {
                    MaintenanceNeed::NotRequired
                } else {
                    MaintenanceNeed::Required
                });
                bundle.condition = Some(condition);
                bundle.maintenance = Some(maintenance);
                bundle.notes = Some(format!(
                    "Health Status: {condition}. Maintenance: {maintenance}."
                ));
                let rec = match condition {
                    Condition::Poor => REC_CONDITION_POOR,
                    Condition::Fair => REC_CONDITION_FAIR,
                    Condition::Good => REC_CONDITION_GOOD,
                };
                (format!("Rolling stock condition assessed as {condition}"), rec)
            }
            Category::Safety => {
                let clearance = markers.clearance.unwrap_or(if r > 0.8 {
                    Clearance::Cleared
                } else if r > 0.5 {
                    Clearance::Pending
                } else {
                    Clearance::Failed
                });
                bundle.clearance = Some(clearance);
                bundle.notes = Some(format!("Safety Status: {clearance}."));
                let rec = match clearance {
                    Clearance::Failed => REC_SAFETY_FAILED,
                    Clearance::Pending => REC_SAFETY_PENDING,
                    Clearance::Cleared => REC_SAFETY_CLEARED,
                };
                (format!("Safety clearance assessed as {clearance}"), rec)
            }
            Category::HumanResources => {
                let crew = markers.crew_available.unwrap_or(r > 0.3);
                bundle.crew_available = Some(crew);
                let status = if crew { "Assigned" } else { "Not Assigned" };
                bundle.notes = Some(format!("Crew Status: {status}."));
                let rec = if crew { REC_CREW_READY } else { REC_CREW_MISSING };
                (format!("Crew availability: {status}"), rec)
            }
            Category::Operations => {
                let timetable = markers.timetable.unwrap_or(TimetableState::OnTime);
                bundle.timetable = Some(timetable);
                bundle.notes = Some(format!("Timetable: {timetable}."));
                let rec = if timetable == TimetableState::OnTime {
                    REC_OPERATIONS
                } else {
                    REC_OPERATIONS_DISRUPTED
                };
                (format!("Timetable status {timetable}"), rec)
            }
            Category::Coordination => {
                let coordination = markers
                    .coordination
                    .unwrap_or(CoordinationState::Coordinated);
                bundle.coordination = Some(coordination);
                bundle.notes = Some(format!("Coordination Status: {coordination}."));
                let rec = if coordination == CoordinationState::Coordinated {
                    REC_COORDINATION
                } else {
                    REC_COORDINATION_OPEN
                };
                (format!("Coordination status {coordination}"), rec)
            }
            Category::Engineering => (
                "Engineering documentation reviewed".to_string(),
                REC_ENGINEERING,
            ),
            Category::Other(name) => (format!("{name} document reviewed"), REC_GENERIC),
        };

        Ok(Analysis {
            bundle,
            summary: format!("{summary} from {}", request.file_name),
            recommendation: recommendation.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FixedOutcome;

    fn analyzer(r: f64) -> TemplateAnalyzer {
        TemplateAnalyzer::new(Arc::new(FixedOutcome(r)))
    }

    async fn run(r: f64, category: Category, kind: ContentKind, bytes: &[u8]) -> Result<Analysis, AnalyzerError> {
        analyzer(r)
            .analyze(AnalysisRequest {
                bytes,
                declared_kind: kind,
                category: &category,
                file_name: "doc",
            })
            .await
    }

    #[tokio::test]
    async fn rolling_stock_thresholds() {
        let good = run(0.9, Category::RollingStock, ContentKind::Pdf, b"x").await.unwrap();
        assert_eq!(good.bundle.condition, Some(Condition::Good));
        assert_eq!(good.bundle.maintenance, Some(MaintenanceNeed::NotRequired));
        assert_eq!(good.recommendation, REC_CONDITION_GOOD);

        let fair = run(0.5, Category::RollingStock, ContentKind::Pdf, b"x").await.unwrap();
        assert_eq!(fair.bundle.condition, Some(Condition::Fair));
        assert_eq!(fair.bundle.maintenance, Some(MaintenanceNeed::Required));

        let poor = run(0.1, Category::RollingStock, ContentKind::Pdf, b"x").await.unwrap();
        assert_eq!(poor.bundle.condition, Some(Condition::Poor));
        assert_eq!(poor.recommendation, REC_CONDITION_POOR);
    }

    #[tokio::test]
    async fn output_is_scoped_to_category() {
        let a = run(0.9, Category::Safety, ContentKind::Pdf, b"x").await.unwrap();
        assert_eq!(a.bundle.clearance, Some(Clearance::Cleared));
        assert!(a.bundle.condition.is_none());
        assert!(a.bundle.crew_available.is_none());
        assert!(a.bundle.coordination.is_none());
        assert!(a.bundle.timetable.is_none());
    }

    #[tokio::test]
    async fn confidence_scales_with_kind() {
        let pdf = run(0.0, Category::Safety, ContentKind::Pdf, b"x").await.unwrap();
        assert!((pdf.bundle.confidence - 0.85).abs() < 1e-9);
        let img = run(0.0, Category::Safety, ContentKind::Image, b"x").await.unwrap();
        assert!((img.bundle.confidence - 0.72).abs() < 1e-9);
    }

    #[tokio::test]
    async fn markers_override_draw() {
        let a = run(0.99, Category::Safety, ContentKind::Text, b"Safety: failed inspection\n")
            .await
            .unwrap();
        assert_eq!(a.bundle.clearance, Some(Clearance::Failed));
        assert_eq!(a.recommendation, REC_SAFETY_FAILED);
    }

    #[tokio::test]
    async fn descriptive_marker_values_keep_their_meaning() {
        let a = run(0.0, Category::Safety, ContentKind::Text, b"Clearance: Approved by inspector\n")
            .await
            .unwrap();
        assert_eq!(a.bundle.clearance, Some(Clearance::Cleared));

        let b = run(0.0, Category::RollingStock, ContentKind::Text, b"Health: Good condition\n")
            .await
            .unwrap();
        assert_eq!(b.bundle.condition, Some(Condition::Good));
    }

    #[tokio::test]
    async fn empty_bytes_are_an_extraction_failure() {
        let err = run(0.5, Category::Safety, ContentKind::Pdf, b"").await.unwrap_err();
        assert!(matches!(err, AnalyzerError::ExtractionFailure(_)));
    }

    #[tokio::test]
    async fn invalid_utf8_text_is_an_extraction_failure() {
        let err = run(0.5, Category::Safety, ContentKind::Text, &[0xff, 0xfe, 0x00])
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::ExtractionFailure(_)));
    }

    #[tokio::test]
    async fn engineering_writes_no_decision_fields() {
        let a = run(0.5, Category::Engineering, ContentKind::Pdf, b"x").await.unwrap();
        assert_eq!(a.bundle, SignalBundle::with_confidence(a.bundle.confidence));
        assert_eq!(a.recommendation, REC_ENGINEERING);
    }
}
