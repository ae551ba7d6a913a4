//! One artifact's run: ledger → fetch → analyze → merge → ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::analyzer::{Analysis, AnalysisRequest, Analyzer};
use crate::error::{FailureCode, PipelineError};
use crate::ledger::{Completion, LedgerError, ProcessingLedger};
use crate::merge::{MergeEngine, MergeInput};
use crate::storage::{BlobError, ByteStore, PersistenceLayer};
use crate::types::{Artifact, ArtifactId, ProcessingState, VehicleId, Verdict};

/// How a `process` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Merged and recorded as `completed`.
    Completed {
        vehicle_id: VehicleId,
        attempt: u32,
        verdict: Verdict,
    },
    /// Recorded as `failed`.
    Failed { code: FailureCode, reason: String },
    /// Latest record was not `pending` (duplicate delivery). Nothing written.
    Skipped { state: ProcessingState },
}

/// A run that made it through the merge.
struct Merged {
    artifact: Artifact,
    analysis: Analysis,
    snapshot: String,
    verdict: Verdict,
}

#[derive(Default)]
struct RunCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
}

/// Coordinator statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} completed, {} failed, {} skipped, {} errors",
            self.completed, self.failed, self.skipped, self.errors
        )
    }
}

#[derive(Clone)]
pub struct PipelineCoordinator {
    store: Arc<dyn PersistenceLayer>,
    blobs: Arc<dyn ByteStore>,
    analyzer: Arc<dyn Analyzer>,
    ledger: ProcessingLedger,
    merge: MergeEngine,
    run_timeout: Duration,
    counters: Arc<RunCounters>,
}

impl PipelineCoordinator {
    pub fn new(
        store: Arc<dyn PersistenceLayer>,
        blobs: Arc<dyn ByteStore>,
        analyzer: Arc<dyn Analyzer>,
        ledger: ProcessingLedger,
        merge: MergeEngine,
        run_timeout: Duration,
    ) -> Self {
        Self {
            store,
            blobs,
            analyzer,
            ledger,
            merge,
            run_timeout,
            counters: Arc::new(RunCounters::default()),
        }
    }

    /// Drive one artifact through the pipeline.
    ///
    /// Every failure after the record is claimed ends as a `failed` ledger
    /// entry and `Ok(RunOutcome::Failed)`. `Err` means the record was missing
    /// or the ledger itself could not be written.
    pub async fn process(&self, artifact_id: &ArtifactId) -> Result<RunOutcome, PipelineError> {
        let record = match self.ledger.begin(artifact_id).await {
            Ok(record) => record,
            Err(LedgerError::NotFound(id)) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                return Err(PipelineError::RecordNotFound(id));
            }
            Err(LedgerError::IllegalTransition { from, .. }) => {
                debug!(artifact = %artifact_id, state = %from, "Record not pending, skipping run");
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                return Ok(RunOutcome::Skipped { state: from });
            }
            Err(LedgerError::Storage(e)) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                return Err(PipelineError::InfrastructureFault(e.to_string()));
            }
        };

        debug!(artifact = %artifact_id, attempt = record.attempt, "Run started");

        match self.run(artifact_id).await {
            Ok(Merged {
                artifact,
                analysis,
                snapshot,
                verdict,
            }) => {
                let completion = Completion {
                    snapshot,
                    summary: analysis.summary,
                    recommendation: analysis.recommendation,
                };
                if let Err(e) = self.ledger.complete(artifact_id, completion).await {
                    // merged but not recorded; the reaper will fail the record
                    error!(artifact = %artifact_id, error = %e, "Failed to record completion");
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    return Err(PipelineError::InfrastructureFault(e.to_string()));
                }
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                info!(
                    artifact = %artifact_id,
                    vehicle = %artifact.vehicle_id,
                    category = %artifact.category,
                    attempt = record.attempt,
                    confidence = analysis.bundle.confidence,
                    %verdict,
                    "Artifact processed"
                );
                Ok(RunOutcome::Completed {
                    vehicle_id: artifact.vehicle_id,
                    attempt: record.attempt,
                    verdict,
                })
            }
            Err(err) => {
                let code = err
                    .failure_code()
                    .unwrap_or(FailureCode::InfrastructureFault);
                let reason = err.to_string();
                warn!(artifact = %artifact_id, attempt = record.attempt, %code, %reason, "Run failed");
                if let Err(e) = self.ledger.fail(artifact_id, code, reason.clone()).await {
                    error!(artifact = %artifact_id, error = %e, "Failed to record failure");
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    return Err(PipelineError::InfrastructureFault(e.to_string()));
                }
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Ok(RunOutcome::Failed { code, reason })
            }
        }
    }

    /// Fetch and analyze under the timeout, then merge.
    async fn run(&self, artifact_id: &ArtifactId) -> Result<Merged, PipelineError> {
        let (artifact, analysis) = tokio::time::timeout(self.run_timeout, self.fetch_and_analyze(artifact_id))
            .await
            .map_err(|_| PipelineError::TimedOut {
                stage: "fetch and analysis",
                after: self.run_timeout,
            })??;

        // must precede the merge: an unrecordable run leaves the aggregate untouched
        let snapshot = serde_json::to_string(&analysis.bundle).map_err(|e| {
            PipelineError::InfrastructureFault(format!("snapshot serialization: {e}"))
        })?;

        let aggregate = self
            .merge
            .merge(MergeInput {
                vehicle_id: &artifact.vehicle_id,
                category: &artifact.category,
                artifact_id: &artifact.id,
                bundle: &analysis.bundle,
                recommendation: &analysis.recommendation,
            })
            .await
            .map_err(|e| PipelineError::InfrastructureFault(e.to_string()))?;

        Ok(Merged {
            verdict: aggregate.verdict(),
            artifact,
            analysis,
            snapshot,
        })
    }

    async fn fetch_and_analyze(
        &self,
        artifact_id: &ArtifactId,
    ) -> Result<(Artifact, Analysis), PipelineError> {
        let artifact = self
            .store
            .get_artifact(artifact_id)
            .map_err(|e| PipelineError::InfrastructureFault(e.to_string()))?
            .ok_or_else(|| PipelineError::ArtifactUnavailable {
                artifact: artifact_id.clone(),
                reason: "artifact metadata missing".to_string(),
            })?;

        let bytes = self
            .blobs
            .get(&artifact.storage_ref)
            .await
            .map_err(|e| PipelineError::ArtifactUnavailable {
                artifact: artifact_id.clone(),
                reason: match e {
                    BlobError::NotFound(r) => format!("no bytes at {r}"),
                    BlobError::Io(io) => io.to_string(),
                },
            })?;

        let analysis = self
            .analyzer
            .analyze(AnalysisRequest {
                bytes: &bytes,
                declared_kind: artifact.declared_kind,
                category: &artifact.category,
                file_name: &artifact.file_name,
            })
            .await
            .map_err(|e| PipelineError::ExtractionFailure {
                artifact: artifact_id.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            artifact = %artifact_id,
            analyzer = self.analyzer.name(),
            bytes = bytes.len(),
            "Analysis finished"
        );
        Ok((artifact, analysis))
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}
