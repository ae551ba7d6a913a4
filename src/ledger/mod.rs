//! Processing ledger
//!
//! Per-artifact state machine over `ProcessingRecord`s:
//!
//! ```text
//! pending ──► processing ──► completed
//!                  │
//!                  └───────► failed
//! ```
//!
//! Terminal records never move again; a re-run appends a new `pending`
//! attempt. Every mutation takes the artifact's async lock, reloads the latest
//! record, checks the edge, then writes the whole record back, so two callers
//! racing on the same artifact cannot both claim it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::FailureCode;
use crate::locks::KeyedMutex;
use crate::storage::{PersistenceError, PersistenceLayer};
use crate::types::{Artifact, ArtifactId, ProcessingRecord, ProcessingState, VehicleId};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("no processing record for artifact {0}")]
    NotFound(ArtifactId),

    #[error("illegal transition {from} -> {to} for artifact {artifact}")]
    IllegalTransition {
        artifact: ArtifactId,
        from: ProcessingState,
        to: ProcessingState,
    },

    #[error(transparent)]
    Storage(#[from] PersistenceError),
}

/// Outputs of a successful run written with the `completed` transition.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub snapshot: String,
    pub summary: String,
    pub recommendation: String,
}

#[derive(Clone)]
pub struct ProcessingLedger {
    store: Arc<dyn PersistenceLayer>,
    locks: KeyedMutex,
}

impl ProcessingLedger {
    pub fn new(store: Arc<dyn PersistenceLayer>) -> Self {
        Self {
            store,
            locks: KeyedMutex::new(),
        }
    }

    /// Register a freshly uploaded artifact with its first `pending` attempt.
    pub async fn open(&self, artifact: &Artifact) -> Result<ProcessingRecord, LedgerError> {
        let _guard = self.locks.lock(artifact.id.as_str()).await;
        let record = ProcessingRecord::pending(artifact.id.clone(), artifact.vehicle_id.clone(), 1);
        self.store.register_upload(artifact, &record)?;
        debug!(artifact = %artifact.id, vehicle = %artifact.vehicle_id, "Ledger opened");
        Ok(record)
    }

    /// Append the next `pending` attempt. Only allowed from a terminal record.
    pub async fn reopen(&self, artifact: &ArtifactId) -> Result<ProcessingRecord, LedgerError> {
        let _guard = self.locks.lock(artifact.as_str()).await;
        let latest = self.require_latest(artifact)?;
        if !latest.state.is_terminal() {
            return Err(LedgerError::IllegalTransition {
                artifact: artifact.clone(),
                from: latest.state,
                to: ProcessingState::Pending,
            });
        }
        let record =
            ProcessingRecord::pending(artifact.clone(), latest.vehicle_id, latest.attempt + 1);
        self.store.put_record(&record)?;
        info!(artifact = %artifact, attempt = record.attempt, "Ledger reopened for re-run");
        Ok(record)
    }

    /// pending → processing
    pub async fn begin(&self, artifact: &ArtifactId) -> Result<ProcessingRecord, LedgerError> {
        self.transition(artifact, ProcessingState::Processing, |_| {})
            .await
    }

    /// processing → completed, storing the run outputs in the same write.
    pub async fn complete(
        &self,
        artifact: &ArtifactId,
        completion: Completion,
    ) -> Result<ProcessingRecord, LedgerError> {
        self.transition(artifact, ProcessingState::Completed, move |record| {
            record.snapshot = Some(completion.snapshot);
            record.summary = Some(completion.summary);
            record.recommendation = Some(completion.recommendation);
        })
        .await
    }

    /// processing → failed with a failure summary.
    pub async fn fail(
        &self,
        artifact: &ArtifactId,
        code: FailureCode,
        reason: impl Into<String>,
    ) -> Result<ProcessingRecord, LedgerError> {
        let reason = reason.into();
        self.transition(artifact, ProcessingState::Failed, move |record| {
            record.failure_code = Some(code);
            record.failure_reason = Some(reason);
        })
        .await
    }

    async fn transition(
        &self,
        artifact: &ArtifactId,
        next: ProcessingState,
        apply: impl FnOnce(&mut ProcessingRecord),
    ) -> Result<ProcessingRecord, LedgerError> {
        let _guard = self.locks.lock(artifact.as_str()).await;
        let mut record = self.require_latest(artifact)?;
        record
            .advance(next)
            .map_err(|(from, to)| LedgerError::IllegalTransition {
                artifact: artifact.clone(),
                from,
                to,
            })?;
        apply(&mut record);
        self.store.put_record(&record)?;
        debug!(artifact = %artifact, attempt = record.attempt, state = %next, "Ledger transition");
        Ok(record)
    }

    fn require_latest(&self, artifact: &ArtifactId) -> Result<ProcessingRecord, LedgerError> {
        self.store
            .latest_record(artifact)?
            .ok_or_else(|| LedgerError::NotFound(artifact.clone()))
    }

    // ========================================================================
    // Readers
    // ========================================================================

    pub fn latest(&self, artifact: &ArtifactId) -> Result<Option<ProcessingRecord>, LedgerError> {
        Ok(self.store.latest_record(artifact)?)
    }

    /// All attempts, oldest first.
    pub fn history(&self, artifact: &ArtifactId) -> Result<Vec<ProcessingRecord>, LedgerError> {
        Ok(self.store.record_history(artifact)?)
    }

    /// Records for one vehicle, most recently updated first.
    pub fn for_vehicle(
        &self,
        vehicle: &VehicleId,
        limit: usize,
    ) -> Result<Vec<ProcessingRecord>, LedgerError> {
        let mut records: Vec<_> = self
            .store
            .list_records()?
            .into_iter()
            .filter(|r| &r.vehicle_id == vehicle)
            .collect();
        sort_recent_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    /// Records across the fleet, most recently updated first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ProcessingRecord>, LedgerError> {
        let mut records = self.store.list_records()?;
        sort_recent_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    /// Latest attempt of every artifact.
    pub fn latest_all(&self) -> Result<Vec<ProcessingRecord>, LedgerError> {
        let mut latest: HashMap<ArtifactId, ProcessingRecord> = HashMap::new();
        for record in self.store.list_records()? {
            match latest.get(&record.artifact_id) {
                Some(existing) if existing.attempt >= record.attempt => {}
                _ => {
                    latest.insert(record.artifact_id.clone(), record);
                }
            }
        }
        let mut records: Vec<_> = latest.into_values().collect();
        sort_recent_first(&mut records);
        Ok(records)
    }

    /// Artifacts whose latest attempt is in `state`.
    pub fn in_state(&self, state: ProcessingState) -> Result<Vec<ProcessingRecord>, LedgerError> {
        Ok(self
            .latest_all()?
            .into_iter()
            .filter(|r| r.state == state)
            .collect())
    }

    /// Count of artifacts per latest state.
    pub fn state_counts(&self) -> Result<HashMap<ProcessingState, usize>, LedgerError> {
        let mut counts: HashMap<ProcessingState, usize> =
            ProcessingState::ALL.iter().map(|s| (*s, 0)).collect();
        for record in self.latest_all()? {
            *counts.entry(record.state).or_default() += 1;
        }
        Ok(counts)
    }

    /// Fail every `processing` record that has not moved for `older_than`.
    ///
    /// Each candidate is re-checked under its lock, so a run that completes
    /// during the sweep is left alone.
    pub async fn reap_stuck(
        &self,
        older_than: Duration,
    ) -> Result<Vec<ProcessingRecord>, LedgerError> {
        let mut reaped = Vec::new();

        for candidate in self.in_state(ProcessingState::Processing)? {
            let _guard = self.locks.lock(candidate.artifact_id.as_str()).await;
            let Some(mut record) = self.store.latest_record(&candidate.artifact_id)? else {
                continue;
            };
            let cutoff = chrono::Duration::from_std(older_than)
                .ok()
                .and_then(|age| Utc::now().checked_sub_signed(age))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            if record.state != ProcessingState::Processing || record.updated_at > cutoff {
                continue;
            }
            if let Err((from, to)) = record.advance(ProcessingState::Failed) {
                warn!(artifact = %record.artifact_id, %from, %to, "Reaper skipped record");
                continue;
            }
            record.failure_code = Some(FailureCode::Abandoned);
            record.failure_reason = Some(format!(
                "abandoned: no progress for over {}s",
                older_than.as_secs()
            ));
            self.store.put_record(&record)?;
            warn!(
                artifact = %record.artifact_id,
                vehicle = %record.vehicle_id,
                attempt = record.attempt,
                "Reaped stuck processing record"
            );
            reaped.push(record);
        }

        Ok(reaped)
    }
}

fn sort_recent_first(records: &mut [ProcessingRecord]) {
    records.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.attempt.cmp(&a.attempt))
    });
}
