//! Upload intake and operator re-runs.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use super::dispatcher::DispatchHandle;
use crate::ledger::{LedgerError, ProcessingLedger};
use crate::storage::{BlobError, ByteStore};
use crate::types::{
    content_digest, Artifact, ArtifactId, Category, ContentKind, ProcessingRecord, ProcessingState,
    StorageRef, VehicleId,
};

/// A document upload as received from a department.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub vehicle_id: String,
    /// Department name, e.g. `Rolling Stock`
    pub category: String,
    pub file_name: String,
    /// MIME type or kind name; guessed from `file_name` when absent
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("invalid upload: {0}")]
    Validation(String),
    #[error("failed to store artifact bytes: {0}")]
    Bytes(#[from] BlobError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Clone)]
pub struct Intake {
    ledger: ProcessingLedger,
    blobs: Arc<dyn ByteStore>,
    dispatch: DispatchHandle,
}

impl Intake {
    pub fn new(ledger: ProcessingLedger, blobs: Arc<dyn ByteStore>, dispatch: DispatchHandle) -> Self {
        Self {
            ledger,
            blobs,
            dispatch,
        }
    }

    /// Store bytes, register the artifact with a `pending` record, schedule it.
    ///
    /// The artifact is durable once this returns, even if scheduling failed;
    /// [`Intake::resubmit_pending`] picks such records up again.
    pub async fn upload(&self, request: UploadRequest) -> Result<Artifact, IntakeError> {
        let vehicle_id = VehicleId::from(request.vehicle_id);
        if vehicle_id.as_str().is_empty() {
            return Err(IntakeError::Validation("vehicle_id is required".to_string()));
        }
        if request.category.trim().is_empty() {
            return Err(IntakeError::Validation("category is required".to_string()));
        }
        let file_name = request.file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(IntakeError::Validation("file_name is required".to_string()));
        }

        let declared_kind = request
            .content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .map_or_else(|| ContentKind::guess(&file_name), ContentKind::parse);

        let id = ArtifactId::generate();
        let storage_ref = StorageRef::new(id.as_str());
        self.blobs.put(&storage_ref, &request.bytes).await?;

        let artifact = Artifact {
            id,
            category: Category::parse(&request.category),
            vehicle_id,
            file_name,
            declared_kind,
            storage_ref,
            content_digest: content_digest(&request.bytes),
            size_bytes: request.bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        self.ledger.open(&artifact).await?;

        info!(
            artifact = %artifact.id,
            vehicle = %artifact.vehicle_id,
            category = %artifact.category,
            kind = ?artifact.declared_kind,
            size = artifact.size_bytes,
            "Artifact uploaded"
        );

        self.schedule(&artifact.id).await;
        Ok(artifact)
    }

    /// Force a re-run: append the next `pending` attempt and schedule it.
    pub async fn reprocess(&self, artifact: &ArtifactId) -> Result<ProcessingRecord, IntakeError> {
        let record = self.ledger.reopen(artifact).await?;
        self.schedule(artifact).await;
        Ok(record)
    }

    /// Schedule every artifact whose latest record is still `pending`.
    ///
    /// Used at startup to recover uploads accepted before a restart.
    pub async fn resubmit_pending(&self) -> Result<usize, IntakeError> {
        let pending = self.ledger.in_state(ProcessingState::Pending)?;
        for record in &pending {
            self.schedule(&record.artifact_id).await;
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "Resubmitted pending artifacts");
        }
        Ok(pending.len())
    }

    async fn schedule(&self, artifact: &ArtifactId) {
        if let Err(e) = self.dispatch.submit(artifact.clone()).await {
            warn!(artifact = %artifact, error = %e, "Could not schedule artifact, left pending");
        }
    }
}
