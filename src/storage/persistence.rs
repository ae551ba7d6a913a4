//! PersistenceLayer trait: pluggable storage backend
//!
//! Holds the three record families the pipeline needs:
//! - Artifacts (immutable upload metadata)
//! - Processing records (one per attempt per artifact)
//! - Vehicle aggregates (one per vehicle, whole-record writes)
//!
//! Backends:
//! - `InMemoryDAL`: tests and ephemeral deployments
//! - `SledDAL`: durable on-disk store

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::types::{Artifact, ArtifactId, ProcessingRecord, VehicleAggregate, VehicleId};

/// Trait for pluggable persistence backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks. Every write replaces a whole record, so readers never
/// observe a partially-applied update.
pub trait PersistenceLayer: Send + Sync {
    /// Store a new artifact together with its first processing record.
    ///
    /// Both land or neither does.
    fn register_upload(
        &self,
        artifact: &Artifact,
        record: &ProcessingRecord,
    ) -> Result<(), PersistenceError>;

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, PersistenceError>;

    /// Insert or replace the record for `(artifact_id, attempt)`.
    fn put_record(&self, record: &ProcessingRecord) -> Result<(), PersistenceError>;

    /// Highest-attempt record for an artifact.
    fn latest_record(&self, id: &ArtifactId) -> Result<Option<ProcessingRecord>, PersistenceError>;

    /// All attempts for an artifact, oldest attempt first.
    fn record_history(&self, id: &ArtifactId) -> Result<Vec<ProcessingRecord>, PersistenceError>;

    /// Every stored record, all attempts, in no particular order.
    fn list_records(&self) -> Result<Vec<ProcessingRecord>, PersistenceError>;

    fn load_aggregate(&self, id: &VehicleId) -> Result<Option<VehicleAggregate>, PersistenceError>;

    /// Insert or replace a vehicle aggregate.
    fn save_aggregate(&self, aggregate: &VehicleAggregate) -> Result<(), PersistenceError>;

    /// Every aggregate, in no particular order.
    fn list_aggregates(&self) -> Result<Vec<VehicleAggregate>, PersistenceError>;

    /// Persist buffered writes. Backends without buffering do nothing.
    fn flush(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not found")]
    NotFound,
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> PersistenceError {
    PersistenceError::Storage(e.to_string())
}

/// In-memory persistence for tests and ephemeral deployments
///
/// Thread-safe via `RwLock`. Not durable.
#[derive(Default)]
pub struct InMemoryDAL {
    artifacts: RwLock<HashMap<ArtifactId, Artifact>>,
    records: RwLock<BTreeMap<(ArtifactId, u32), ProcessingRecord>>,
    aggregates: RwLock<HashMap<VehicleId, VehicleAggregate>>,
}

impl InMemoryDAL {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceLayer for InMemoryDAL {
    fn register_upload(
        &self,
        artifact: &Artifact,
        record: &ProcessingRecord,
    ) -> Result<(), PersistenceError> {
        // fixed lock order: artifacts, then records
        let mut artifacts = self.artifacts.write().map_err(poisoned)?;
        let mut records = self.records.write().map_err(poisoned)?;
        if artifacts.contains_key(&artifact.id) {
            return Err(PersistenceError::Storage(format!(
                "artifact {} already registered",
                artifact.id
            )));
        }
        artifacts.insert(artifact.id.clone(), artifact.clone());
        records.insert(
            (record.artifact_id.clone(), record.attempt),
            record.clone(),
        );
        Ok(())
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, PersistenceError> {
        let artifacts = self.artifacts.read().map_err(poisoned)?;
        Ok(artifacts.get(id).cloned())
    }

    fn put_record(&self, record: &ProcessingRecord) -> Result<(), PersistenceError> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(
            (record.artifact_id.clone(), record.attempt),
            record.clone(),
        );
        Ok(())
    }

    fn latest_record(&self, id: &ArtifactId) -> Result<Option<ProcessingRecord>, PersistenceError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .range((id.clone(), 0)..=(id.clone(), u32::MAX))
            .next_back()
            .map(|(_, r)| r.clone()))
    }

    fn record_history(&self, id: &ArtifactId) -> Result<Vec<ProcessingRecord>, PersistenceError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .range((id.clone(), 0)..=(id.clone(), u32::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn list_records(&self) -> Result<Vec<ProcessingRecord>, PersistenceError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.values().cloned().collect())
    }

    fn load_aggregate(&self, id: &VehicleId) -> Result<Option<VehicleAggregate>, PersistenceError> {
        let aggregates = self.aggregates.read().map_err(poisoned)?;
        Ok(aggregates.get(id).cloned())
    }

    fn save_aggregate(&self, aggregate: &VehicleAggregate) -> Result<(), PersistenceError> {
        let mut aggregates = self.aggregates.write().map_err(poisoned)?;
        aggregates.insert(aggregate.vehicle_id.clone(), aggregate.clone());
        Ok(())
    }

    fn list_aggregates(&self) -> Result<Vec<VehicleAggregate>, PersistenceError> {
        let aggregates = self.aggregates.read().map_err(poisoned)?;
        Ok(aggregates.values().cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use crate::types::{Artifact, ArtifactId, Category, ContentKind, StorageRef, VehicleId};

    pub fn artifact(id: &str, vehicle: &str, category: Category) -> Artifact {
        Artifact {
            id: ArtifactId::from(id),
            category,
            vehicle_id: VehicleId::from(vehicle),
            file_name: format!("{id}.pdf"),
            declared_kind: ContentKind::Pdf,
            storage_ref: StorageRef::new(id),
            content_digest: String::new(),
            size_bytes: 0,
            uploaded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::artifact;
    use super::*;
    use crate::types::{Category, ProcessingState};

    #[test]
    fn register_upload_stores_both_records() {
        let dal = InMemoryDAL::new();
        let a = artifact("a1", "V1", Category::Safety);
        let r = ProcessingRecord::pending(a.id.clone(), a.vehicle_id.clone(), 1);
        dal.register_upload(&a, &r).unwrap();

        assert_eq!(dal.get_artifact(&a.id).unwrap(), Some(a.clone()));
        let latest = dal.latest_record(&a.id).unwrap().unwrap();
        assert_eq!(latest.state, ProcessingState::Pending);
        assert!(dal.register_upload(&a, &r).is_err());
    }

    #[test]
    fn latest_record_is_highest_attempt() {
        let dal = InMemoryDAL::new();
        let id = ArtifactId::from("a1");
        for attempt in [1, 3, 2] {
            dal.put_record(&ProcessingRecord::pending(id.clone(), VehicleId::from("V1"), attempt))
                .unwrap();
        }
        dal.put_record(&ProcessingRecord::pending(ArtifactId::from("a2"), VehicleId::from("V1"), 9))
            .unwrap();

        assert_eq!(dal.latest_record(&id).unwrap().unwrap().attempt, 3);
        let attempts: Vec<_> = dal.record_history(&id).unwrap().iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[test]
    fn missing_entries_are_none() {
        let dal = InMemoryDAL::new();
        assert!(dal.get_artifact(&ArtifactId::from("nope")).unwrap().is_none());
        assert!(dal.load_aggregate(&VehicleId::from("nope")).unwrap().is_none());
        assert_eq!(dal.backend_name(), "in-memory");
    }
}
