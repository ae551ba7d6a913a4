//! Sled-backed `PersistenceLayer`.
//!
//! Named trees:
//! - `artifacts`: artifact id → JSON `Artifact`
//! - `processing_records`: `{artifact_id}/{attempt:010}` → JSON `ProcessingRecord`
//! - `vehicles`: vehicle id → JSON `VehicleAggregate`
//!
//! The zero-padded attempt keeps a prefix scan ordered by attempt, so the last
//! entry under an artifact's prefix is its latest record.

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use std::path::Path;
use tracing::info;

use super::persistence::{PersistenceError, PersistenceLayer};
use crate::types::{Artifact, ArtifactId, ProcessingRecord, VehicleAggregate, VehicleId};

const ARTIFACTS_TREE: &str = "artifacts";
const RECORDS_TREE: &str = "processing_records";
const VEHICLES_TREE: &str = "vehicles";

#[derive(Clone)]
pub struct SledDAL {
    db: sled::Db,
    artifacts: sled::Tree,
    records: sled::Tree,
    vehicles: sled::Tree,
}

impl From<sled::Error> for PersistenceError {
    fn from(e: sled::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

fn record_prefix(id: &ArtifactId) -> String {
    format!("{id}/")
}

fn record_key(id: &ArtifactId, attempt: u32) -> String {
    format!("{id}/{attempt:010}")
}

impl SledDAL {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let dal = Self::from_db(db)?;
        info!(path = %path_ref.display(), "Readiness store opened");
        Ok(dal)
    }

    /// Throwaway database, removed on drop. For tests and demos.
    pub fn temporary() -> Result<Self, PersistenceError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, PersistenceError> {
        Ok(Self {
            artifacts: db.open_tree(ARTIFACTS_TREE)?,
            records: db.open_tree(RECORDS_TREE)?,
            vehicles: db.open_tree(VEHICLES_TREE)?,
            db,
        })
    }

    fn decode_all<T: serde::de::DeserializeOwned>(
        iter: impl Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>,
    ) -> Result<Vec<T>, PersistenceError> {
        iter.map(|item| {
            let (_key, value) = item?;
            Ok(serde_json::from_slice(&value)?)
        })
        .collect()
    }
}

impl PersistenceLayer for SledDAL {
    fn register_upload(
        &self,
        artifact: &Artifact,
        record: &ProcessingRecord,
    ) -> Result<(), PersistenceError> {
        let artifact_key = artifact.id.as_str().as_bytes().to_vec();
        let artifact_value = serde_json::to_vec(artifact)?;
        let rec_key = record_key(&record.artifact_id, record.attempt);
        let rec_value = serde_json::to_vec(record)?;

        (&self.artifacts, &self.records)
            .transaction(|(artifacts, records)| {
                if artifacts.get(&artifact_key)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(()));
                }
                artifacts.insert(artifact_key.as_slice(), artifact_value.as_slice())?;
                records.insert(rec_key.as_bytes(), rec_value.as_slice())?;
                Ok(())
            })
            .map_err(|e: TransactionError<()>| match e {
                TransactionError::Abort(()) => PersistenceError::Storage(format!(
                    "artifact {} already registered",
                    artifact.id
                )),
                TransactionError::Storage(err) => PersistenceError::Storage(err.to_string()),
            })
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, PersistenceError> {
        match self.artifacts.get(id.as_str())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_record(&self, record: &ProcessingRecord) -> Result<(), PersistenceError> {
        let value = serde_json::to_vec(record)?;
        self.records
            .insert(record_key(&record.artifact_id, record.attempt), value)?;
        Ok(())
    }

    fn latest_record(&self, id: &ArtifactId) -> Result<Option<ProcessingRecord>, PersistenceError> {
        match self.records.scan_prefix(record_prefix(id)).next_back() {
            Some(item) => {
                let (_key, value) = item?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    fn record_history(&self, id: &ArtifactId) -> Result<Vec<ProcessingRecord>, PersistenceError> {
        Self::decode_all(self.records.scan_prefix(record_prefix(id)))
    }

    fn list_records(&self) -> Result<Vec<ProcessingRecord>, PersistenceError> {
        Self::decode_all(self.records.iter())
    }

    fn load_aggregate(&self, id: &VehicleId) -> Result<Option<VehicleAggregate>, PersistenceError> {
        match self.vehicles.get(id.as_str())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save_aggregate(&self, aggregate: &VehicleAggregate) -> Result<(), PersistenceError> {
        let value = serde_json::to_vec(aggregate)?;
        self.vehicles.insert(aggregate.vehicle_id.as_str(), value)?;
        Ok(())
    }

    fn list_aggregates(&self) -> Result<Vec<VehicleAggregate>, PersistenceError> {
        Self::decode_all(self.vehicles.iter())
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        self.db.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
