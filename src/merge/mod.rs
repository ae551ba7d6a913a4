//! Merge engine
//!
//! Folds one analysis into the vehicle's aggregate under a per-vehicle lock:
//! load (or create with defaults), apply the category reducer, append the
//! recommendation entry, recompute the verdict, save once. Merges for
//! different vehicles never wait on each other.

mod decision;
mod reducer;

pub use decision::decide;
pub use reducer::{apply, compose_note};

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::MergeConfig;
use crate::locks::KeyedMutex;
use crate::storage::{PersistenceError, PersistenceLayer};
use crate::types::{ArtifactId, Category, RecommendationEntry, SignalBundle, VehicleAggregate, VehicleId};

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("aggregate store failure: {0}")]
    Storage(#[from] PersistenceError),
}

/// One analyzed artifact, ready to be merged.
#[derive(Debug, Clone)]
pub struct MergeInput<'a> {
    pub vehicle_id: &'a VehicleId,
    pub category: &'a Category,
    pub artifact_id: &'a ArtifactId,
    pub bundle: &'a SignalBundle,
    pub recommendation: &'a str,
}

#[derive(Clone)]
pub struct MergeEngine {
    store: Arc<dyn PersistenceLayer>,
    locks: KeyedMutex,
    log_cap: usize,
}

impl MergeEngine {
    pub fn new(store: Arc<dyn PersistenceLayer>, config: &MergeConfig) -> Self {
        Self {
            store,
            locks: KeyedMutex::new(),
            log_cap: config.recommendation_log_cap.max(1),
        }
    }

    pub async fn merge(&self, input: MergeInput<'_>) -> Result<VehicleAggregate, MergeError> {
        let _guard = self.locks.lock(input.vehicle_id.as_str()).await;

        let mut aggregate = match self.store.load_aggregate(input.vehicle_id)? {
            Some(existing) => existing,
            None => {
                debug!(vehicle = %input.vehicle_id, "Creating vehicle aggregate with defaults");
                VehicleAggregate::new(input.vehicle_id.clone())
            }
        };
        let previous = aggregate.verdict();

        let written = apply(&mut aggregate, input.category, input.bundle);
        let now = Utc::now();
        aggregate.push_recommendation(
            RecommendationEntry {
                category: input.category.clone(),
                artifact_id: input.artifact_id.clone(),
                text: compose_note(input.category, input.bundle, input.recommendation),
                recorded_at: now,
            },
            self.log_cap,
        );
        let verdict = aggregate.refresh_verdict();
        aggregate.updated_at = now;

        self.store.save_aggregate(&aggregate)?;

        if verdict == previous {
            debug!(
                vehicle = %input.vehicle_id,
                category = %input.category,
                fields = ?written,
                %verdict,
                "Merged artifact"
            );
        } else {
            info!(
                vehicle = %input.vehicle_id,
                category = %input.category,
                fields = ?written,
                from = %previous,
                to = %verdict,
                "Vehicle verdict changed"
            );
        }

        Ok(aggregate)
    }

    /// Current aggregate, if the vehicle has ever been merged into.
    pub fn aggregate(&self, vehicle: &VehicleId) -> Result<Option<VehicleAggregate>, MergeError> {
        Ok(self.store.load_aggregate(vehicle)?)
    }

    /// Every aggregate, most recently updated first.
    pub fn aggregates(&self, limit: usize) -> Result<Vec<VehicleAggregate>, MergeError> {
        let mut all = self.store.list_aggregates()?;
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDAL;
    use crate::types::{Clearance, Condition, Verdict};

    fn engine(cap: usize) -> MergeEngine {
        MergeEngine::new(
            Arc::new(InMemoryDAL::new()),
            &MergeConfig {
                recommendation_log_cap: cap,
            },
        )
    }

    async fn merge(
        engine: &MergeEngine,
        vehicle: &str,
        category: Category,
        bundle: SignalBundle,
        artifact: &str,
    ) -> VehicleAggregate {
        engine
            .merge(MergeInput {
                vehicle_id: &VehicleId::from(vehicle),
                category: &category,
                artifact_id: &ArtifactId::from(artifact),
                bundle: &bundle,
                recommendation: "rec",
            })
            .await
            .unwrap()
    }

    fn condition(c: Condition) -> SignalBundle {
        SignalBundle {
            condition: Some(c),
            ..SignalBundle::with_confidence(0.9)
        }
    }

    #[tokio::test]
    async fn first_merge_creates_defaults_then_applies() {
        let engine = engine(200);
        let bundle = SignalBundle {
            clearance: Some(Clearance::Cleared),
            ..SignalBundle::with_confidence(0.9)
        };
        let agg = merge(&engine, "V1", Category::Safety, bundle, "a1").await;
        assert_eq!(agg.clearance, Clearance::Cleared);
        assert_eq!(agg.condition, Condition::Fair);
        assert_eq!(agg.verdict(), Verdict::Standby);
        assert_eq!(agg.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn last_write_wins_and_log_keeps_order() {
        let engine = engine(200);
        merge(&engine, "V1", Category::RollingStock, condition(Condition::Fair), "a1").await;
        let agg = merge(&engine, "V1", Category::RollingStock, condition(Condition::Good), "a2").await;
        assert_eq!(agg.condition, Condition::Good);
        let ids: Vec<_> = agg
            .recommendations
            .iter()
            .map(|e| e.artifact_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn poor_condition_forces_maintenance() {
        let engine = engine(200);
        let agg = merge(&engine, "V1", Category::RollingStock, condition(Condition::Poor), "a1").await;
        assert_eq!(agg.verdict(), Verdict::Maintenance);
        let stored = engine.aggregate(&VehicleId::from("V1")).unwrap().unwrap();
        assert_eq!(stored.verdict(), Verdict::Maintenance);
    }

    #[tokio::test]
    async fn log_cap_evicts_oldest() {
        let engine = engine(2);
        for n in 0..4 {
            merge(&engine, "V1", Category::Operations, SignalBundle::with_confidence(0.9), &format!("a{n}")).await;
        }
        let agg = engine.aggregate(&VehicleId::from("V1")).unwrap().unwrap();
        let ids: Vec<_> = agg
            .recommendations
            .iter()
            .map(|e| e.artifact_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a2", "a3"]);
    }

    #[tokio::test]
    async fn vehicles_are_independent() {
        let engine = engine(200);
        merge(&engine, "V1", Category::RollingStock, condition(Condition::Poor), "a1").await;
        merge(&engine, "V2", Category::RollingStock, condition(Condition::Good), "a2").await;
        let v1 = engine.aggregate(&VehicleId::from("V1")).unwrap().unwrap();
        let v2 = engine.aggregate(&VehicleId::from("V2")).unwrap().unwrap();
        assert_eq!(v1.condition, Condition::Poor);
        assert_eq!(v2.condition, Condition::Good);
        assert_eq!(engine.aggregates(10).unwrap().len(), 2);
    }
}
