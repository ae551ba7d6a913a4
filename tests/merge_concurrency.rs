//! Merge Concurrency Tests
//!
//! Runs merges for several vehicles concurrently in shuffled orders and checks
//! that no update is lost and that the final aggregate matches what a
//! sequential run over the same inputs produces.

use fleet_readiness::config::MergeConfig;
use fleet_readiness::merge::{MergeEngine, MergeInput};
use fleet_readiness::storage::{InMemoryDAL, PersistenceLayer, SledDAL};
use fleet_readiness::types::{
    ArtifactId, Category, Clearance, Condition, CoordinationState, SignalBundle, TimetableState,
    VehicleAggregate, VehicleId, Verdict,
};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

#[derive(Clone)]
struct Job {
    vehicle: VehicleId,
    category: Category,
    artifact: ArtifactId,
    bundle: SignalBundle,
}

/// One document per owning category, so field writes never overlap.
fn jobs_for_vehicle(vehicle: &str, rng: &mut StdRng) -> Vec<Job> {
    let vehicle = VehicleId::from(vehicle);
    let base = SignalBundle::with_confidence(0.9);

    let bundles = vec![
        (
            Category::RollingStock,
            SignalBundle {
                condition: Some(Condition::ALL[rng.gen_range(0..3)]),
                ..base.clone()
            },
        ),
        (
            Category::Safety,
            SignalBundle {
                clearance: Some(Clearance::ALL[rng.gen_range(0..3)]),
                ..base.clone()
            },
        ),
        (
            Category::HumanResources,
            SignalBundle {
                crew_available: Some(rng.gen_bool(0.5)),
                ..base.clone()
            },
        ),
        (
            Category::Operations,
            SignalBundle {
                timetable: Some(TimetableState::Delayed),
                ..base.clone()
            },
        ),
        (
            Category::Coordination,
            SignalBundle {
                coordination: Some(CoordinationState::ALL[rng.gen_range(0..3)]),
                ..base.clone()
            },
        ),
        (Category::Engineering, base.clone()),
    ];

    bundles
        .into_iter()
        .enumerate()
        .map(|(i, (category, bundle))| Job {
            vehicle: vehicle.clone(),
            category,
            artifact: ArtifactId::from(format!("{vehicle}-doc-{i}")),
            bundle,
        })
        .collect()
}

async fn run_job(engine: &MergeEngine, job: &Job) -> VehicleAggregate {
    engine
        .merge(MergeInput {
            vehicle_id: &job.vehicle,
            category: &job.category,
            artifact_id: &job.artifact,
            bundle: &job.bundle,
            recommendation: "ok",
        })
        .await
        .unwrap()
}

fn engine(store: Arc<dyn PersistenceLayer>) -> MergeEngine {
    MergeEngine::new(store, &MergeConfig::default())
}

fn assert_same_status(concurrent: &VehicleAggregate, sequential: &VehicleAggregate) {
    assert_eq!(concurrent.condition, sequential.condition);
    assert_eq!(concurrent.clearance, sequential.clearance);
    assert_eq!(concurrent.crew_available, sequential.crew_available);
    assert_eq!(concurrent.timetable, sequential.timetable);
    assert_eq!(concurrent.coordination, sequential.coordination);
    assert_eq!(concurrent.verdict(), sequential.verdict());
    assert_eq!(
        concurrent.recommendations.len(),
        sequential.recommendations.len()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shuffled_concurrent_merges_match_sequential() {
    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut jobs: Vec<Job> = (0..4)
            .flat_map(|v| jobs_for_vehicle(&format!("T-{v}"), &mut rng))
            .collect();

        let sequential = engine(Arc::new(InMemoryDAL::new()));
        for job in &jobs {
            run_job(&sequential, job).await;
        }

        jobs.shuffle(&mut rng);
        let concurrent = engine(Arc::new(InMemoryDAL::new()));
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let engine = concurrent.clone();
                tokio::spawn(async move { run_job(&engine, &job).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        for v in 0..4 {
            let id = VehicleId::from(format!("T-{v}"));
            let expected = sequential.aggregate(&id).unwrap().unwrap();
            let actual = concurrent.aggregate(&id).unwrap().unwrap();
            assert_same_status(&actual, &expected);
            assert_eq!(actual.recommendations.len(), 6, "seed {seed}: lost log entry");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_category_burst_loses_no_log_entries() {
    let engine = engine(Arc::new(InMemoryDAL::new()));
    let vehicle = VehicleId::from("T-900");
    let jobs: Vec<Job> = (0..50)
        .map(|i| Job {
            vehicle: vehicle.clone(),
            category: Category::RollingStock,
            artifact: ArtifactId::from(format!("burst-{i}")),
            bundle: SignalBundle {
                condition: Some(Condition::Good),
                ..SignalBundle::with_confidence(0.9)
            },
        })
        .collect();

    join_all(jobs.iter().map(|job| run_job(&engine, job))).await;

    let aggregate = engine.aggregate(&vehicle).unwrap().unwrap();
    assert_eq!(aggregate.recommendations.len(), 50);
    assert_eq!(aggregate.condition, Condition::Good);
}

#[tokio::test]
async fn safety_merge_touches_only_clearance() {
    let engine = engine(Arc::new(InMemoryDAL::new()));
    let vehicle = VehicleId::from("T-010");
    let before = run_job(
        &engine,
        &Job {
            vehicle: vehicle.clone(),
            category: Category::RollingStock,
            artifact: ArtifactId::from("rs-1"),
            bundle: SignalBundle {
                condition: Some(Condition::Good),
                ..SignalBundle::with_confidence(0.9)
            },
        },
    )
    .await;

    // a Safety bundle that also carries foreign fields
    let after = run_job(
        &engine,
        &Job {
            vehicle,
            category: Category::Safety,
            artifact: ArtifactId::from("s-1"),
            bundle: SignalBundle {
                clearance: Some(Clearance::Failed),
                condition: Some(Condition::Poor),
                crew_available: Some(true),
                coordination: Some(CoordinationState::Coordinated),
                ..SignalBundle::with_confidence(0.9)
            },
        },
    )
    .await;

    assert_eq!(after.clearance, Clearance::Failed);
    assert_eq!(after.condition, before.condition);
    assert_eq!(after.crew_available, before.crew_available);
    assert_eq!(after.coordination, before.coordination);
    assert_eq!(after.verdict(), Verdict::Maintenance);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_merges_against_sled() {
    let store = Arc::new(SledDAL::temporary().unwrap());
    let engine = engine(store);
    let mut rng = StdRng::seed_from_u64(7);
    let mut jobs: Vec<Job> = (0..3)
        .flat_map(|v| jobs_for_vehicle(&format!("S-{v}"), &mut rng))
        .collect();
    jobs.shuffle(&mut rng);

    join_all(jobs.iter().map(|job| run_job(&engine, job))).await;

    let all = engine.aggregates(10).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|agg| agg.recommendations.len() == 6));
    assert!(all.iter().all(|agg| agg.timetable == TimetableState::Delayed));
}
