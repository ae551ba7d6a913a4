//! Bounded-concurrency run dispatcher.
//!
//! Submitted artifact ids are scheduled after the configured intake delay and
//! executed through the coordinator, at most `max_concurrent_runs` at a time.
//! Delivery is at-least-once: a duplicate id is absorbed by the coordinator
//! as `RunOutcome::Skipped`.
//!
//! On cancellation the dispatcher stops accepting work, drops runs still
//! waiting out their delay (their records stay `pending`) and lets runs that
//! already started finish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::coordinator::{PipelineCoordinator, RunOutcome};
use crate::config::PipelineConfig;
use crate::types::ArtifactId;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher is shut down")]
    Closed,
}

#[derive(Default)]
struct DispatchCounters {
    submitted: AtomicU64,
    started: AtomicU64,
    dropped: AtomicU64,
}

/// Dispatcher statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub submitted: u64,
    pub started: u64,
    /// Runs abandoned during shutdown before they started
    pub dropped: u64,
}

/// Cloneable submission side of the dispatcher.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<ArtifactId>,
    counters: Arc<DispatchCounters>,
}

impl DispatchHandle {
    pub async fn submit(&self, artifact: ArtifactId) -> Result<(), DispatchError> {
        self.tx.send(artifact).await.map_err(|_| DispatchError::Closed)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl DispatchCounters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

pub struct Dispatcher {
    coordinator: PipelineCoordinator,
    rx: mpsc::Receiver<ArtifactId>,
    permits: Arc<Semaphore>,
    delay: Duration,
    cancel_token: CancellationToken,
    counters: Arc<DispatchCounters>,
}

impl Dispatcher {
    pub fn new(
        coordinator: PipelineCoordinator,
        config: &PipelineConfig,
        cancel_token: CancellationToken,
    ) -> (DispatchHandle, Self) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(DispatchCounters::default());
        let handle = DispatchHandle {
            tx,
            counters: Arc::clone(&counters),
        };
        let dispatcher = Self {
            coordinator,
            rx,
            permits: Arc::new(Semaphore::new(config.max_concurrent_runs.max(1))),
            delay: config.intake_delay(),
            cancel_token,
            counters,
        };
        (handle, dispatcher)
    }

    /// Run until cancelled or every handle is dropped, then drain in-flight runs.
    pub async fn run(mut self) -> DispatchStats {
        let mut tasks = JoinSet::new();
        info!(
            max_concurrent = self.permits.available_permits(),
            delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
            "Dispatcher started"
        );

        loop {
            let next = tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("[Dispatcher] Shutdown signal received");
                    break;
                }
                next = self.rx.recv() => next,
            };

            let Some(artifact) = next else {
                debug!("[Dispatcher] All handles dropped");
                break;
            };

            tasks.spawn(Self::run_one(
                self.coordinator.clone(),
                Arc::clone(&self.permits),
                self.delay,
                self.cancel_token.clone(),
                Arc::clone(&self.counters),
                artifact,
            ));

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Run task panicked");
                }
            }
        }

        // queued but never received; they stay pending in the ledger
        self.rx.close();
        while self.rx.try_recv().is_ok() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Run task panicked");
            }
        }

        let stats = self.counters.snapshot();
        info!(
            submitted = stats.submitted,
            started = stats.started,
            dropped = stats.dropped,
            "Dispatcher stopped"
        );
        stats
    }

    async fn run_one(
        coordinator: PipelineCoordinator,
        permits: Arc<Semaphore>,
        delay: Duration,
        cancel_token: CancellationToken,
        counters: Arc<DispatchCounters>,
        artifact: ArtifactId,
    ) {
        if !delay.is_zero() {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        let permit = tokio::select! {
            () = cancel_token.cancelled() => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            permit = permits.acquire_owned() => permit,
        };
        let Ok(_permit) = permit else {
            return;
        };

        counters.started.fetch_add(1, Ordering::Relaxed);
        match coordinator.process(&artifact).await {
            Ok(RunOutcome::Failed { code, .. }) => {
                debug!(artifact = %artifact, %code, "Run recorded as failed");
            }
            Ok(_) => {}
            Err(e) => warn!(artifact = %artifact, error = %e, "Run could not be recorded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{FixedOutcome, TemplateAnalyzer};
    use crate::config::MergeConfig;
    use crate::ledger::ProcessingLedger;
    use crate::merge::MergeEngine;
    use crate::storage::persistence::fixtures::artifact;
    use crate::storage::{ByteStore, InMemoryByteStore, InMemoryDAL, PersistenceLayer};
    use crate::types::{Category, ProcessingState};

    async fn setup(delay_ms: u64) -> (ProcessingLedger, DispatchHandle, Dispatcher, CancellationToken) {
        let store: Arc<dyn PersistenceLayer> = Arc::new(InMemoryDAL::new());
        let blobs = Arc::new(InMemoryByteStore::new());
        let ledger = ProcessingLedger::new(Arc::clone(&store));
        let merge = MergeEngine::new(Arc::clone(&store), &MergeConfig::default());
        let coordinator = PipelineCoordinator::new(
            Arc::clone(&store),
            blobs.clone(),
            Arc::new(TemplateAnalyzer::new(Arc::new(FixedOutcome(0.9)))),
            ledger.clone(),
            merge,
            Duration::from_secs(5),
        );
        for id in ["a1", "a2", "a3"] {
            let a = artifact(id, "V1", Category::Safety);
            blobs.put(&a.storage_ref, b"report").await.unwrap();
            ledger.open(&a).await.unwrap();
        }
        let config = PipelineConfig {
            intake_delay_ms: delay_ms,
            max_concurrent_runs: 2,
            ..PipelineConfig::default()
        };
        let cancel = CancellationToken::new();
        let (handle, dispatcher) = Dispatcher::new(coordinator, &config, cancel.clone());
        (ledger, handle, dispatcher, cancel)
    }

    #[tokio::test]
    async fn drains_submitted_runs_when_handles_drop() {
        let (ledger, handle, dispatcher, _cancel) = setup(0).await;
        let worker = tokio::spawn(dispatcher.run());
        for id in ["a1", "a2", "a3", "a1"] {
            handle.submit(ArtifactId::from(id)).await.unwrap();
        }
        drop(handle);
        let stats = worker.await.unwrap();
        assert_eq!(stats.submitted, 4);
        assert_eq!(stats.started, 4);

        let completed = ledger.in_state(ProcessingState::Completed).unwrap();
        assert_eq!(completed.len(), 3);
    }

    #[tokio::test]
    async fn cancellation_drops_delayed_runs() {
        let (ledger, handle, dispatcher, cancel) = setup(60_000).await;
        let worker = tokio::spawn(dispatcher.run());
        handle.submit(ArtifactId::from("a1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let stats = worker.await.unwrap();
        assert_eq!(stats.started, 0);
        assert_eq!(stats.dropped, 1);

        let pending = ledger.in_state(ProcessingState::Pending).unwrap();
        assert_eq!(pending.len(), 3);
        assert!(handle.submit(ArtifactId::from("a2")).await.is_err());
    }
}
