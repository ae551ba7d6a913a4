//! Document processing pipeline
//!
//! ```text
//! upload ──► Intake ──► Dispatcher ──► Coordinator ──► Analyzer
//!              │                           │
//!              ▼                           ▼
//!        bytes + ledger              Merge Engine ──► aggregate store
//!                                          │
//!                                          ▼
//!                                   ledger complete / fail
//! ```
//!
//! The `StuckRunReaper` runs alongside and fails records left in
//! `processing` by a crashed or hung run.

mod coordinator;
mod dispatcher;
mod intake;
mod reaper;

pub use coordinator::{PipelineCoordinator, PipelineStats, RunOutcome};
pub use dispatcher::{DispatchError, DispatchHandle, DispatchStats, Dispatcher};
pub use intake::{Intake, IntakeError, UploadRequest};
pub use reaper::StuckRunReaper;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analyzer::Analyzer;
use crate::config::{MergeConfig, PipelineConfig};
use crate::ledger::ProcessingLedger;
use crate::merge::MergeEngine;
use crate::storage::{ByteStore, PersistenceLayer};

/// A running pipeline: shared services plus its background workers.
pub struct Pipeline {
    pub store: Arc<dyn PersistenceLayer>,
    pub ledger: ProcessingLedger,
    pub merge: MergeEngine,
    pub coordinator: PipelineCoordinator,
    pub intake: Intake,
    cancel_token: CancellationToken,
    dispatcher: JoinHandle<DispatchStats>,
    reaper: JoinHandle<()>,
}

impl Pipeline {
    /// Wire the components and spawn the dispatcher and reaper.
    pub fn start(
        pipeline: &PipelineConfig,
        merge: &MergeConfig,
        store: Arc<dyn PersistenceLayer>,
        blobs: Arc<dyn ByteStore>,
        analyzer: Arc<dyn Analyzer>,
        cancel_token: CancellationToken,
    ) -> Self {
        let ledger = ProcessingLedger::new(Arc::clone(&store));
        let merge = MergeEngine::new(Arc::clone(&store), merge);
        let coordinator = PipelineCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&blobs),
            analyzer,
            ledger.clone(),
            merge.clone(),
            pipeline.run_timeout(),
        );

        let (handle, dispatcher) =
            Dispatcher::new(coordinator.clone(), pipeline, cancel_token.clone());
        let intake = Intake::new(ledger.clone(), blobs, handle);
        let reaper = StuckRunReaper::new(ledger.clone(), pipeline, cancel_token.clone());

        info!(backend = store.backend_name(), "Pipeline starting");

        Self {
            store,
            ledger,
            merge,
            coordinator,
            intake,
            dispatcher: tokio::spawn(dispatcher.run()),
            reaper: tokio::spawn(reaper.run()),
            cancel_token,
        }
    }

    /// Cancel the workers and wait for in-flight runs to finish.
    pub async fn shutdown(self) -> DispatchStats {
        self.cancel_token.cancel();
        drop(self.intake);
        let _ = self.reaper.await;
        let stats = self.dispatcher.await.unwrap_or_default();
        info!(%stats, "{}", self.coordinator.get_stats());

        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to flush store on shutdown"),
            Err(e) => warn!(error = %e, "Flush task panicked"),
        }
        stats
    }
}

impl std::fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dispatcher: {} submitted, {} started, {} dropped",
            self.submitted, self.started, self.dropped
        )
    }
}
