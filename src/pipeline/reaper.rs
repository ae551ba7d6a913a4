//! Periodic sweep for runs that never finished.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::ledger::ProcessingLedger;

pub struct StuckRunReaper {
    ledger: ProcessingLedger,
    stuck_after: Duration,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl StuckRunReaper {
    pub fn new(ledger: ProcessingLedger, config: &PipelineConfig, cancel_token: CancellationToken) -> Self {
        Self {
            ledger,
            stuck_after: config.stuck_after(),
            interval: config.reaper_interval(),
            cancel_token,
        }
    }

    /// One pass. Returns how many records were failed.
    pub async fn sweep(&self) -> usize {
        match self.ledger.reap_stuck(self.stuck_after).await {
            Ok(reaped) => reaped.len(),
            Err(e) => {
                error!(error = %e, "Reaper sweep failed");
                0
            }
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            stuck_after_secs = self.stuck_after.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Stuck-run reaper started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("[Reaper] Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    let reaped = self.sweep().await;
                    if reaped > 0 {
                        info!(reaped, "Reaper failed stuck records");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureCode;
    use crate::storage::persistence::fixtures::artifact;
    use crate::storage::InMemoryDAL;
    use crate::types::{Category, ProcessingState};
    use std::sync::Arc;

    #[tokio::test]
    async fn sweep_fails_processing_records_past_threshold() {
        let ledger = ProcessingLedger::new(Arc::new(InMemoryDAL::new()));
        let stuck = artifact("stuck", "V1", Category::Safety);
        let waiting = artifact("waiting", "V1", Category::Safety);
        ledger.open(&stuck).await.unwrap();
        ledger.open(&waiting).await.unwrap();
        ledger.begin(&stuck.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let config = PipelineConfig {
            stuck_after_secs: 0,
            ..PipelineConfig::default()
        };
        let reaper = StuckRunReaper::new(ledger.clone(), &config, CancellationToken::new());
        assert_eq!(reaper.sweep().await, 1);

        let record = ledger.latest(&stuck.id).unwrap().unwrap();
        assert_eq!(record.state, ProcessingState::Failed);
        assert_eq!(record.failure_code, Some(FailureCode::Abandoned));
        let untouched = ledger.latest(&waiting.id).unwrap().unwrap();
        assert_eq!(untouched.state, ProcessingState::Pending);
    }

    #[tokio::test]
    async fn run_exits_on_cancel() {
        let ledger = ProcessingLedger::new(Arc::new(InMemoryDAL::new()));
        let cancel = CancellationToken::new();
        let reaper = StuckRunReaper::new(ledger, &PipelineConfig::default(), cancel.clone());
        let worker = tokio::spawn(reaper.run());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();
    }
}
