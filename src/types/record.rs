//! Processing-ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ArtifactId, VehicleId};
use crate::error::FailureCode;

/// Ingestion state of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingState {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Processing, Self::Completed, Self::Failed];

    /// Legal edges: pending → processing → completed | failed.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Timestamped entry into a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStamp {
    pub state: ProcessingState,
    pub at: DateTime<Utc>,
}

/// One processing attempt for one artifact.
///
/// Only the ledger mutates records; the latest attempt per artifact is
/// authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub artifact_id: ArtifactId,
    pub vehicle_id: VehicleId,
    /// 1 for the upload, +1 for each forced re-run
    pub attempt: u32,
    pub state: ProcessingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub transitions: Vec<StateStamp>,
    /// Serialized `SignalBundle` of a completed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<FailureCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ProcessingRecord {
    /// New `pending` attempt.
    pub fn pending(artifact_id: ArtifactId, vehicle_id: VehicleId, attempt: u32) -> Self {
        let now = Utc::now();
        Self {
            artifact_id,
            vehicle_id,
            attempt,
            state: ProcessingState::Pending,
            created_at: now,
            updated_at: now,
            transitions: vec![StateStamp {
                state: ProcessingState::Pending,
                at: now,
            }],
            snapshot: None,
            summary: None,
            recommendation: None,
            failure_code: None,
            failure_reason: None,
        }
    }

    /// Move to `next` if the edge is legal, stamping the transition.
    ///
    /// Returns the rejected `(from, to)` pair otherwise.
    pub fn advance(
        &mut self,
        next: ProcessingState,
    ) -> Result<(), (ProcessingState, ProcessingState)> {
        if !self.state.can_transition_to(next) {
            return Err((self.state, next));
        }
        let now = Utc::now();
        self.state = next;
        self.updated_at = now;
        self.transitions.push(StateStamp { state: next, at: now });
        Ok(())
    }

    /// States visited so far, in order.
    pub fn path(&self) -> Vec<ProcessingState> {
        self.transitions.iter().map(|t| t.state).collect()
    }
}
