//! Pipeline error taxonomy.
//!
//! `PipelineError` is what a coordinator run can produce; every variant except
//! `RecordNotFound` is converted into a `failed` ledger transition whose
//! `FailureCode` is persisted alongside a human-readable reason.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::ArtifactId;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No processing record exists for the artifact.
    #[error("no processing record for artifact {0}")]
    RecordNotFound(ArtifactId),

    /// Metadata or bytes could not be fetched.
    #[error("artifact {artifact} unavailable: {reason}")]
    ArtifactUnavailable { artifact: ArtifactId, reason: String },

    /// The analyzer could not interpret the bytes.
    #[error("extraction failed for artifact {artifact}: {reason}")]
    ExtractionFailure { artifact: ArtifactId, reason: String },

    /// Store or ledger write failure.
    #[error("infrastructure fault: {0}")]
    InfrastructureFault(String),

    /// Fetch + analysis exceeded the run timeout.
    #[error("{stage} timed out after {after:?}")]
    TimedOut { stage: &'static str, after: Duration },
}

impl PipelineError {
    /// Code persisted on the failed record. `None` for errors that never
    /// reach the ledger.
    pub const fn failure_code(&self) -> Option<FailureCode> {
        match self {
            Self::RecordNotFound(_) => None,
            Self::ArtifactUnavailable { .. } => Some(FailureCode::ArtifactUnavailable),
            Self::ExtractionFailure { .. } => Some(FailureCode::ExtractionFailure),
            Self::InfrastructureFault(_) => Some(FailureCode::InfrastructureFault),
            Self::TimedOut { .. } => Some(FailureCode::TimedOut),
        }
    }
}

/// Machine-readable failure category stored on a failed `ProcessingRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    ArtifactUnavailable,
    ExtractionFailure,
    InfrastructureFault,
    TimedOut,
    /// Record stuck in `processing` past the reaper threshold.
    Abandoned,
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ArtifactUnavailable => "artifact_unavailable",
            Self::ExtractionFailure => "extraction_failure",
            Self::InfrastructureFault => "infrastructure_fault",
            Self::TimedOut => "timed_out",
            Self::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}
