//! Fleet Readiness: rail-vehicle status from department documents
//!
//! Departments upload documents per vehicle; each upload is analyzed into a
//! structured signal bundle and merged into the vehicle's readiness aggregate.
//!
//! ## Architecture
//!
//! - **Intake / Dispatcher**: accept uploads, schedule one run per artifact
//! - **Analyzer**: turn artifact bytes into category-specific signals
//! - **Processing Ledger**: per-artifact `pending → processing → completed | failed`
//! - **Merge Engine**: apply signals to the vehicle aggregate and decide the verdict
//! - **Reaper**: fail runs stuck in `processing`

pub mod analyzer;
pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod merge;
pub mod pipeline;
pub mod reporting;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::ReadinessConfig;

// Re-export error types
pub use error::{FailureCode, PipelineError};

// Re-export pipeline entry points
pub use pipeline::{Pipeline, RunOutcome, UploadRequest};

// Re-export commonly used types
pub use types::{
    Artifact, ArtifactId, Category, Clearance, Condition, CoordinationState, ProcessingRecord,
    ProcessingState, SignalBundle, TimetableState, VehicleAggregate, VehicleId, Verdict,
};
