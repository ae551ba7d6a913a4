//! Shared data structures for the readiness pipeline
//!
//! - Artifacts: uploaded documents and their classification
//! - Signals: normalized status labels and the analyzer's `SignalBundle`
//! - Aggregate: the merged per-vehicle status and its derived verdict
//! - Records: processing-ledger entries and their state machine

mod artifact;
mod signals;
mod aggregate;
mod record;

pub use artifact::*;
pub use signals::*;
pub use aggregate::*;
pub use record::*;
