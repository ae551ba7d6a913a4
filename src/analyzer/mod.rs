//! Analyzer contract
//!
//! An analyzer turns one artifact's bytes into a `SignalBundle` scoped to the
//! submitting category, plus a short summary and an operator recommendation.
//!
//! Implementations must be pure with respect to pipeline state (no store or
//! ledger access) so the coordinator can retry or time them out freely.
//! Missing bytes are the caller's problem; an analyzer only ever sees bytes.

mod markers;
mod outcome;
mod template;

pub use markers::{parse_markers, Markers};
pub use outcome::{FixedOutcome, OutcomeSource, SeededOutcomes};
pub use template::TemplateAnalyzer;

use async_trait::async_trait;

use crate::types::{Category, ContentKind, SignalBundle};

/// Input to a single analysis.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub bytes: &'a [u8],
    pub declared_kind: ContentKind,
    pub category: &'a Category,
    pub file_name: &'a str,
}

/// Result of a successful analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub bundle: SignalBundle,
    pub summary: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzerError {
    /// Bytes present but not interpretable.
    #[error("extraction failure: {0}")]
    ExtractionFailure(String),
}

/// Pluggable content analysis.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<Analysis, AnalyzerError>;
}
