//! System-wide default constants.
//!
//! Grouped by subsystem. Values here back the `Default` impls in
//! `readiness_config` and the fallbacks used by readers.

// ============================================================================
// Pipeline
// ============================================================================

/// Upper bound on fetch + analysis for a single run (seconds).
pub const RUN_TIMEOUT_SECS: u64 = 30;

/// Maximum number of coordinator runs executing at once.
pub const MAX_CONCURRENT_RUNS: usize = 8;

/// Delay between upload acceptance and the first processing attempt (ms).
pub const INTAKE_DELAY_MS: u64 = 2_000;

/// Capacity of the dispatcher's submission channel.
pub const DISPATCH_QUEUE_CAPACITY: usize = 1_024;

// ============================================================================
// Stuck-Run Reaper
// ============================================================================

/// A `processing` record older than this is considered abandoned (seconds).
///
/// Must stay above `RUN_TIMEOUT_SECS`, otherwise live runs get reaped.
pub const STUCK_AFTER_SECS: u64 = 300;

/// How often the reaper sweeps the ledger (seconds).
pub const REAPER_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Merge
// ============================================================================

/// Most recent recommendation entries kept per vehicle.
pub const RECOMMENDATION_LOG_CAP: usize = 200;

/// Yard position assigned to a freshly created vehicle aggregate.
pub const DEFAULT_YARD_POSITION: &str = "Unknown";

// ============================================================================
// Readers
// ============================================================================

/// Default page size for processing-record and vehicle listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Hard ceiling on any listing request.
pub const MAX_LIST_LIMIT: usize = 500;

// ============================================================================
// Storage / Server
// ============================================================================

/// Default on-disk location for the sled database and artifact bytes.
pub const DATA_DIR: &str = "./data/readiness";

/// Default HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Largest accepted upload body (bytes). 25 MiB.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
