//! Fleet Document Simulation
//!
//! Generates department documents for a synthetic fleet and pushes them
//! through an in-memory pipeline concurrently, then prints the fleet report.
//! Useful for exercising merge ordering and dispatcher concurrency.
//!
//! # Usage
//! ```bash
//! ./fleet-simulation --vehicles 12 --documents 200 --seed 7
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use futures::future::join_all;
use rand::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use fleet_readiness::analyzer::{SeededOutcomes, TemplateAnalyzer};
use fleet_readiness::config::{MergeConfig, PipelineConfig};
use fleet_readiness::reporting::{self, ReportKind};
use fleet_readiness::storage::{InMemoryByteStore, InMemoryDAL};
use fleet_readiness::types::ProcessingState;
use fleet_readiness::{Pipeline, UploadRequest};

// ============================================================================
// Document Templates
// ============================================================================

const CATEGORIES: [&str; 6] = [
    "Rolling Stock",
    "Safety",
    "Human Resources",
    "Operations",
    "Coordination",
    "Engineering",
];

const HEALTH: [&str; 3] = ["Good", "Fair", "Poor"];
const SAFETY: [&str; 3] = ["Cleared", "Pending", "Failed"];
const CREW: [&str; 2] = ["Assigned", "Unassigned"];
const TIMETABLE: [&str; 3] = ["On-Time", "Delayed", "Cancelled"];
const COORDINATION: [&str; 3] = ["Coordinated", "Pending", "Issues"];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fleet-simulation")]
#[command(about = "Concurrent document load against an in-memory readiness pipeline")]
#[command(version = "1.0")]
struct Args {
    /// Number of vehicles in the synthetic fleet (1-500)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=500))]
    vehicles: u32,

    /// Number of documents to upload (1-100000)
    #[arg(short, long, default_value = "100", value_parser = clap::value_parser!(u32).range(1..=100_000))]
    documents: u32,

    /// Maximum concurrent processing runs
    #[arg(short, long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..=256))]
    concurrency: u32,

    /// Fraction of documents sent as plain text with explicit markers (0-100)
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u8).range(0..=100))]
    marker_pct: u8,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Only print the final report
    #[arg(short, long)]
    quiet: bool,
}

/// One synthetic department document.
fn random_document(rng: &mut StdRng, vehicles: u32, marker_pct: u8) -> UploadRequest {
    let vehicle = rng.gen_range(1..=vehicles);
    let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
    let with_markers = rng.gen_range(0..100) < marker_pct;

    let (file_name, content_type, bytes) = if with_markers {
        let marker = match category {
            "Rolling Stock" => format!(
                "Condition: {}\nMaintenance: {}\n",
                HEALTH[rng.gen_range(0..HEALTH.len())],
                if rng.gen_bool(0.3) { "Required" } else { "Not Required" }
            ),
            "Safety" => format!("Clearance: {}\n", SAFETY[rng.gen_range(0..SAFETY.len())]),
            "Human Resources" => format!("Crew: {}\n", CREW[rng.gen_range(0..CREW.len())]),
            "Operations" => format!(
                "Timetable: {}\n",
                TIMETABLE[rng.gen_range(0..TIMETABLE.len())]
            ),
            "Coordination" => format!(
                "Coordination: {}\n",
                COORDINATION[rng.gen_range(0..COORDINATION.len())]
            ),
            _ => "Drawing revision B\n".to_string(),
        };
        ("report.txt".to_string(), Some("text/plain".to_string()), marker.into_bytes())
    } else {
        let mut bytes = vec![0u8; rng.gen_range(64..2048)];
        rng.fill_bytes(&mut bytes);
        ("scan.pdf".to_string(), None, bytes)
    };

    UploadRequest {
        vehicle_id: format!("T-{vehicle:03}"),
        category: category.to_string(),
        file_name,
        content_type,
        bytes,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if !args.quiet {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_target(false)
            .init();
    }

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);

    if !args.quiet {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("  Fleet simulation: {} vehicles, {} documents, seed {}", args.vehicles, args.documents, seed);
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let pipeline_config = PipelineConfig {
        intake_delay_ms: 0,
        max_concurrent_runs: args.concurrency as usize,
        queue_capacity: (args.documents as usize).max(1),
        ..PipelineConfig::default()
    };
    let analyzer = TemplateAnalyzer::new(Arc::new(SeededOutcomes::new(seed)));
    let pipeline = Pipeline::start(
        &pipeline_config,
        &MergeConfig::default(),
        Arc::new(InMemoryDAL::new()),
        Arc::new(InMemoryByteStore::new()),
        Arc::new(analyzer),
        CancellationToken::new(),
    );

    let documents: Vec<UploadRequest> = (0..args.documents)
        .map(|_| random_document(&mut rng, args.vehicles, args.marker_pct))
        .collect();

    let started = Instant::now();
    let uploads = join_all(documents.into_iter().map(|doc| pipeline.intake.upload(doc))).await;
    let rejected = uploads.iter().filter(|r| r.is_err()).count();
    if rejected > 0 {
        bail!("{rejected} uploads were rejected");
    }

    // Wait for the ledger to drain.
    let deadline = Instant::now() + pipeline_config.run_timeout() * 4;
    loop {
        let counts = pipeline.ledger.state_counts()?;
        let open = counts[&ProcessingState::Pending] + counts[&ProcessingState::Processing];
        if open == 0 {
            if !args.quiet {
                eprintln!(
                    "Processed {} documents in {:.2?}: {} completed, {} failed",
                    args.documents,
                    started.elapsed(),
                    counts[&ProcessingState::Completed],
                    counts[&ProcessingState::Failed]
                );
            }
            break;
        }
        if Instant::now() >= deadline {
            bail!("{open} documents still open after {:?}", started.elapsed());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let report = reporting::generate(ReportKind::Daily, &pipeline.merge, &pipeline.ledger)?;
    print!("{}", report.render_text());

    let stats = pipeline.shutdown().await;
    if !args.quiet {
        eprintln!("{stats}");
    }
    Ok(())
}
