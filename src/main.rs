//! Fleet Readiness - Document-driven rail vehicle readiness
//!
//! Accepts department documents per vehicle, analyzes them and keeps a merged
//! readiness status for every vehicle in the fleet.
//!
//! # Usage
//! ```bash
//! fleet-readiness serve --addr 0.0.0.0:8080
//! fleet-readiness ingest --vehicle T-101 --category Safety --file cert.pdf --wait
//! fleet-readiness status --vehicle T-101
//! fleet-readiness report --kind weekly
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fleet_readiness::analyzer::{SeededOutcomes, TemplateAnalyzer};
use fleet_readiness::api::{self, ApiState};
use fleet_readiness::config::{validation, LoggingConfig, ReadinessConfig};
use fleet_readiness::reporting::{self, ReportKind};
use fleet_readiness::ledger::ProcessingLedger;
use fleet_readiness::merge::MergeEngine;
use fleet_readiness::storage::{self, ByteStore, PersistenceLayer};
use fleet_readiness::types::{ArtifactId, ProcessingRecord, VehicleId};
use fleet_readiness::{Pipeline, UploadRequest};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fleet-readiness")]
#[command(about = "Rail fleet readiness from department documents")]
#[command(version)]
struct CliArgs {
    /// Path to a readiness.toml (overrides READINESS_CONFIG and ./readiness.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long, global = true, env = "READINESS_ADDR")]
    addr: Option<String>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP API and the processing pipeline (default)
    Serve,

    /// Upload a document from disk
    Ingest {
        /// Vehicle identifier, e.g. T-101
        #[arg(long)]
        vehicle: String,
        /// Department: "Rolling Stock", "Safety", "Human Resources", "Operations", ...
        #[arg(long)]
        category: String,
        /// Document to upload
        #[arg(long)]
        file: PathBuf,
        /// MIME type or kind name; guessed from the file name when absent
        #[arg(long)]
        content_type: Option<String>,
        /// Process now and wait for the result instead of leaving it pending
        #[arg(long)]
        wait: bool,
    },

    /// Re-run processing for an artifact whose latest attempt finished
    Reprocess {
        artifact_id: String,
        /// Process now and wait for the result
        #[arg(long)]
        wait: bool,
    },

    /// Print vehicle status as JSON
    Status {
        /// A single vehicle; all vehicles when omitted
        #[arg(long)]
        vehicle: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Print a fleet readiness report
    Report {
        /// daily, weekly or monthly
        #[arg(long, default_value = "daily")]
        kind: String,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Startup
// ============================================================================

fn load_config(args: &CliArgs) -> Result<ReadinessConfig> {
    let mut config = match &args.config {
        Some(path) => ReadinessConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ReadinessConfig::load(),
    };
    if let Some(addr) = &args.addr {
        config.server.addr.clone_from(addr);
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir.clone_from(dir);
    }
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn open_storage(config: &ReadinessConfig) -> Result<(Arc<dyn PersistenceLayer>, Arc<dyn ByteStore>)> {
    storage::open_backend(&config.storage).with_context(|| {
        format!(
            "opening {} storage at {}",
            config.storage.backend,
            config.storage.data_dir.display()
        )
    })
}

/// Ledger and aggregate readers without the dispatcher or reaper, so a
/// query never writes.
fn open_readers(config: &ReadinessConfig) -> Result<(ProcessingLedger, MergeEngine)> {
    let (store, _blobs) = open_storage(config)?;
    Ok((
        ProcessingLedger::new(Arc::clone(&store)),
        MergeEngine::new(store, &config.merge),
    ))
}

fn start_pipeline(config: &ReadinessConfig, cancel_token: CancellationToken) -> Result<Pipeline> {
    let (store, blobs) = open_storage(config)?;
    let outcomes = Arc::new(SeededOutcomes::from_config(config.analyzer.seed));
    let analyzer = Arc::new(TemplateAnalyzer::new(outcomes));
    Ok(Pipeline::start(
        &config.pipeline,
        &config.merge,
        store,
        blobs,
        analyzer,
        cancel_token,
    ))
}

/// Poll the ledger until the artifact's latest attempt is terminal.
async fn wait_for_terminal(
    pipeline: &Pipeline,
    artifact: &ArtifactId,
    limit: Duration,
) -> Result<ProcessingRecord> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if let Some(record) = pipeline.ledger.latest(artifact)? {
            if record.state.is_terminal() {
                return Ok(record);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("artifact {artifact} did not finish within {limit:?}");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn print_record(record: &ProcessingRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

// ============================================================================
// Subcommands
// ============================================================================

async fn run_serve(config: &ReadinessConfig) -> Result<()> {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Fleet Readiness");
    info!("  Storage: {} at {}", config.storage.backend, config.storage.data_dir.display());
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let pipeline = start_pipeline(config, cancel_token.clone())?;
    pipeline
        .intake
        .resubmit_pending()
        .await
        .context("resubmitting pending artifacts")?;

    let app = api::create_app(
        ApiState::from_pipeline(&pipeline),
        config.server.max_upload_bytes,
    );
    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("binding {}", config.server.addr))?;
    info!(addr = %config.server.addr, "HTTP API listening");

    let server_token = cancel_token.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await;

    let stats = pipeline.shutdown().await;
    info!(%stats, "Pipeline stopped");
    served.context("HTTP server error")
}

async fn run_ingest(
    config: &ReadinessConfig,
    vehicle: String,
    category: String,
    file: &Path,
    content_type: Option<String>,
    wait: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("file path has no file name")?;

    let mut config = config.clone();
    if wait {
        config.pipeline.intake_delay_ms = 0;
    }
    let pipeline = start_pipeline(&config, CancellationToken::new())?;
    let artifact = pipeline
        .intake
        .upload(UploadRequest {
            vehicle_id: vehicle,
            category,
            file_name,
            content_type,
            bytes,
        })
        .await
        .context("uploading artifact")?;
    println!("{}", serde_json::to_string_pretty(&artifact)?);

    let result = if wait {
        wait_for_terminal(&pipeline, &artifact.id, config.pipeline.run_timeout() * 2)
            .await
            .and_then(|record| print_record(&record))
    } else {
        info!(artifact = %artifact.id, "Left pending; `serve` will process it");
        Ok(())
    };
    pipeline.shutdown().await;
    result
}

async fn run_reprocess(config: &ReadinessConfig, artifact_id: String, wait: bool) -> Result<()> {
    let mut config = config.clone();
    if wait {
        config.pipeline.intake_delay_ms = 0;
    }
    let pipeline = start_pipeline(&config, CancellationToken::new())?;
    let id = ArtifactId::from(artifact_id);
    let record = pipeline
        .intake
        .reprocess(&id)
        .await
        .with_context(|| format!("reprocessing {id}"))?;
    info!(artifact = %id, attempt = record.attempt, "Re-run scheduled");

    let result = if wait {
        wait_for_terminal(&pipeline, &id, config.pipeline.run_timeout() * 2)
            .await
            .and_then(|record| print_record(&record))
    } else {
        print_record(&record)
    };
    pipeline.shutdown().await;
    result
}

fn run_status(config: &ReadinessConfig, vehicle: Option<String>, limit: usize) -> Result<()> {
    let (_ledger, merge) = open_readers(config)?;
    match vehicle {
        Some(v) => {
            let vehicle = VehicleId::from(v);
            let Some(aggregate) = merge.aggregate(&vehicle)? else {
                bail!("no status recorded for vehicle {vehicle}");
            };
            println!("{}", serde_json::to_string_pretty(&aggregate)?);
        }
        None => {
            let aggregates = merge.aggregates(limit)?;
            println!("{}", serde_json::to_string_pretty(&aggregates)?);
        }
    }
    Ok(())
}

fn run_report(config: &ReadinessConfig, kind: &str, json: bool) -> Result<()> {
    let Some(kind) = ReportKind::parse(kind) else {
        bail!("unknown report kind '{kind}' (expected daily, weekly or monthly)");
    };
    let (ledger, merge) = open_readers(config)?;
    let report = reporting::generate(kind, &merge, &ledger).context("generating fleet report")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Config load logs its own warnings; route them somewhere before the
    // configured subscriber exists.
    let bootstrap = tracing_subscriber::fmt().with_target(false).finish();
    let config = tracing::subscriber::with_default(bootstrap, || load_config(&args))?;
    init_tracing(&config.logging);

    for w in validation::operational_warnings(&config) {
        warn!("{}", w);
    }

    match args.command.unwrap_or(SubCommand::Serve) {
        SubCommand::Serve => run_serve(&config).await,
        SubCommand::Ingest {
            vehicle,
            category,
            file,
            content_type,
            wait,
        } => run_ingest(&config, vehicle, category, &file, content_type, wait).await,
        SubCommand::Reprocess { artifact_id, wait } => {
            run_reprocess(&config, artifact_id, wait).await
        }
        SubCommand::Status { vehicle, limit } => run_status(&config, vehicle, limit),
        SubCommand::Report { kind, json } => run_report(&config, &kind, json),
    }
}
