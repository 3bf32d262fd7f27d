//! Waylon ingestion worker
//!
//! `run` polls the notification queue until a shutdown signal or the stop
//! file. `reprocess` pushes a single stored object through the pipeline, and
//! `parse` extracts a local file and prints the record that would be stored.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use waylon_common::logging::{init_logging, LogConfig, LogLevel};

use waylon_server::{
    extract::TabularExtractor,
    formats::FormatTable,
    ingest::{
        ErrorNotifier, IngestConfig, IngestOrchestrator, IngestPipeline, LogNotifier, ObjectRef,
        QueueConfig, QueueNotifier, SqsQueue,
    },
    reconcile::Reconciler,
    registry::{HttpRegistry, RegistryConfig},
    shutdown,
    storage::{config::StorageConfig, MetadataStore, Storage},
};

#[derive(Parser, Debug)]
#[command(name = "waylon-ingest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML format table; the built-in table is used when unset
    #[arg(long, env = "WAYLON_FORMATS", global = true)]
    formats: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the notification queue
    Run,

    /// Ingest one stored object without going through the queue
    Reprocess {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long)]
        key: String,
    },

    /// Extract a local file and print its metadata record as JSON
    Parse {
        file: PathBuf,

        /// File name used for format detection (defaults to the file's own name)
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut builder = LogConfig::builder()
        .log_file_prefix("waylon-ingest")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,hyper=warn");
    if cli.verbose {
        builder = builder.level(LogLevel::Debug);
    }

    let log_config = match builder.build().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid logging configuration: {}", e);
            process::exit(2);
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialise logging: {}", e);
            process::exit(2);
        },
    };

    if let Err(e) = execute(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let formats = Arc::new(FormatTable::load_or_builtin(cli.formats.as_deref())?);

    match cli.command {
        Commands::Run => {
            let ingest_config = IngestConfig::from_env()?;
            let queue_config = QueueConfig::from_env()?;
            let pipeline = build_pipeline(&ingest_config, formats).await?;

            let queue = SqsQueue::connect(&queue_config).await?;
            let notifier: Arc<dyn ErrorNotifier> = match queue_config.error_queue_url {
                Some(ref url) => {
                    info!(error_queue = %url, "Failure reports go to the error queue");
                    Arc::new(QueueNotifier::new(queue.client().clone(), url.clone()))
                },
                None => Arc::new(LogNotifier),
            };

            let orchestrator =
                IngestOrchestrator::new(ingest_config, Arc::new(queue), pipeline, notifier);
            orchestrator.run(shutdown::signal()).await;
            Ok(())
        },

        Commands::Reprocess { bucket, key } => {
            let ingest_config = IngestConfig::from_env()?;
            let pipeline = build_pipeline(&ingest_config, formats).await?;

            let summary = pipeline.process_object(&ObjectRef { bucket, key }).await?;
            info!(
                work_id = %summary.work_id,
                pages = summary.pages,
                removed = summary.removed_images,
                batch = summary.batch_id.as_deref().unwrap_or("-"),
                "Object reprocessed"
            );
            Ok(())
        },

        Commands::Parse { file, name } => {
            let hint = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let registry_config = RegistryConfig::from_env()?;
            let extractor = TabularExtractor::new(formats, registry_config.image_space);

            let work = extractor.extract_path(&hint, &file)?;
            let record = serde_json::to_string_pretty(&work.to_record())
                .context("Failed to serialise record")?;
            println!("{}", record);
            info!(work_id = %work.id, pages = work.image_collection.len(), "Parsed file");
            Ok(())
        },
    }
}

async fn build_pipeline(config: &IngestConfig, formats: Arc<FormatTable>) -> Result<IngestPipeline> {
    let storage_config = StorageConfig::from_env()?;
    let storage = Arc::new(Storage::new(&storage_config).await?);

    let registry_config = RegistryConfig::from_env()?;
    registry_config.validate_for_ingest()?;
    let extractor = TabularExtractor::new(formats, registry_config.image_space);
    let registry = Arc::new(HttpRegistry::new(registry_config)?);

    Ok(IngestPipeline::new(
        config.scratch_dir.clone(),
        storage.clone(),
        extractor,
        MetadataStore::new(storage, storage_config.metadata_bucket),
        Reconciler::new(registry),
    ))
}
