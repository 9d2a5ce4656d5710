use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use post_search::telemetry::init_logging;
use post_search::{AppError, Dependencies, Settings};
use post_search_shared::{NewPost, Post, PostChanges, RecordId, SearchQuery, DEFAULT_PAGE_SIZE};
use post_search_sync::{IndexSync, SyncOutcome, SyncRepository};

#[derive(Parser)]
#[command(name = "post-search")]
#[command(about = "Manage posts and keep their search index in sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the search index if it does not exist
    EnsureIndex,
    /// Create a post
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        content: String,
    },
    /// Update some fields of a post
    #[command(group(ArgGroup::new("changes").required(true).multiple(true)))]
    Update {
        id: RecordId,
        #[arg(long, group = "changes")]
        name: Option<String>,
        #[arg(long, group = "changes")]
        content: Option<String>,
    },
    /// Delete a post
    Delete { id: RecordId },
    /// Full-text search over posts
    Search {
        text: String,
        /// Offset of the first hit
        #[arg(long, default_value_t = 0)]
        from: usize,
        /// Number of hits to return
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: usize,
    },
    /// Show a post, its index status and its indexed document
    Get { id: RecordId },
    /// Bulk-index every post in the record store
    Reindex,
    /// Retry index operations for stale posts
    Retry,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(settings.log_format);

    let deps = match Dependencies::new(&settings).await {
        Ok(deps) => deps,
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::select! {
        result = run(cli.command, &deps.repository) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    deps.shutdown().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, repository: &SyncRepository<Post>) -> Result<(), AppError> {
    match command {
        Commands::EnsureIndex => {
            repository.ensure_index().await?;
            print_json(&json!({ "index": repository.index_name(), "ready": true }));
        }
        Commands::Create { name, content } => {
            let outcome = repository.create(NewPost::new(name, content)).await?;
            print_outcome(&outcome);
        }
        Commands::Update { id, name, content } => {
            let outcome = repository
                .update(id, PostChanges { name, content })
                .await?;
            print_outcome(&outcome);
        }
        Commands::Delete { id } => {
            let outcome = repository.delete(id).await?;
            print_json(&json!({ "deleted": id, "index": index_json(&outcome.index) }));
        }
        Commands::Search { text, from, size } => {
            let response = repository
                .search(SearchQuery::new(text).with_page(from, size))
                .await?;
            print_json(&json!(response));
        }
        Commands::Get { id } => {
            let post = repository
                .find(id)
                .await?
                .ok_or(post_search_sync::SyncError::NotFound(id))?;

            let document = match repository.indexed_document(id).await {
                Ok(document) => document.map(|d| d.to_json()),
                Err(e) => {
                    warn!(record_id = %id, error = %e, "Could not read indexed document");
                    None
                }
            };

            let index_status = match repository.load_index_status(id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(record_id = %id, error = %e, "Could not load index status");
                    repository.index_status(id)
                }
            };

            print_json(&json!({
                "record": post,
                "index_status": index_status.as_str(),
                "indexed_document": document,
            }));
        }
        Commands::Reindex => {
            let summary = repository.reindex_all().await?;
            let failed: Vec<&str> = summary.failures().map(|r| r.id.as_str()).collect();
            print_json(&json!({
                "total": summary.total,
                "succeeded": summary.succeeded,
                "failed": failed,
            }));
        }
        Commands::Retry => {
            let report = repository.retry_stale().await?;
            print_json(&json!({
                "attempted": report.attempted,
                "recovered": report.recovered,
                "failed": report.failed,
                "abandoned": report.abandoned,
            }));
        }
    }

    Ok(())
}

fn index_json(index: &IndexSync) -> Value {
    match index {
        IndexSync::Indexed => json!({ "status": "indexed" }),
        IndexSync::Removed => json!({ "status": "removed" }),
        IndexSync::Enqueued { job_id } => json!({ "status": "enqueued", "job_id": job_id.to_string() }),
        IndexSync::Stale(e) => json!({ "status": "stale", "warning": e.to_string() }),
    }
}

fn print_outcome(outcome: &SyncOutcome<Post>) {
    print_json(&json!({
        "record": outcome.value,
        "index": index_json(&outcome.index),
    }));
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to render output: {}", e),
    }
}
