//! ingestctl - command-line client for the ingestion worker daemon

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9531";

#[derive(Parser)]
#[command(name = "ingestctl")]
#[command(about = "Document ingestion queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "INGEST_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(clap::Args)]
struct Scope {
    #[arg(long)]
    tenant: String,

    #[arg(long)]
    workspace: String,

    #[arg(long)]
    kb: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue ingestion of an existing document version
    Enqueue {
        #[command(flatten)]
        scope: Scope,

        #[arg(long)]
        document: String,

        #[arg(long)]
        version: String,

        /// upload or reindex
        #[arg(long, default_value = "upload")]
        action: String,

        /// Client-supplied idempotency token
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Upload a file as a new document version and enqueue it
    Upload {
        file: PathBuf,

        #[command(flatten)]
        scope: Scope,

        /// Stored file name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Re-run ingestion of a document's current version
    Reindex {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        document: String,

        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Show a job's status
    Job {
        job_id: String,

        /// Only show the job if it belongs to this tenant
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Show queue counts
    Stats,

    /// List dead-lettered jobs
    DeadLetters {
        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct EnqueueResult {
    job_id: String,
    status: String,
    stage: String,
    created: bool,
}

#[derive(Deserialize, Tabled)]
struct UploadResult {
    document_id: String,
    version: i32,
    object_key: String,
    job_id: String,
    job_status: String,
}

#[derive(Deserialize)]
struct JobView {
    job_id: String,
    document_id: String,
    document_version_id: String,
    status: String,
    stage: String,
    progress: i32,
    attempt_count: i32,
    max_attempts: i32,
    next_run_at: i64,
    locked_by: Option<String>,
    error: Option<String>,
    terminal: bool,
}

#[derive(Deserialize, Tabled)]
struct DeadLetterRow {
    job_id: String,
    document_id: String,
    action: String,
    #[tabled(rename = "attempts")]
    attempt_count: i32,
    #[tabled(display_with = "display_error")]
    error: Option<String>,
}

#[derive(Deserialize)]
struct DeadLetters {
    jobs: Vec<DeadLetterRow>,
}

fn display_error(error: &Option<String>) -> String {
    const MAX: usize = 60;
    match error {
        Some(e) if e.chars().count() > MAX => format!("{}...", e.chars().take(MAX).collect::<String>()),
        Some(e) => e.clone(),
        None => String::new(),
    }
}

fn colored_status(status: &str) -> ColoredString {
    match status {
        "completed" => status.green().bold(),
        "processing" => status.cyan().bold(),
        "retrying" => status.yellow().bold(),
        "dead_letter" => status.red().bold(),
        _ => status.normal(),
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_enqueue(result: serde_json::Value) -> Result<()> {
    let result: EnqueueResult = serde_json::from_value(result)?;
    if result.created {
        println!("{}", "✓ Job enqueued".green().bold());
    } else {
        println!("{}", "○ Existing job returned (idempotent)".yellow().bold());
    }
    println!();
    println!("{}", Table::new(vec![result]));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Enqueue {
            scope,
            document,
            version,
            action,
            idempotency_key,
        } => {
            let params = json!({
                "tenant_id": scope.tenant,
                "workspace_id": scope.workspace,
                "kb_id": scope.kb,
                "document_id": document,
                "document_version_id": version,
                "action": action,
                "idempotency_key": idempotency_key,
            });
            let result = call_rpc(&cli.rpc_url, "ingest.enqueue.v1", params).await?;
            print_enqueue(result)?;
        }

        Commands::Upload {
            file,
            scope,
            name,
            idempotency_key,
        } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("File path has no file name")?,
            };

            let params = json!({
                "tenant_id": scope.tenant,
                "workspace_id": scope.workspace,
                "kb_id": scope.kb,
                "filename": filename,
                "content_base64": STANDARD.encode(&bytes),
                "idempotency_key": idempotency_key,
            });
            let result = call_rpc(&cli.rpc_url, "ingest.upload.v1", params).await?;
            let upload: UploadResult = serde_json::from_value(result)?;

            println!(
                "{}",
                format!("✓ Uploaded {} ({} bytes)", filename, bytes.len())
                    .green()
                    .bold()
            );
            println!();
            println!("{}", Table::new(vec![upload]));
        }

        Commands::Reindex {
            tenant,
            document,
            idempotency_key,
        } => {
            let params = json!({
                "tenant_id": tenant,
                "document_id": document,
                "idempotency_key": idempotency_key,
            });
            let result = call_rpc(&cli.rpc_url, "ingest.reindex.v1", params).await?;
            print_enqueue(result)?;
        }

        Commands::Job { job_id, tenant } => {
            let params = json!({ "job_id": job_id, "tenant_id": tenant });
            let result = call_rpc(&cli.rpc_url, "ingest.job.v1", params).await?;
            let job: JobView = serde_json::from_value(result)?;

            println!("{} {}", "Job".cyan().bold(), job.job_id);
            println!();
            println!("  {} {}", "Status:".bold(), colored_status(&job.status));
            println!("  {} {} ({}%)", "Stage:".bold(), job.stage, job.progress);
            println!(
                "  {} {}/{}",
                "Attempts:".bold(),
                job.attempt_count,
                job.max_attempts
            );
            println!(
                "  {} {} / {}",
                "Document:".bold(),
                job.document_id,
                job.document_version_id
            );
            if let Some(worker) = &job.locked_by {
                println!("  {} {}", "Locked by:".bold(), worker);
            }
            if !job.terminal {
                println!("  {} {} (epoch ms)", "Next run:".bold(), job.next_run_at);
            }
            if let Some(error) = &job.error {
                println!("  {} {}", "Error:".bold(), error.red());
            }
        }

        Commands::Stats => {
            println!("{}", "Queue Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Queued:".bold(), stats["queued_jobs"]);
                    println!("  {} {}", "Processing:".bold(), stats["processing_jobs"]);
                    println!("  {} {}", "Retrying:".bold(), stats["retrying_jobs"]);
                    println!("  {} {}", "Completed:".bold(), stats["completed_jobs"]);
                    println!(
                        "  {} {}",
                        "Dead letter:".bold(),
                        stats["dead_letter_jobs"].to_string().red()
                    );
                    println!();
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::DeadLetters { limit } => {
            let result =
                call_rpc(&cli.rpc_url, "admin.dead_letters.v1", json!({ "limit": limit })).await?;
            let dead: DeadLetters = serde_json::from_value(result)?;

            if dead.jobs.is_empty() {
                println!("{}", "✓ No dead-lettered jobs".green().bold());
            } else {
                println!(
                    "{}",
                    format!("{} dead-lettered job(s)", dead.jobs.len()).red().bold()
                );
                println!();
                println!("{}", Table::new(dead.jobs));
            }
        }
    }

    Ok(())
}
