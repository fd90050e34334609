//! Verba CLI - command-line client for the Verba job engine

mod sse;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};
use verba_core::application::DeliveryEvent;

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";
const DEFAULT_HTTP_URL: &str = "http://127.0.0.1:30319";

#[derive(Parser)]
#[command(name = "verba")]
#[command(about = "Verba job engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "VERBA_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// HTTP/SSE server URL (used by `watch`)
    #[arg(long, env = "VERBA_HTTP_URL", default_value = DEFAULT_HTTP_URL)]
    http_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job (several inputs run as one batch)
    Submit {
        /// Job kind: audio, video or summary
        #[arg(short, long)]
        kind: String,

        /// Input files
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Settings as a JSON object
        #[arg(short, long, default_value = "{}")]
        settings: String,

        /// Display label
        #[arg(short, long)]
        label: Option<String>,

        /// Stream progress until the job finishes
        #[arg(short, long)]
        watch: bool,
    },

    /// Show one job
    Status {
        /// Job ID
        job_id: String,
    },

    /// List recent jobs
    List {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        #[arg(long)]
        kind: Option<String>,

        #[arg(long)]
        status: Option<String>,
    },

    /// Cancel a job
    Cancel {
        /// Job ID
        job_id: String,
    },

    /// Remove a finished job
    Remove {
        /// Job ID
        job_id: String,
    },

    /// Stream a job's progress until it finishes
    Watch {
        /// Job ID
        job_id: String,
    },

    /// Show engine statistics
    Stats,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct JobRow {
    id: String,
    kind: String,
    label: String,
    status: String,
    #[tabled(rename = "%")]
    progress_percent: u8,
    #[tabled(rename = "message")]
    progress_message: String,
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
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

fn colored_status(status: &str) -> String {
    match status {
        "COMPLETED" => status.green().to_string(),
        "FAILED" => status.red().to_string(),
        "CANCELLED" => status.yellow().to_string(),
        "RUNNING" => status.cyan().to_string(),
        _ => status.to_string(),
    }
}

fn print_event(event: &DeliveryEvent) {
    match event {
        DeliveryEvent::Progress(p) => {
            println!("{} {}", format!("{:>3}%", p.percent).cyan().bold(), p.message)
        }
        DeliveryEvent::Log(line) => println!("     {}", line.message.dimmed()),
        DeliveryEvent::Complete(done) => {
            println!("{}", "✓ Completed".green().bold());
            println!("{}", serde_json::to_string_pretty(&done.result).unwrap_or_default());
        }
        DeliveryEvent::Error(err) => {
            println!("{} {}", format!("✗ {}", err.kind).red().bold(), err.message)
        }
    }
}

async fn watch(http_url: &str, job_id: &str) -> Result<()> {
    println!("{}", format!("Watching job {}", job_id).cyan().bold());
    match sse::watch(http_url, job_id, print_event).await? {
        Some(DeliveryEvent::Complete(_)) => Ok(()),
        Some(_) => std::process::exit(1),
        None => anyhow::bail!("Event stream ended before the job finished"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            kind,
            inputs,
            settings,
            label,
            watch: follow,
        } => {
            let settings: Value = serde_json::from_str(&settings).context("Invalid JSON settings")?;
            let mut params = json!({
                "kind": kind.to_lowercase(),
                "inputs": inputs,
                "settings": settings,
            });
            if let Some(label) = label {
                params["label"] = json!(label);
            }

            let result = call_rpc(&cli.rpc_url, "job.submit.v1", params).await?;
            let job_id = result["job_id"].as_str().unwrap_or_default().to_string();
            println!("{}", "✓ Job submitted".green().bold());
            println!("  {} {}", "ID:".bold(), job_id);
            println!("  {} {}", "Label:".bold(), result["label"].as_str().unwrap_or_default());

            if follow {
                println!();
                watch(&cli.http_url, &job_id).await?;
            }
        }

        Commands::Status { job_id } => {
            let snap = call_rpc(&cli.rpc_url, "job.get.v1", json!({ "job_id": job_id })).await?;
            let status = snap["status"].as_str().unwrap_or_default();
            println!("{}", format!("Job {}", job_id).cyan().bold());
            println!("  {} {}", "Label:".bold(), snap["label"].as_str().unwrap_or_default());
            println!("  {} {}", "Kind:".bold(), snap["kind"].as_str().unwrap_or_default());
            println!("  {} {}", "Status:".bold(), colored_status(status));
            println!(
                "  {} {}% {}",
                "Progress:".bold(),
                snap["progress_percent"],
                snap["progress_message"].as_str().unwrap_or_default()
            );
            if let Some(err) = snap.get("error").filter(|e| !e.is_null()) {
                println!(
                    "  {} {} {}",
                    "Error:".bold(),
                    err["kind"].as_str().unwrap_or_default().red(),
                    err["message"].as_str().unwrap_or_default()
                );
            }
            if let Some(result) = snap.get("result").filter(|r| !r.is_null()) {
                println!("  {} {}", "Result:".bold(), result);
            }
            if let Some(lines) = snap["log"].as_array() {
                println!();
                for line in lines {
                    println!("  {}", line["message"].as_str().unwrap_or_default().dimmed());
                }
            }
        }

        Commands::List {
            limit,
            kind,
            status,
        } => {
            let mut params = json!({ "limit": limit });
            if let Some(kind) = kind {
                params["kind"] = json!(kind.to_lowercase());
            }
            if let Some(status) = status {
                params["status"] = json!(status.to_uppercase());
            }

            let result = call_rpc(&cli.rpc_url, "job.list.v1", params).await?;
            let rows: Vec<JobRow> = serde_json::from_value(result["jobs"].clone())?;
            if rows.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Cancel { job_id } => {
            let params = json!({ "job_id": job_id });
            let result = call_rpc(&cli.rpc_url, "job.cancel.v1", params).await?;
            if result["status"] == "CANCELLED" {
                println!("{}", format!("✓ Job {} cancelled", job_id).green().bold());
            } else {
                let line = format!("✓ Cancellation requested for job {}", job_id);
                println!("{}", line.green().bold());
            }
        }

        Commands::Remove { job_id } => {
            call_rpc(&cli.rpc_url, "job.remove.v1", json!({ "job_id": job_id })).await?;
            println!("{}", format!("✓ Job {} removed", job_id).green().bold());
        }

        Commands::Watch { job_id } => {
            watch(&cli.http_url, &job_id).await?;
        }

        Commands::Stats => {
            println!("{}", "Engine Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    let jobs = &stats["jobs"];
                    let pool = &stats["pool"];
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    let version = stats["version"].as_str().unwrap_or_default();
                    println!("  {} {}", "Version:".bold(), version);
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), jobs["total"]);
                    println!("  {} {}", "Pending:".bold(), jobs["pending"]);
                    println!("  {} {}", "Running:".bold(), jobs["running"]);
                    println!("  {} {}", "Completed:".bold(), jobs["completed"]);
                    println!("  {} {}", "Failed:".bold(), jobs["failed"]);
                    println!("  {} {}", "Cancelled:".bold(), jobs["cancelled"]);
                    println!();
                    println!(
                        "  {} {} workers, {} running, {} queued (capacity {})",
                        "Pool:".bold(),
                        pool["workers"],
                        pool["running"],
                        pool["queued"],
                        pool["capacity"]
                    );
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
