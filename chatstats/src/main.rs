//! chatstats-report - answer a statistics request from event snapshots
//!
//! Reads a request body, runs it against JSON snapshots of the bot's inputs
//! and users, and prints the response body the reporting endpoint would send.

use anyhow::{Context, Result};
use chatstats_core::config::parse_timezone;
use chatstats_core::stats::list_scopes;
use chatstats_core::{Config, JsonFileStore, StatisticsService};
use clap::Parser;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "chatstats-report")]
#[command(about = "Compute bot usage statistics from event snapshots")]
#[command(version)]
struct Args {
    /// Request body file ("-" reads stdin)
    #[arg(short, long, required_unless_present = "list_scopes")]
    request: Option<String>,

    /// Input events snapshot (overrides store.inputs_path)
    #[arg(long)]
    inputs: Option<PathBuf>,

    /// User records snapshot (overrides store.users_path)
    #[arg(long)]
    users: Option<PathBuf>,

    /// IANA timezone for bucket alignment (overrides stats.timezone)
    #[arg(long)]
    timezone: Option<String>,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,

    /// List available scopes and exit
    #[arg(long)]
    list_scopes: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.list_scopes {
        println!("Available scopes:");
        for descriptor in list_scopes() {
            println!(
                "  - {:<22} {:<8} {}",
                descriptor.scope.as_str(),
                descriptor.dataset.as_str(),
                descriptor.summary
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    // Environment is only touched here, before any runtime thread exists
    Config::ensure_xdg_env();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(report(args))
}

async fn report(args: Args) -> Result<ExitCode> {
    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        chatstats_core::logging::init(&config.logging).context("failed to initialize logging")?;

    if let Some(path) = args.inputs {
        config.store.inputs_path = Some(path);
    }
    if let Some(path) = args.users {
        config.store.users_path = Some(path);
    }
    let tz = match &args.timezone {
        Some(name) => parse_timezone(name)?,
        None => config.stats.timezone()?,
    };

    // Unset snapshot paths only fail if the request needs that dataset
    let store = JsonFileStore::from_config(&config.store);
    let service = StatisticsService::new(store, tz);

    let raw = read_request(args.request.as_deref().unwrap_or("-"))?;
    // A body that is not JSON is handled like a missing body
    let body: Option<Value> = serde_json::from_str(&raw).ok();

    let (status, response) = service.respond(body.as_ref()).await;
    tracing::info!(status, "request answered");

    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", output);

    Ok(if status == 200 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn read_request(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read request file {}", source))
    }
}
