//! elb-stack: inspect and tear down the AWS resources of a load-balancer stack
//!
//! Resources are found through the ownership tags written by the deployer,
//! so both commands work without the stack definition that created them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use elb_stack_common::ResourceKind;
use elb_stack_deployer::aws::{AwsContext, CloudApi};
use elb_stack_deployer::config::DeployerConfig;
use elb_stack_deployer::deploy::StackDeployer;
use elb_stack_deployer::model::StackId;
use elb_stack_deployer::scan::DiscoveredResource;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "elb-stack")]
#[command(about = "Inspect and clean up AWS load-balancer stacks")]
#[command(version)]
struct Args {
    /// Deployer configuration file (JSON)
    #[arg(long, env = "ELB_STACK_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the AWS resources tagged for a stack
    Scan {
        /// Stack to scan, as namespace/name
        #[arg(long)]
        stack: StackId,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Delete every AWS resource tagged for a stack
    Cleanup {
        /// Stack to clean up, as namespace/name
        #[arg(long)]
        stack: StackId,

        /// Actually delete resources (default is dry-run)
        #[arg(long)]
        execute: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = DeployerConfig::load(&args.config)?;
    info!(
        cluster = %config.cluster_name,
        region = %config.region,
        vpc_id = %config.vpc_id,
        "Loaded configuration"
    );
    let aws = AwsContext::new(&config.region, config.endpoints.clone()).await;
    let cloud = CloudApi::from_context(&aws);
    let identity = cloud
        .sts("GetCallerIdentity")
        .get_caller_identity()
        .await
        .context("Failed to get AWS caller identity - check credentials")?;
    info!(account_id = %identity.account, arn = %identity.arn, "AWS account validated");
    let deployer = StackDeployer::new(&config, cloud);

    match args.command {
        Command::Scan { stack, format } => handle_scan(&deployer, &stack, format).await?,
        Command::Cleanup { stack, execute } => handle_cleanup(&deployer, &stack, execute).await?,
    }

    Ok(())
}

/// Handle the scan command
async fn handle_scan(deployer: &StackDeployer, stack: &StackId, format: OutputFormat) -> Result<()> {
    info!(stack = %stack, "Scanning for stack resources");
    let resources = deployer.scanner().scan(stack).await?;

    if resources.is_empty() {
        println!("No resources found for stack {stack}.");
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json_resources: Vec<_> = resources
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "kind": r.kind.as_str(),
                        "type": r.kind.type_name(),
                        "id": r.id,
                        "name": r.name,
                        "resource_id": r.resource_id,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json_resources)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    Cell::new("Kind"),
                    Cell::new("ID"),
                    Cell::new("Name"),
                    Cell::new("Resource ID"),
                ]);
            for r in &resources {
                table.add_row(vec![
                    Cell::new(r.kind.as_str()),
                    Cell::new(&r.id),
                    Cell::new(r.name.as_deref().unwrap_or("-")),
                    Cell::new(r.resource_id.as_deref().unwrap_or("-")),
                ]);
            }
            println!("{table}");
            println!("\nTotal: {} resources", resources.len());
        }
    }

    Ok(())
}

fn count_by_kind(resources: &[DiscoveredResource]) -> BTreeMap<ResourceKind, usize> {
    let mut counts = BTreeMap::new();
    for r in resources {
        *counts.entry(r.kind).or_insert(0) += 1;
    }
    counts
}

/// Handle the cleanup command
async fn handle_cleanup(deployer: &StackDeployer, stack: &StackId, execute: bool) -> Result<()> {
    let mode = if execute { "EXECUTE" } else { "DRY-RUN" };
    info!(stack = %stack, mode, "Cleaning up stack");

    let found = deployer.scanner().scan(stack).await?;

    println!("\n=== Cleanup Report ===");
    println!("Mode: {mode}");
    println!("Stack: {stack}");
    println!();
    println!("Resources found: {}", found.len());
    for (kind, count) in count_by_kind(&found) {
        println!("  {:<34} {count}", format!("{kind}:"));
    }
    println!();

    if !execute {
        println!("Run with --execute to actually delete resources.");
        return Ok(());
    }
    if found.is_empty() {
        println!("Nothing to delete.");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping cleanup");
            on_interrupt.cancel();
        }
    });

    deployer
        .cleanup(stack, &cancel)
        .await
        .with_context(|| format!("Cleanup of stack {stack} did not finish"))?;

    let remaining = deployer.scanner().scan(stack).await?;
    println!("Deleted: {}", found.len().saturating_sub(remaining.len()));
    println!("Remaining: {}", remaining.len());
    Ok(())
}
