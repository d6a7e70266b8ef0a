//! streamwarden cleanup
//!
//! Permanently deletes topics, asking the operator to type `yes` for each
//! one. Any other answer aborts the remaining deletions.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};

use streamwarden::{logging, AdminGate, Config, KafkaAdmin, StdinConfirmer};

#[derive(Parser, Debug)]
#[command(name = "cleanup", version, about = "Delete topics after confirmation")]
struct Args {
    /// Topics to delete, in order
    #[arg(required = true)]
    topics: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::from_env().and_then(|config| config.validate().map(|()| config)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = logging::init_tracing(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(args, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Cleanup failed");
            ExitCode::FAILURE
        },
    }
}

/// Returns whether every topic was deleted
async fn run(args: Args, config: Config) -> anyhow::Result<bool> {
    let admin = KafkaAdmin::new(&config.kafka).context("Failed to create admin client")?;
    let gate = AdminGate::new(
        admin,
        config.kafka.metadata_timeout(),
        config.kafka.delete_timeout(),
    );

    let mut confirmer = StdinConfirmer::new();
    let report = gate.delete_topics(&args.topics, &mut confirmer).await;

    if let Some(topic) = &report.aborted_at {
        warn!(
            topic = %topic,
            deleted = ?report.deleted,
            skipped = ?report.skipped,
            "Aborting"
        );
    }

    for (topic, reason) in &report.failed {
        error!(topic = %topic, reason = %reason, "Topic was not deleted");
    }

    info!(
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "Cleanup finished"
    );

    Ok(report.is_complete())
}
