//! streamwarden consumer
//!
//! Discovers every non-internal topic on the cluster, subscribes to them and
//! logs each message until SIGINT or SIGTERM. A background task keeps the
//! topic set in sync with the broker.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use streamwarden::{
    logging, shutdown, ActivityExit, AdminGate, Config, ConsumptionLoop, KafkaAdmin,
    KafkaEventSource, LoggingHandler, RefreshRoutine, ShutdownCoordinator, StopReason,
    TopicRegistry,
};

/// Time left to runtime tasks after the shutdown deadline has been served
const RUNTIME_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "consumer", version, about = "Consume every topic on the cluster")]
struct Args {
    /// Also consume internal topics (names starting with '_')
    #[arg(long)]
    include_internal: bool,
}

fn main() -> ExitCode {
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
    config.log_config();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting consumer");

    match shutdown::block_on_bounded(run(args, config), RUNTIME_GRACE) {
        Ok(Ok(())) => {
            info!("Consumer shutdown complete");
            ExitCode::SUCCESS
        },
        Ok(Err(e)) => {
            error!(error = %format!("{:#}", e), "Consumer failed");
            ExitCode::FAILURE
        },
        Err(e) => {
            error!(error = %e, "Failed to start the async runtime");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args, config: Config) -> anyhow::Result<()> {
    let admin = KafkaAdmin::new(&config.kafka).context("Failed to create admin client")?;
    let gate = AdminGate::new(
        admin,
        config.kafka.metadata_timeout(),
        config.kafka.delete_timeout(),
    );

    let topics = gate
        .list_topics(args.include_internal)
        .await
        .context("Failed to list topics")?;
    info!(count = topics.len(), topics = ?topics, "Discovered topics");

    let registry = Arc::new(TopicRegistry::with_topics(topics));
    let coordinator = ShutdownCoordinator::new();

    let refresh = RefreshRoutine::new(gate, Arc::clone(&registry), config.kafka.refresh_interval())
        .include_internal(args.include_internal)
        .spawn(coordinator.token());

    let source = KafkaEventSource::new(&config.kafka).context("Failed to create consumer")?;
    let consumption = ConsumptionLoop::new(
        source,
        LoggingHandler::new(),
        registry,
        config.kafka.poll_timeout(),
    )
    .resubscribe_on_change(config.kafka.resubscribe_on_change)
    .spawn(coordinator.token());

    coordinator.wait_for_signal().await;

    let deadline = config.runtime.shutdown_timeout();
    let (mut consumption_exit, _) = tokio::join!(
        coordinator.join_with_timeout(vec![("consumption_loop", consumption)], deadline),
        coordinator.join_with_timeout(vec![("topic_refresh", refresh)], deadline),
    );

    match consumption_exit.pop().map(|(_, exit)| exit) {
        Some(ActivityExit::Finished(Ok(summary))) => {
            info!(
                messages = summary.messages,
                handler_errors = summary.handler_errors,
                transport_errors = summary.transport_errors,
                "Consumption summary"
            );
            match summary.stop_reason {
                StopReason::Shutdown => Ok(()),
                reason @ StopReason::FatalTransportError { .. } => {
                    anyhow::bail!("Consumer stopped: {}", reason)
                },
            }
        },
        Some(ActivityExit::Finished(Err(e))) => Err(e).context("Consumption loop failed"),
        Some(ActivityExit::Failed(reason)) => anyhow::bail!("Consumption loop crashed: {}", reason),
        Some(ActivityExit::TimedOut) => {
            warn!("Exiting with the consumer still running");
            anyhow::bail!("Consumption loop did not stop within {:?}", deadline)
        },
        None => Ok(()),
    }
}
