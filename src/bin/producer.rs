//! streamwarden producer
//!
//! Publishes randomly generated user records to one topic, waiting for each
//! delivery report before sending the next message.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};

use streamwarden::{logging, Config, KafkaMessageSink, ProduceConfirmer, SampleUser};

#[derive(Parser, Debug)]
#[command(name = "producer", version, about = "Publish sample messages to a topic")]
struct Args {
    /// Destination topic
    topic: String,

    /// Number of messages to publish
    count: u64,

    /// Schema registry mode (accepted, payloads are still plain JSON)
    #[arg(short = 's', long)]
    schema_registry: bool,
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
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Producer failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args, config: Config) -> anyhow::Result<()> {
    if args.schema_registry {
        warn!(
            url = %config.kafka.schema_registry_url,
            "Schema registry mode requested; messages are published as plain JSON"
        );
    }

    let sink = KafkaMessageSink::new(&config.kafka).context("Failed to create producer")?;
    let producer = ProduceConfirmer::new(sink, config.kafka.delivery_timeout());

    info!(topic = %args.topic, count = args.count, "Publishing random messages");

    let mut published = 0;
    for number in 1..=args.count {
        let message = SampleUser::random()
            .to_message(&args.topic, number, Utc::now())
            .context("Failed to serialize sample message")?;

        let report = producer
            .publish_message(message)
            .await
            .with_context(|| format!("Failed to publish message {}", number))?;

        published += 1;
        info!(
            number,
            partition = report.partition,
            offset = report.offset,
            "Published message"
        );
    }

    producer
        .flush(config.kafka.delivery_timeout())
        .context("Failed to flush producer")?;

    info!(topic = %args.topic, published, "All messages published");
    Ok(())
}
