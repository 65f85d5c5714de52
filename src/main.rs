use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use transit_events::kafka::{KafkaTopicAdmin, SchemaPair, TopicProvisioning, TopicSpec};
use transit_events::{Config, EventProducer, TopicRegistry};

#[derive(Parser, Debug)]
#[command(name = "transit-events")]
#[command(about = "Kafka producer for transit weather events", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the configured topic if the broker does not have it yet
    EnsureTopic,
    /// Produce a single weather reading to the configured topic
    EmitWeather {
        #[arg(long)]
        temperature: f64,

        #[arg(long, default_value = "sunny")]
        status: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting transit-events");
    info!("Loading configuration from {:?}", args.config);

    let config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        kafka_brokers = ?config.kafka.brokers,
        schema_registry = %config.kafka.schema_registry_url,
        client_id = %config.kafka.client_id,
        topic = %config.topic.name,
        partitions = config.topic.partitions,
        replicas = config.topic.replicas,
        "Configuration summary"
    );

    let registry = TopicRegistry::shared();

    match args.command {
        Command::EnsureTopic => {
            let admin = KafkaTopicAdmin::new(&config.kafka)?;
            let spec = TopicSpec::from_settings(&config.topic)?;

            match registry.ensure_topic(&admin, &spec).await {
                TopicProvisioning::Failed(reason) => {
                    error!("Topic '{}' could not be provisioned: {}", spec.name, reason)
                }
                outcome => info!("Topic '{}' provisioned: {:?}", spec.name, outcome),
            }
        }
        Command::EmitWeather { temperature, status } => {
            let mut producer = EventProducer::connect(
                config.topic.clone(),
                SchemaPair::weather()?,
                &config.kafka,
                &registry,
            )
            .await
            .context("failed to start weather producer")?;

            let key = json!({ "timestamp": producer.time_millis() });
            let value = json!({ "temperature": temperature, "status": status.as_str() });

            let sent = producer.produce(&key, &value).await;
            producer.close().await?;
            sent.context("failed to emit weather reading")?;

            info!(temperature, status = %status, "Weather reading emitted");
        }
    }

    Ok(())
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("transit_events=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("transit_events=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
