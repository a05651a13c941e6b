use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use kafka_leader_client::adapters::protocol::dto::ErrorCode;
use kafka_leader_client::{
    Configuration, ConnectionFactory, FetchRequest, KafkaMessageBatch, KafkaTemplate, Partition,
    PartitionResult, ReferenceTime,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StartFrom {
    Earliest,
    Latest,
}

/// Fetch one batch of messages from the leader of a partition.
#[derive(Debug, Parser)]
#[command(name = "kafka-fetch", version)]
struct Args {
    /// Seed brokers, e.g. "kafka-1:9092,kafka-2"
    #[arg(long, conflicts_with = "config")]
    brokers: Option<String>,

    /// Client configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    topic: String,

    #[arg(long, default_value_t = 0)]
    partition: u32,

    /// Start offset; overrides --group and --from
    #[arg(long)]
    offset: Option<i64>,

    /// Where to start when no offset is known
    #[arg(long, value_enum, default_value_t = StartFrom::Earliest)]
    from: StartFrom,

    /// Consumer group whose stored offset is used as the start
    #[arg(long)]
    group: Option<String>,

    /// Commit the offset after the last printed message for --group
    #[arg(long, requires = "group")]
    commit: bool,

    #[arg(long, default_value_t = 1024 * 1024)]
    max_bytes: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let configuration = match (&args.brokers, &args.config) {
        (Some(brokers), None) => Configuration::from_brokers(brokers)?,
        (None, Some(path)) => Configuration::from_file(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        _ => bail!("exactly one of --brokers or --config is required"),
    };
    let backoff = configuration.backoff();

    let factory = Arc::new(ConnectionFactory::new(configuration));
    let template = KafkaTemplate::new(Arc::clone(&factory));
    let partition = Partition::new(args.topic.clone(), args.partition);

    let outcome = run(&args, &factory, &template, &partition, backoff).await;
    factory.destroy().await;
    outcome
}

async fn run(
    args: &Args,
    factory: &ConnectionFactory,
    template: &KafkaTemplate,
    partition: &Partition,
    backoff: std::time::Duration,
) -> Result<()> {
    let leader = factory.get_leader(partition).await?;
    info!(%partition, %leader, "resolved leader");

    let offset = start_offset(args, factory, partition).await?;
    let request = FetchRequest::new(partition.clone(), offset, args.max_bytes)?;

    let mut result = template.receive(std::slice::from_ref(&request)).await?;
    if let Some(code) = result.error(partition).filter(|code| ErrorCode::is_leadership_error(*code)) {
        // one retry after the leader moved
        warn!(%partition, code, ?backoff, "leader changed, retrying once");
        tokio::time::sleep(backoff).await;
        factory.refresh_metadata(&[partition.topic().to_string()]).await?;
        result = template.receive(std::slice::from_ref(&request)).await?;
    }

    let batch = take_batch(result, partition)?;
    info!(
        %partition,
        offset,
        count = batch.messages().len(),
        high_watermark = batch.high_watermark(),
        "fetched"
    );
    for message in batch.messages() {
        let key = message.key.as_deref().map(String::from_utf8_lossy);
        let payload = message.payload.as_deref().map(String::from_utf8_lossy);
        println!(
            "{}\t{}\t{}",
            message.offset(),
            key.as_deref().unwrap_or("-"),
            payload.as_deref().unwrap_or("-")
        );
    }

    if args.commit {
        if let (Some(group), Some(next)) = (&args.group, batch.next_offset()) {
            let connection = factory.connect(&factory.get_leader(partition).await?).await;
            let offsets = HashMap::from([(partition.clone(), next)]);
            let committed = connection.commit_offsets_for_consumer(group, &offsets).await?;
            if let Some(code) = committed.error(partition) {
                bail!("commit for {} failed with error code {}", partition, code);
            }
            info!(%partition, group = %group, next, "committed");
        }
    }

    Ok(())
}

async fn start_offset(args: &Args, factory: &ConnectionFactory, partition: &Partition) -> Result<i64> {
    if let Some(offset) = args.offset {
        return Ok(offset);
    }

    let connection = factory.connect(&factory.get_leader(partition).await?).await;
    let partitions = std::slice::from_ref(partition);

    if let Some(group) = &args.group {
        let stored = connection.fetch_stored_offsets_for_consumer(group, partitions).await?;
        match (stored.result(partition), stored.error(partition)) {
            (Some(offset), _) if *offset >= 0 => return Ok(*offset),
            (_, Some(code)) => warn!(%partition, group = %group, code, "no stored offset"),
            _ => {}
        }
    }

    let reference_time = match args.from {
        StartFrom::Earliest => ReferenceTime::Earliest,
        StartFrom::Latest => ReferenceTime::Latest,
    };
    let initial = connection.fetch_initial_offset(reference_time, partitions).await?;
    match (initial.result(partition), initial.error(partition)) {
        (Some(offset), _) => Ok(*offset),
        (_, Some(code)) => bail!("offset lookup for {} failed with error code {}", partition, code),
        _ => Err(anyhow!("no offset returned for {}", partition)),
    }
}

fn take_batch(result: PartitionResult<KafkaMessageBatch>, partition: &Partition) -> Result<KafkaMessageBatch> {
    if let Some(code) = result.error(partition) {
        bail!("fetch from {} failed with error code {}", partition, code);
    }
    let (mut results, _) = result.into_parts();
    results
        .remove(partition)
        .ok_or_else(|| anyhow!("no data returned for {}", partition))
}
