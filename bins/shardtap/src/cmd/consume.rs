use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ConsumeArgs, SourceConfig};
use crate::error::AppError;
use crate::replay::ReplayFetcher;
use crate::sink::LogSink;
use payload_decoder::PayloadDecoder;
use shard_consumer::{RecordCounter, ShardConsumer};
use shardtap_api::ShardFetcher;

pub async fn run(args: ConsumeArgs) -> Result<(), AppError> {
    tracing::info!("shardtap starting");

    // --- Load config ---
    let config = AppConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Decoder ---
    let decoder = Arc::new(PayloadDecoder::new(&config.decoder)?);

    // --- Source ---
    let fetcher: Arc<dyn ShardFetcher> = match &config.source {
        SourceConfig::Replay { path, shard_id, follow } => {
            tracing::info!(path = %path.display(), shard = %shard_id, follow, "replay source");
            Arc::new(ReplayFetcher::new(path.clone(), shard_id.clone(), *follow))
        }
    };

    let mut consumer = ShardConsumer::new(fetcher, decoder, config.consumer.clone(), RecordCounter::new());
    let mut sink = LogSink::new(&config.sink);

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();
    let signal_token = token.clone();
    let signal_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down...");
            signal_token.cancel();
        }
    });

    let result = consumer.run(&mut sink, token).await;
    signal_handle.abort();

    let summary = result?;
    tracing::info!(
        records = summary.records,
        batches = summary.batches,
        exit = ?summary.exit,
        last_seq = consumer.counter().get(),
        "shutdown complete"
    );
    Ok(())
}
