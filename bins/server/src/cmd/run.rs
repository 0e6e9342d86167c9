use std::collections::HashSet;
use std::sync::Arc;

use bulk_writer::{BulkWriter, WriterError};
use sink_api::{BulkTransport, Record, TopicPartition};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use transport_elasticsearch::ElasticsearchTransport;

use crate::config::{RunArgs, SinkConfig};
use crate::error::ServerError;

pub async fn run(args: RunArgs) -> Result<(), ServerError> {
    tracing::info!(version = bulk_writer::VERSION, "search-sink starting");

    // --- Load config ---
    let config = SinkConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Transport + writer ---
    let transport: Arc<dyn BulkTransport> = Arc::new(ElasticsearchTransport::new(&config.connection)?);
    let writer = BulkWriter::start(config.writer.clone(), transport)?;

    // --- Ctrl+C → cooperative stop ---
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down...");
            signal_token.cancel();
        }
    });

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let pumped = pump(&writer, reader, &config, &token).await;
    if let Err(e) = &pumped {
        tracing::error!(error = %e, "stopping after error");
    }

    // stop всегда, даже после ошибки: транспорт должен закрыться
    let stopped = writer.stop().await;
    pumped?;
    stopped?;

    let stats = writer.stats();
    tracing::info!(
        accepted = stats.accepted,
        acknowledged = stats.acknowledged,
        skipped = stats.skipped_invalid,
        dropped = stats.dropped_rejected,
        "shutdown complete"
    );
    Ok(())
}

/// Читает записи построчно, пишет их чанками, периодически делает commit.
async fn pump(
    writer: &BulkWriter,
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    config: &SinkConfig,
    token: &CancellationToken,
) -> Result<(), ServerError> {
    let mut lines = reader.lines();
    let mut opened: HashSet<TopicPartition> = HashSet::new();
    let mut chunk: Vec<Record> = Vec::with_capacity(config.chunk_size);
    let mut line_no = 0usize;

    let mut commit_timer = tokio::time::interval(config.commit_interval());
    commit_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    commit_timer.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let record: Record = serde_json::from_str(&line)
                    .map_err(|e| ServerError::Input { line: line_no, detail: e.to_string() })?;

                let tp = record.topic_partition();
                if !opened.contains(&tp) {
                    writer.open_partitions(std::slice::from_ref(&tp)).await?;
                    opened.insert(tp);
                }

                chunk.push(record);
                if chunk.len() >= config.chunk_size {
                    writer.write(std::mem::take(&mut chunk)).await?;
                }
            }
            _ = commit_timer.tick() => {
                if !chunk.is_empty() {
                    writer.write(std::mem::take(&mut chunk)).await?;
                }
                commit(writer).await?;
            }
            _ = token.cancelled() => {
                tracing::info!(line = line_no, "input interrupted");
                break;
            }
        }
    }

    if !chunk.is_empty() {
        writer.write(chunk).await?;
    }
    commit(writer).await?;

    let mut partitions: Vec<TopicPartition> = opened.into_iter().collect();
    partitions.sort();
    writer.close_partitions(&partitions);
    Ok(())
}

/// Flush и лог offset'ов, которые теперь можно фиксировать.
///
/// Flush timeout не фатален: offset'ы просто не двигаются до следующего раза.
async fn commit(writer: &BulkWriter) -> Result<(), ServerError> {
    match writer.flush_default().await {
        Ok(()) => {}
        Err(e @ WriterError::FlushTimeout { .. }) => {
            tracing::warn!(error = %e, "commit skipped");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let mut offsets: Vec<(TopicPartition, i64)> = writer.acknowledged_offsets().into_iter().collect();
    offsets.sort();
    for (tp, offset) in offsets {
        tracing::info!(partition = %tp, offset, "committed");
    }
    Ok(())
}
