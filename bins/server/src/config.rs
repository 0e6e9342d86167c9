use std::time::Duration;

use bulk_writer::WriterConfig;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use transport_elasticsearch::ConnectionConfig;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "search-sink", about = "Запись потока записей в Elasticsearch")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Прочитать JSON-lines записи и записать их в индексы
    Run(RunArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,

    /// Файл с записями (JSON lines). По умолчанию stdin.
    #[arg(long)]
    pub input: Option<String>,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct SinkConfig {
    pub connection: ConnectionConfig,
    pub writer: WriterConfig,
    /// Период flush + фиксации offset'ов.
    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,
    /// Сколько записей передавать в один `write`.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_commit_interval_ms() -> u64 {
    5_000
}
fn default_chunk_size() -> usize {
    500
}

impl SinkConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content).map_err(|e| match e {
            ServerError::Config { context, detail } => {
                ServerError::Config { context, detail: format!("'{path}': {detail}") }
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::Config { context: "parse", detail: e.to_string() })?;
        if config.commit_interval_ms == 0 || config.chunk_size == 0 {
            return Err(ServerError::Config {
                context: "validate",
                detail: "commit_interval_ms and chunk_size must be positive".into(),
            });
        }
        Ok(config)
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }
}
