use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use payload_decoder::DecoderConfig;
use shard_consumer::ConsumerConfig;

use crate::error::AppError;

#[derive(Parser)]
#[command(name = "shardtap", about = "Чтение шарда с восстановлением payload неизвестного формата")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Читать шард и печатать восстановленные записи
    Consume(ConsumeArgs),
    /// Восстановить payload из одного файла с сырыми байтами
    Decode(DecodeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConsumeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "shardtap.toml", env = "SHARDTAP_CONFIG")]
    pub config: String,
}

#[derive(Args, Clone, Debug)]
pub struct DecodeArgs {
    /// Файл с сырыми байтами записи
    pub file: PathBuf,
    /// Размер trailer'а (по умолчанию из [decoder] или 16)
    #[arg(long)]
    pub trailer_size: Option<usize>,
    /// Необязательный TOML конфиг, из которого берётся [decoder]
    #[arg(long, env = "SHARDTAP_CONFIG")]
    pub config: Option<String>,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

/// Откуда брать записи шарда.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSON-lines файл с записями (`sequence`, base64 `data`).
    Replay {
        path: PathBuf,
        #[serde(default = "default_shard_id")]
        shard_id: String,
        /// Ждать новых строк вместо закрытия шарда в конце файла.
        /// Нулевой `consumer.idle_delay_ms` заменяется на `FOLLOW_IDLE_DELAY_MS`.
        #[serde(default)]
        follow: bool,
    },
}

/// Пауза после пустого батча в режиме `follow`, если `idle_delay_ms` не задан.
pub const FOLLOW_IDLE_DELAY_MS: u64 = 500;

fn default_shard_id() -> String {
    "shardId-000000000000".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Печатать payload в stdout (по строке на запись, `\n` и `\r`
    /// внутри payload экранируются).
    #[serde(default)]
    pub print_payloads: bool,
    /// Сколько байт payload попадает в лог.
    #[serde(default = "default_max_logged_bytes")]
    pub max_logged_bytes: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            print_payloads: false,
            max_logged_bytes: default_max_logged_bytes(),
        }
    }
}

fn default_max_logged_bytes() -> usize {
    1024
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| match e {
                AppError::Config { context, detail } => {
                    AppError::Config { context, detail: format!("'{path}': {detail}") }
                }
                other => other,
            })
    }

    pub fn parse(content: &str) -> Result<Self, AppError> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config { context: "parse", detail: e.to_string() })?;
        // Хвост файла без паузы означает непрерывный опрос
        if matches!(config.source, SourceConfig::Replay { follow: true, .. })
            && config.consumer.idle_delay_ms == 0
        {
            config.consumer.idle_delay_ms = FOLLOW_IDLE_DELAY_MS;
        }
        config.consumer.validate()?;
        config.decoder.validate()?;
        Ok(config)
    }
}
