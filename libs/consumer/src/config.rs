use serde::Deserialize;

use shardtap_api::StartPosition;

use crate::retry::RetryConfig;
use crate::ConsumerError;

/// Верхняя граница размера батча, которую принимают log service'ы.
pub const MAX_BATCH_LIMIT: usize = 10_000;

/// Конфигурация consumer'а одного шарда.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Откуда начинать: earliest | latest.
    #[serde(default)]
    pub start_position: StartPosition,
    /// Максимум записей в одном FetchNextBatch.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Пауза после пустого батча (0 — без паузы).
    #[serde(default)]
    pub idle_delay_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            start_position: StartPosition::default(),
            batch_limit: default_batch_limit(),
            idle_delay_ms: 0,
            retry: RetryConfig::default(),
        }
    }
}

fn default_batch_limit() -> usize {
    100
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<(), ConsumerError> {
        if self.batch_limit == 0 || self.batch_limit > MAX_BATCH_LIMIT {
            return Err(ConsumerError::InvalidConfig(format!(
                "batch_limit must be in 1..={MAX_BATCH_LIMIT}, got {}",
                self.batch_limit
            )));
        }
        self.retry.validate().map_err(ConsumerError::InvalidConfig)
    }
}
