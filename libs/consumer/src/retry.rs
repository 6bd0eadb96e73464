use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use shardtap_api::FetchError;

use crate::ConsumerState;

// ═══════════════════════════════════════════════════════════════
//  RetryConfig
// ═══════════════════════════════════════════════════════════════

/// Политика повторов для временных ошибок fetch.
///
/// Задержка перед повтором `n` (с 1): `min(initial * multiplier^(n-1), max)`.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Сколько попыток подряд может завершиться ошибкой; последняя из них фатальна.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: default_max_consecutive_failures(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_consecutive_failures() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
fn default_multiplier() -> f64 {
    2.0
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_consecutive_failures == 0 {
            return Err("retry.max_consecutive_failures must be at least 1".into());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!("retry.multiplier must be >= 1.0, got {}", self.multiplier));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        Ok(())
    }

    /// Задержка перед повтором после `attempt`-й ошибки подряд (с 1).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.initial_backoff_ms as f64 * self.multiplier.powi(exp);
        let capped = ms.min(self.max_backoff_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Retry loop
// ═══════════════════════════════════════════════════════════════

pub(crate) enum RetryError {
    /// Ошибка, которую не имеет смысла повторять.
    Fatal(FetchError),
    /// Лимит ошибок подряд исчерпан.
    Exhausted { attempts: u32, source: FetchError },
}

/// Ждать `delay`, прерываясь по отмене. `true` — отменено.
pub(crate) async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = token.cancelled() => true,
    }
}

/// Вызывать `call`, пока не будет успеха, фатальной ошибки или
/// исчерпания лимита. Между попытками — `Degraded` и пауза.
/// `Ok(None)` — отмена во время паузы.
pub(crate) async fn retrying<T, F, Fut>(
    retry: &RetryConfig,
    shard: &str,
    op: &'static str,
    token: &CancellationToken,
    state: &mut ConsumerState,
    mut call: F,
) -> Result<Option<T>, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let healthy = *state;
    let mut failures = 0u32;
    loop {
        match call().await {
            Ok(value) => {
                if failures > 0 {
                    tracing::info!(shard, op, failures, "recovered after transient errors");
                }
                *state = healthy;
                return Ok(Some(value));
            }
            Err(e) if e.is_retriable() => {
                failures += 1;
                if failures >= retry.max_consecutive_failures {
                    return Err(RetryError::Exhausted { attempts: failures, source: e });
                }
                *state = ConsumerState::Degraded { attempt: failures };
                let delay = retry.delay_for_attempt(failures);
                tracing::warn!(
                    shard,
                    op,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    error = ?e,
                    "transient error, backing off"
                );
                if sleep_or_cancel(delay, token).await {
                    return Ok(None);
                }
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let cfg = RetryConfig {
            max_consecutive_failures: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            multiplier: 2.0,
        };
        let delays: Vec<u64> = (1..=6).map(|n| cfg.delay_for_attempt(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(cfg.delay_for_attempt(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn defaults_from_empty_toml() {
        let cfg: RetryConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.max_consecutive_failures, 5);
        assert_eq!(cfg.delay_for_attempt(1), Duration::from_millis(100));
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let zero = RetryConfig { max_consecutive_failures: 0, ..Default::default() };
        assert!(zero.validate().is_err());
        let shrinking = RetryConfig { multiplier: 0.5, ..Default::default() };
        assert!(shrinking.validate().is_err());
        let inverted = RetryConfig { initial_backoff_ms: 50_000, ..Default::default() };
        assert!(inverted.validate().is_err());
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let cfg = RetryConfig { max_consecutive_failures: 3, initial_backoff_ms: 1, max_backoff_ms: 1, multiplier: 1.0 };
        let token = CancellationToken::new();
        let mut state = ConsumerState::Polling;
        let mut calls = 0;
        let result: Result<Option<()>, _> = retrying(&cfg, "s", "fetch", &token, &mut state, || {
            calls += 1;
            async { Err(FetchError::transient("throttled")) }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn restores_state_after_recovery() {
        let cfg = RetryConfig { initial_backoff_ms: 1, max_backoff_ms: 1, ..Default::default() };
        let token = CancellationToken::new();
        let mut state = ConsumerState::Polling;
        let mut calls = 0;
        let result = retrying(&cfg, "s", "fetch", &token, &mut state, || {
            calls += 1;
            let n = calls;
            async move {
                if n < 3 { Err(FetchError::transient("blip")) } else { Ok(n) }
            }
        })
        .await;
        assert!(matches!(result, Ok(Some(3))));
        assert_eq!(state, ConsumerState::Polling);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let cfg = RetryConfig { initial_backoff_ms: 60_000, max_backoff_ms: 60_000, ..Default::default() };
        let token = CancellationToken::new();
        token.cancel();
        let mut state = ConsumerState::Polling;
        let result: Result<Option<()>, _> = retrying(&cfg, "s", "fetch", &token, &mut state, || async {
            Err(FetchError::transient("blip"))
        })
        .await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(state, ConsumerState::Degraded { attempt: 1 });
    }
}
