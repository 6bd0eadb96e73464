use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use payload_decoder::PayloadDecoder;
use shardtap_api::{Batch, Cursor, PayloadSink, ShardFetcher};

use crate::config::ConsumerConfig;
use crate::counter::RecordCounter;
use crate::retry::{RetryError, retrying, sleep_or_cancel};
use crate::ConsumerError;

// ═══════════════════════════════════════════════════════════════
//  State / Summary
// ═══════════════════════════════════════════════════════════════

/// Состояние цикла чтения шарда.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Получение стартового курсора.
    Acquiring,
    /// Нормальный цикл fetch → decode → sink.
    Polling,
    /// Последний запрос завершился временной ошибкой, идёт backoff.
    Degraded { attempt: u32 },
    /// Цикл завершён (отмена, закрытие шарда или фатальная ошибка).
    Stopped,
}

/// Почему `run` вернул управление без ошибки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitReason {
    #[default]
    Cancelled,
    /// Log service вернул пустой next cursor.
    ShardClosed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: u64,
    pub batches: u64,
    pub exit: ExitReason,
}

/// Итог обработки одного батча.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub records: usize,
    pub shard_closed: bool,
}

// ═══════════════════════════════════════════════════════════════
//  ShardConsumer
// ═══════════════════════════════════════════════════════════════

/// Последовательно читает один шард и прогоняет каждую запись через
/// `PayloadDecoder`, отдавая результат в sink.
///
/// Владеет единственным текущим курсором. После каждого успешного
/// fetch курсор заменяется на next cursor ответа, даже если батч пуст.
pub struct ShardConsumer {
    fetcher: Arc<dyn ShardFetcher>,
    decoder: Arc<PayloadDecoder>,
    config: ConsumerConfig,
    counter: RecordCounter,
    cursor: Option<Cursor>,
    state: ConsumerState,
    closed: bool,
}

impl ShardConsumer {
    pub fn new(
        fetcher: Arc<dyn ShardFetcher>,
        decoder: Arc<PayloadDecoder>,
        config: ConsumerConfig,
        counter: RecordCounter,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            config,
            counter,
            cursor: None,
            state: ConsumerState::Acquiring,
            closed: false,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn counter(&self) -> &RecordCounter {
        &self.counter
    }

    /// Читать шард, пока не придёт отмена, шард не закроется или fetch
    /// не упадёт окончательно. Отмена проверяется между батчами и во
    /// время пауз; запрос в полёте не прерывается.
    pub async fn run(
        &mut self,
        sink: &mut dyn PayloadSink,
        token: CancellationToken,
    ) -> Result<RunSummary, ConsumerError> {
        self.config.validate()?;
        let shard = self.fetcher.shard_id().to_string();
        let mut summary = RunSummary::default();

        tracing::info!(
            shard = %shard,
            start = %self.config.start_position,
            batch_limit = self.config.batch_limit,
            codecs = ?self.decoder.codec_names(),
            "consumer starting"
        );

        let result = self.run_loop(sink, &token, &mut summary).await;
        self.state = ConsumerState::Stopped;

        match &result {
            Ok(()) => tracing::info!(
                shard = %shard,
                records = summary.records,
                batches = summary.batches,
                exit = ?summary.exit,
                "consumer stopped"
            ),
            Err(e) => tracing::error!(shard = %shard, error = %e, "consumer failed"),
        }
        result.map(|()| summary)
    }

    async fn run_loop(
        &mut self,
        sink: &mut dyn PayloadSink,
        token: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), ConsumerError> {
        if token.is_cancelled() || !self.ensure_cursor(token).await? {
            return Ok(());
        }

        let idle_delay = Duration::from_millis(self.config.idle_delay_ms);
        loop {
            if token.is_cancelled() {
                return Ok(());
            }
            let Some(outcome) = self.poll(sink, token).await? else {
                return Ok(());
            };
            summary.records += outcome.records as u64;
            summary.batches += 1;

            if outcome.shard_closed {
                summary.exit = ExitReason::ShardClosed;
                return Ok(());
            }
            if outcome.records == 0
                && !idle_delay.is_zero()
                && sleep_or_cancel(idle_delay, token).await
            {
                return Ok(());
            }
        }
    }

    /// Один шаг цикла: при необходимости получить курсор, затем один
    /// батч (с повторами временных ошибок).
    pub async fn poll_once(&mut self, sink: &mut dyn PayloadSink) -> Result<PollOutcome, ConsumerError> {
        self.config.validate()?;
        let token = CancellationToken::new();
        self.ensure_cursor(&token).await?;
        match self.poll(sink, &token).await? {
            Some(outcome) => Ok(outcome),
            None => Ok(PollOutcome { records: 0, shard_closed: self.closed }),
        }
    }

    /// `Ok(false)` — отменено до получения курсора.
    async fn ensure_cursor(&mut self, token: &CancellationToken) -> Result<bool, ConsumerError> {
        if self.cursor.is_some() {
            return Ok(true);
        }
        self.state = ConsumerState::Acquiring;

        let fetcher = self.fetcher.clone();
        let start = self.config.start_position;
        let acquired = retrying(
            &self.config.retry,
            fetcher.shard_id(),
            "acquire_cursor",
            token,
            &mut self.state,
            || fetcher.acquire_cursor(start),
        )
        .await;

        match acquired {
            Ok(Some(cursor)) => {
                tracing::info!(shard = %fetcher.shard_id(), %start, %cursor, "cursor acquired");
                self.cursor = Some(cursor);
                self.state = ConsumerState::Polling;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(RetryError::Fatal(source)) => {
                Err(ConsumerError::CursorAcquisition { attempts: 1, source })
            }
            Err(RetryError::Exhausted { attempts, source }) => {
                Err(ConsumerError::CursorAcquisition { attempts, source })
            }
        }
    }

    /// `Ok(None)` — отменено во время backoff.
    async fn poll(
        &mut self,
        sink: &mut dyn PayloadSink,
        token: &CancellationToken,
    ) -> Result<Option<PollOutcome>, ConsumerError> {
        if self.closed {
            return Ok(Some(PollOutcome { records: 0, shard_closed: true }));
        }
        let Some(cursor) = self.cursor.clone() else {
            return Ok(None);
        };

        let fetcher = self.fetcher.clone();
        let limit = self.config.batch_limit;
        let fetched = retrying(
            &self.config.retry,
            fetcher.shard_id(),
            "fetch_next_batch",
            token,
            &mut self.state,
            || fetcher.fetch_next_batch(&cursor, limit),
        )
        .await;

        match fetched {
            Ok(Some(batch)) => Ok(Some(self.process_batch(batch, sink))),
            Ok(None) => Ok(None),
            Err(RetryError::Fatal(e)) => Err(ConsumerError::FetchFatal(e)),
            Err(RetryError::Exhausted { attempts, source }) => {
                Err(ConsumerError::RetriesExhausted { attempts, source })
            }
        }
    }

    fn process_batch(&mut self, batch: Batch, sink: &mut dyn PayloadSink) -> PollOutcome {
        let shard = self.fetcher.shard_id();
        let records = batch.records.len();
        tracing::debug!(shard, records, lag_ms = ?batch.lag_ms, "batch fetched");

        for record in &batch.records {
            let seq = self.counter.increment();
            let payload = self.decoder.recover(&record.data);

            for failure in &payload.failures {
                tracing::warn!(
                    shard,
                    seq,
                    codec = failure.codec,
                    offset = failure.offset,
                    error = %failure.reason,
                    "codec candidate failed"
                );
            }
            if payload.is_unknown() {
                tracing::warn!(shard, seq, sequence = %record.sequence, raw_len = record.data.len(), "no payload detected");
            } else {
                tracing::debug!(
                    shard,
                    seq,
                    codec = %payload.label,
                    offset = ?payload.offset,
                    raw_len = record.data.len(),
                    len = payload.len(),
                    "payload recovered"
                );
            }
            sink.accept(record, payload, seq);
        }

        match batch.next_cursor {
            Some(next) => self.cursor = Some(next),
            None => {
                tracing::info!(shard, "shard closed, no further records");
                self.closed = true;
            }
        }
        self.state = if self.closed { ConsumerState::Stopped } else { ConsumerState::Polling };
        PollOutcome { records, shard_closed: self.closed }
    }
}
