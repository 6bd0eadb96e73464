use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod types;
pub mod util;

pub use error::{ErrorKind, FetchError};
pub use types::{
    Batch, CandidateFailure, Cursor, PayloadLabel, RawRecord, RecoveredPayload, StartPosition,
};
pub use util::now_ms;

// ════════════════════════════════════════════════════════════════
//  ShardFetcher — доступ к log service
// ════════════════════════════════════════════════════════════════

/// Узкий интерфейс к log service для одного шарда.
///
/// Аутентификация, регион, имя стрима и wire-протокол — забота
/// реализации. Таймауты отдельного запроса тоже на её стороне.
pub trait ShardFetcher: Send + Sync {
    /// Получить курсор для стартовой позиции.
    fn acquire_cursor(
        &self,
        start: StartPosition,
    ) -> Pin<Box<dyn Future<Output = Result<Cursor, FetchError>> + Send + '_>>;

    /// Прочитать до `max_records` записей начиная с `cursor`.
    ///
    /// Успешный ответ всегда несёт следующий курсор, даже при пустом
    /// батче (кроме закрытого шарда).
    fn fetch_next_batch<'a>(
        &'a self,
        cursor: &'a Cursor,
        max_records: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Batch, FetchError>> + Send + 'a>>;

    /// Имя шарда для логов.
    fn shard_id(&self) -> &str {
        "shard"
    }
}

// ════════════════════════════════════════════════════════════════
//  PayloadSink — получатель восстановленных записей
// ════════════════════════════════════════════════════════════════

/// Получатель восстановленных payload'ов.
///
/// Вызывается один раз на запись, в порядке поступления. Не должен
/// блокироваться надолго: consumer ничего не буферизует.
pub trait PayloadSink: Send {
    fn accept(&mut self, record: &RawRecord, payload: RecoveredPayload, sequence_no: i64);
}

impl<F> PayloadSink for F
where
    F: FnMut(RecoveredPayload, i64) + Send,
{
    fn accept(&mut self, _record: &RawRecord, payload: RecoveredPayload, sequence_no: i64) {
        self(payload, sequence_no)
    }
}
