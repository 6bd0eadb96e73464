use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Счётчик обработанных записей. Клоны делят одно значение, так что
/// несколько consumer'ов (по одному на шард) получают общую нумерацию.
#[derive(Debug, Clone, Default)]
pub struct RecordCounter(Arc<AtomicI64>);

impl RecordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Увеличить и вернуть новый номер. Первый номер — 1.
    pub fn increment(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}
