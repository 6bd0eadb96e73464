use std::borrow::Cow;

use shardtap_api::{PayloadSink, RawRecord, RecoveredPayload};

use crate::config::SinkConfig;

/// Sink, который пишет восстановленные записи в лог (и опционально в stdout).
pub struct LogSink {
    print_payloads: bool,
    max_logged_bytes: usize,
    accepted: u64,
}

impl LogSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            print_payloads: config.print_payloads,
            max_logged_bytes: config.max_logged_bytes,
            accepted: 0,
        }
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }
}

impl PayloadSink for LogSink {
    fn accept(&mut self, record: &RawRecord, payload: RecoveredPayload, sequence_no: i64) {
        self.accepted += 1;
        let text = payload.as_text();
        tracing::info!(
            seq = sequence_no,
            sequence = %record.sequence,
            raw_len = record.data.len(),
            codec = %payload.label,
            offset = ?payload.offset,
            len = payload.len(),
            payload = %truncate(&text, self.max_logged_bytes),
            "record"
        );
        if self.print_payloads {
            println!("{}", single_line(&text));
        }
    }
}

/// Экранировать переводы строк, чтобы запись занимала одну строку stdout.
pub fn single_line(text: &str) -> Cow<'_, str> {
    if !text.contains(['\n', '\r']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace('\r', "\\r").replace('\n', "\\n"))
}

/// Обрезать строку до `max` байт по границе символа.
pub fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
