use std::sync::Arc;

use shardtap_api::{CandidateFailure, PayloadLabel, RecoveredPayload};

use crate::codec::CodecCandidate;
use crate::config::DecoderConfig;
use crate::error::{DecodeError, DecoderConfigError};
use crate::scan;

// ═══════════════════════════════════════════════════════════════
//  PayloadDecoder
// ═══════════════════════════════════════════════════════════════

/// Восстанавливает payload из сырой записи неизвестного формата.
///
/// Буфер имеет вид `[prefix][payload][trailer]`. Кандидаты проверяются
/// в заданном порядке: первый, чья сигнатура найдена и поток распакован,
/// побеждает. Если ни один не подошёл — payload берётся как текст,
/// начиная с первой `{`. Иначе результат пустой с меткой `unknown`.
///
/// Состояния нет: один экземпляр можно делить между потоками.
pub struct PayloadDecoder {
    candidates: Vec<Arc<dyn CodecCandidate>>,
    trailer_size: usize,
    max_output_bytes: usize,
}

impl PayloadDecoder {
    pub fn new(config: &DecoderConfig) -> Result<Self, DecoderConfigError> {
        config.validate()?;
        let candidates = config.codec_order.iter().map(|k| k.candidate()).collect();
        Ok(Self {
            candidates,
            trailer_size: config.trailer_size,
            max_output_bytes: config.max_output_bytes,
        })
    }

    /// Декодер с произвольным набором кандидатов (в порядке приоритета).
    pub fn with_candidates(candidates: Vec<Arc<dyn CodecCandidate>>, trailer_size: usize) -> Self {
        Self {
            candidates,
            trailer_size,
            max_output_bytes: DecoderConfig::default().max_output_bytes,
        }
    }

    pub fn with_output_limit(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    pub fn trailer_size(&self) -> usize {
        self.trailer_size
    }

    /// Имена кандидатов в порядке проверки.
    pub fn codec_names(&self) -> Vec<&'static str> {
        self.candidates.iter().map(|c| c.name()).collect()
    }

    /// Восстановить payload. Никогда не паникует и не возвращает ошибку:
    /// неудачи кандидатов попадают в `RecoveredPayload::failures`.
    pub fn recover(&self, buffer: &[u8]) -> RecoveredPayload {
        let end = buffer.len().saturating_sub(self.trailer_size);
        let mut failures = Vec::new();

        for candidate in &self.candidates {
            let Some(offset) = candidate.detect(buffer) else {
                continue;
            };

            let result = if offset >= end {
                Err(DecodeError::Truncated)
            } else {
                candidate.decode(&buffer[offset..end], self.max_output_bytes)
            };

            match result {
                Ok(data) => {
                    return RecoveredPayload {
                        data,
                        label: PayloadLabel::Codec(candidate.name()),
                        offset: Some(offset),
                        failures,
                    };
                }
                Err(e) => {
                    tracing::trace!(codec = candidate.name(), offset, error = %e, "candidate failed");
                    failures.push(CandidateFailure {
                        codec: candidate.name(),
                        offset,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Последний шанс: несжатый JSON. `{` внутри trailer не считается.
        match scan::find_byte(&buffer[..end], b'{') {
            Some(offset) => RecoveredPayload {
                data: buffer[offset..end].to_vec(),
                label: PayloadLabel::Uncompressed,
                offset: Some(offset),
                failures,
            },
            None => RecoveredPayload::unknown(failures),
        }
    }
}

impl Default for PayloadDecoder {
    fn default() -> Self {
        let config = DecoderConfig::default();
        Self {
            candidates: config.codec_order.iter().map(|k| k.candidate()).collect(),
            trailer_size: config.trailer_size,
            max_output_bytes: config.max_output_bytes,
        }
    }
}
