use serde::Deserialize;

use crate::codec::CodecKind;
use crate::error::DecoderConfigError;

/// Конфигурация декодера payload'ов.
#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    /// Размер хвоста записи, который никогда не входит в payload.
    /// Назначение хвоста неизвестно, поэтому он только отрезается.
    #[serde(default = "default_trailer_size")]
    pub trailer_size: usize,
    /// Порядок проверки кодеков. Первый успешный побеждает.
    #[serde(default = "default_codec_order")]
    pub codec_order: Vec<CodecKind>,
    /// Максимальный размер распакованного payload.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            trailer_size: default_trailer_size(),
            codec_order: default_codec_order(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<(), DecoderConfigError> {
        if self.max_output_bytes == 0 {
            return Err(DecoderConfigError::ZeroOutputLimit);
        }
        for (i, kind) in self.codec_order.iter().enumerate() {
            if self.codec_order[..i].contains(kind) {
                return Err(DecoderConfigError::DuplicateCodec(*kind));
            }
        }
        Ok(())
    }
}

fn default_trailer_size() -> usize {
    16
}
fn default_codec_order() -> Vec<CodecKind> {
    CodecKind::DEFAULT_ORDER.to_vec()
}
fn default_max_output_bytes() -> usize {
    64 << 20
}
