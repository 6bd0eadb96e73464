use std::io::Read;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::DecodeError;
use crate::scan;

/// Лимит памяти lzma-декодера. Заголовок .lzma сам задаёт размер словаря,
/// и мусор после magic bytes может запросить гигабайты.
const LZMA_MEMLIMIT: u64 = 256 << 20;

// ═══════════════════════════════════════════════════════════════
//  CodecCandidate
// ═══════════════════════════════════════════════════════════════

/// Пара detect/decode для одного формата сжатия.
///
/// Реализации не имеют изменяемого состояния и могут вызываться
/// из нескольких потоков одновременно.
pub trait CodecCandidate: Send + Sync {
    /// Имя для метки результата и логов.
    fn name(&self) -> &'static str;

    /// Сигнатура начала потока.
    fn magic(&self) -> &'static [u8];

    /// Смещение первого вхождения сигнатуры в буфере.
    fn detect(&self, buffer: &[u8]) -> Option<usize> {
        scan::find_magic(buffer, self.magic())
    }

    /// Распаковать поток, начинающийся с сигнатуры. Результат длиннее
    /// `limit` байт считается ошибкой.
    fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError>;
}

/// Прочитать весь поток, но не больше `limit` байт.
fn read_limited<R: Read>(reader: R, limit: usize) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(DecodeError::OutputLimit(limit));
    }
    Ok(out)
}

// ---- Zstd ----

pub struct ZstdCodec;

impl CodecCandidate for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn magic(&self) -> &'static [u8] {
        &[0x28, 0xB5, 0x2F, 0xFD]
    }

    fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        let decoder = zstd::stream::read::Decoder::with_buffer(data)?;
        read_limited(decoder, limit)
    }
}

// ---- Gzip ----

pub struct GzipCodec;

impl CodecCandidate for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    /// ID1, ID2 и CM = deflate.
    fn magic(&self) -> &'static [u8] {
        &[0x1F, 0x8B, 0x08]
    }

    fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        read_limited(flate2::read::GzDecoder::new(data), limit)
    }
}

// ---- Lzma ----

pub struct LzmaCodec;

impl CodecCandidate for LzmaCodec {
    fn name(&self) -> &'static str {
        "lzma"
    }

    /// Legacy .lzma заголовок: properties 0x5D (lc=3, lp=0, pb=2) и младшие
    /// байты размера словаря. Собственной сигнатуры у формата нет.
    fn magic(&self) -> &'static [u8] {
        &[0x5D, 0x00, 0x00]
    }

    fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        let stream = xz2::stream::Stream::new_lzma_decoder(LZMA_MEMLIMIT)
            .map_err(|e| DecodeError::Init(e.to_string()))?;
        read_limited(xz2::read::XzDecoder::new_stream(data, stream), limit)
    }
}

// ---- Lz4 ----

pub struct Lz4Codec;

impl CodecCandidate for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    /// LZ4 frame format, little-endian 0x184D2204.
    fn magic(&self) -> &'static [u8] {
        &[0x04, 0x22, 0x4D, 0x18]
    }

    fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        read_limited(lz4_flex::frame::FrameDecoder::new(data), limit)
    }
}

// ═══════════════════════════════════════════════════════════════
//  CodecKind — встроенные кандидаты по имени
// ═══════════════════════════════════════════════════════════════

/// Встроенный кодек, на который можно сослаться из конфига.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[serde(alias = "zstandard")]
    Zstd,
    #[serde(alias = "gz")]
    Gzip,
    Lzma,
    Lz4,
}

impl CodecKind {
    /// Порядок по умолчанию: zstd первым.
    pub const DEFAULT_ORDER: [CodecKind; 4] =
        [CodecKind::Zstd, CodecKind::Gzip, CodecKind::Lzma, CodecKind::Lz4];

    pub fn candidate(self) -> Arc<dyn CodecCandidate> {
        match self {
            CodecKind::Zstd => Arc::new(ZstdCodec),
            CodecKind::Gzip => Arc::new(GzipCodec),
            CodecKind::Lzma => Arc::new(LzmaCodec),
            CodecKind::Lz4 => Arc::new(Lz4Codec),
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecKind::Zstd => f.write_str("zstd"),
            CodecKind::Gzip => f.write_str("gzip"),
            CodecKind::Lzma => f.write_str("lzma"),
            CodecKind::Lz4 => f.write_str("lz4"),
        }
    }
}
