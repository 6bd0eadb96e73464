use crate::codec::CodecKind;

/// Ошибка одного кандидата. Не фатальна: цепочка переходит к следующему.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("decompress: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoded size exceeds {0} bytes")]
    OutputLimit(usize),

    #[error("no payload bytes before trailer")]
    Truncated,

    #[error("decoder init: {0}")]
    Init(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecoderConfigError {
    #[error("codec '{0}' listed more than once in codec_order")]
    DuplicateCodec(CodecKind),

    #[error("max_output_bytes must be greater than zero")]
    ZeroOutputLimit,
}
