//! Восстановление payload из записей шарда с неизвестным сжатием.

pub mod codec;
pub mod config;
pub mod error;
pub mod scan;
mod decoder;

pub use codec::{CodecCandidate, CodecKind, GzipCodec, Lz4Codec, LzmaCodec, ZstdCodec};
pub use config::DecoderConfig;
pub use decoder::PayloadDecoder;
pub use error::{DecodeError, DecoderConfigError};
