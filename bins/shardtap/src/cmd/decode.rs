use crate::config::{AppConfig, DecodeArgs};
use crate::error::AppError;
use payload_decoder::{DecoderConfig, PayloadDecoder};

/// Восстановить payload одной записи из файла и напечатать его.
pub fn run(args: DecodeArgs) -> Result<(), AppError> {
    let mut decoder_config = match &args.config {
        Some(path) => AppConfig::load(path)?.decoder,
        None => DecoderConfig::default(),
    };
    if let Some(trailer) = args.trailer_size {
        decoder_config.trailer_size = trailer;
    }
    let decoder = PayloadDecoder::new(&decoder_config)?;

    let raw = std::fs::read(&args.file)
        .map_err(|source| AppError::Read { path: args.file.display().to_string(), source })?;

    let payload = decoder.recover(&raw);
    for failure in &payload.failures {
        tracing::warn!(codec = failure.codec, offset = failure.offset, reason = %failure.reason, "candidate failed");
    }
    tracing::info!(
        raw_len = raw.len(),
        codec = %payload.label,
        offset = ?payload.offset,
        len = payload.len(),
        "decoded"
    );
    println!("{}", payload.as_text());
    Ok(())
}
