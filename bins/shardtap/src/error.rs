#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("decoder: {0}")]
    Decoder(#[from] payload_decoder::DecoderConfigError),

    #[error("{0}")]
    Consumer(#[from] shard_consumer::ConsumerError),

    #[error("read '{path}': {source}")]
    Read { path: String, source: std::io::Error },
}
