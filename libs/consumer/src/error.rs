use shardtap_api::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("invalid consumer config: {0}")]
    InvalidConfig(String),

    #[error("cursor acquisition failed after {attempts} attempt(s): {source}")]
    CursorAcquisition { attempts: u32, source: FetchError },

    #[error("fetch failed: {0}")]
    FetchFatal(FetchError),

    #[error("fetch failed {attempts} times in a row: {source}")]
    RetriesExhausted { attempts: u32, source: FetchError },
}
