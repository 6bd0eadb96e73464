/// Category of a fetch error. Lets the consumer decide between
/// backing off and giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Throttling, network blip, temporary read failure — retry with backoff.
    Transient,
    /// Invalid or expired cursor, missing shard — cannot continue.
    Fatal,
    /// Invalid configuration — permanent, fail at startup.
    Config,
    /// Malformed response from the log service.
    Format,
}

impl ErrorKind {
    /// Может ли операция быть повторена после паузы.
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transient => f.write_str("transient"),
            ErrorKind::Fatal => f.write_str("fatal"),
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Format => f.write_str("format"),
        }
    }
}

/// Unified error type for the fetch capability.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the appropriate kind automatically and allow
/// ergonomic `?` in fetcher implementations.
#[derive(Clone)]
pub struct FetchError {
    kind: ErrorKind,
    message: String,
}

impl FetchError {
    /// Transient error — throttling or network, may retry.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Transient, message: msg.into() }
    }

    /// Unrecoverable error — consumer stops.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Fatal, message: msg.into() }
    }

    /// Configuration error — permanent, fail at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    /// Malformed response — the data itself is bad.
    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }

    /// Prepend context to the message, keeping the kind.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        Self { kind: self.kind, message: format!("{ctx}: {}", self.message) }
    }
}

impl std::fmt::Debug for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Transient, message: e.to_string() } }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}

impl From<base64::DecodeError> for FetchError {
    fn from(e: base64::DecodeError) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_transient() {
        let e: FetchError = std::io::Error::other("connection reset").into();
        assert_eq!(e.kind(), ErrorKind::Transient);
        assert!(e.is_retriable());
    }

    #[test]
    fn context_keeps_kind() {
        let e = FetchError::fatal("iterator expired").with_context("shard-0");
        assert_eq!(e.kind(), ErrorKind::Fatal);
        assert_eq!(e.to_string(), "shard-0: iterator expired");
        assert_eq!(format!("{e:?}"), "[fatal] shard-0: iterator expired");
    }
}
