use base64::Engine;
use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Start Position
// ════════════════════════════════════════════════════════════════

/// С какой позиции шарда начинать чтение.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// Самая старая доступная запись шарда.
    #[default]
    #[serde(alias = "trim_horizon")]
    Earliest,
    /// Только записи, появившиеся после получения курсора.
    Latest,
}

impl std::fmt::Display for StartPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartPosition::Earliest => f.write_str("earliest"),
            StartPosition::Latest => f.write_str("latest"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Cursor
// ════════════════════════════════════════════════════════════════

/// Непрозрачный токен позиции чтения в шарде.
///
/// Содержимое интерпретирует только fetcher, который его выдал.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ════════════════════════════════════════════════════════════════
//  RawRecord
// ════════════════════════════════════════════════════════════════

/// Запись шарда в том виде, в каком её вернул log service.
///
/// Байты неизменяемы и потребляются декодером ровно один раз.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    /// Позиция записи в шарде (sequence number).
    pub sequence: String,
    /// Сырые байты: [prefix][payload][trailer].
    pub data: Vec<u8>,
    /// Приблизительное время поступления в лог (Unix ms), если известно.
    pub arrival_ms: Option<i64>,
}

impl RawRecord {
    pub fn new(sequence: impl Into<String>, data: Vec<u8>) -> Self {
        Self { sequence: sequence.into(), data, arrival_ms: None }
    }
}

impl Serialize for RawRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("RawRecord", 3)?;
        s.serialize_field("sequence", &self.sequence)?;
        // Base64 — данные бинарные
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.data);
        s.serialize_field("data", &encoded)?;
        s.serialize_field("arrival_ms", &self.arrival_ms)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wire {
            sequence: String,
            data: String,
            #[serde(default)]
            arrival_ms: Option<i64>,
        }
        let wire = Wire::deserialize(deserializer)?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(wire.data.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Ok(RawRecord {
            sequence: wire.sequence,
            data,
            arrival_ms: wire.arrival_ms,
        })
    }
}

// ════════════════════════════════════════════════════════════════
//  Batch
// ════════════════════════════════════════════════════════════════

/// Ответ на один запрос FetchNextBatch.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    /// Записи в порядке поступления. Может быть пустым.
    pub records: Vec<RawRecord>,
    /// Курсор для следующего запроса. `None` — шард закрыт
    /// (split/merge), новых записей не будет.
    pub next_cursor: Option<Cursor>,
    /// Насколько курсор отстаёт от хвоста шарда (ms), если сервис сообщает.
    pub lag_ms: Option<i64>,
}

impl Batch {
    pub fn new(records: Vec<RawRecord>, next_cursor: Cursor) -> Self {
        Self { records, next_cursor: Some(next_cursor), lag_ms: None }
    }

    /// Финальный ответ закрытого шарда.
    pub fn closed(records: Vec<RawRecord>) -> Self {
        Self { records, next_cursor: None, lag_ms: None }
    }
}

// ════════════════════════════════════════════════════════════════
//  RecoveredPayload
// ════════════════════════════════════════════════════════════════

/// Каким способом был восстановлен payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadLabel {
    /// Распакован кодеком с указанным именем ("zstd", "gzip", ...).
    Codec(&'static str),
    /// Кодек не найден, payload взят как есть начиная с `{`.
    Uncompressed,
    /// Ни magic bytes, ни `{` — payload пустой.
    Unknown,
}

impl PayloadLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadLabel::Codec(name) => name,
            PayloadLabel::Uncompressed => "uncompressed",
            PayloadLabel::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PayloadLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Кандидат, magic bytes которого нашлись, но распаковка не удалась.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub codec: &'static str,
    /// Смещение magic bytes в исходном буфере.
    pub offset: usize,
    pub reason: String,
}

impl std::fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}: {}", self.codec, self.offset, self.reason)
    }
}

/// Результат восстановления одной записи.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredPayload {
    pub data: Vec<u8>,
    pub label: PayloadLabel,
    /// Где в сыром буфере начался payload (`None` для `Unknown`).
    pub offset: Option<usize>,
    /// Неудачные попытки кандидатов, в порядке приоритета.
    pub failures: Vec<CandidateFailure>,
}

impl RecoveredPayload {
    pub fn unknown(failures: Vec<CandidateFailure>) -> Self {
        Self { data: Vec::new(), label: PayloadLabel::Unknown, offset: None, failures }
    }

    /// Payload как текст (невалидный UTF-8 заменяется).
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_unknown(&self) -> bool {
        self.label == PayloadLabel::Unknown
    }
}
