use std::future::Future;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{Mutex, MutexGuard};

use shardtap_api::{now_ms, Batch, Cursor, FetchError, RawRecord, ShardFetcher, StartPosition};

/// Шард, записанный в JSON-lines файл: по записи `RawRecord` на строку.
///
/// Курсор — индекс следующей записи. Разобранные записи кешируются,
/// на каждом fetch дочитывается только хвост файла после уже
/// разобранных байт. В режиме `follow` недописанная последняя строка
/// ждёт `\n`; без `follow` конец файла означает закрытый шард.
/// Если файл стал короче разобранного, он перечитывается с начала.
pub struct ReplayFetcher {
    path: PathBuf,
    shard_id: String,
    follow: bool,
    cache: Mutex<ReplayCache>,
}

#[derive(Default)]
struct ReplayCache {
    records: Vec<RawRecord>,
    /// Сколько байт файла уже разобрано.
    offset: u64,
    /// Сколько строк уже разобрано (для номеров строк в ошибках).
    lines: usize,
}

impl ReplayFetcher {
    pub fn new(path: impl Into<PathBuf>, shard_id: impl Into<String>, follow: bool) -> Self {
        Self {
            path: path.into(),
            shard_id: shard_id.into(),
            follow,
            cache: Mutex::new(ReplayCache::default()),
        }
    }

    fn context(&self) -> String {
        self.path.display().to_string()
    }

    /// Дочитать новые строки и вернуть кеш под блокировкой.
    async fn load(&self) -> Result<MutexGuard<'_, ReplayCache>, FetchError> {
        let mut cache = self.cache.lock().await;

        let mut file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            let err = if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::config(format!("replay file not found: {e}"))
            } else {
                FetchError::from(e)
            };
            err.with_context(self.context())
        })?;
        let len = file.metadata().await.map_err(|e| FetchError::from(e).with_context(self.context()))?.len();
        if len < cache.offset {
            tracing::warn!(path = %self.path.display(), len, parsed = cache.offset, "replay file shrank, re-reading");
            *cache = ReplayCache::default();
        }
        if len == cache.offset {
            return Ok(cache);
        }

        file.seek(SeekFrom::Start(cache.offset)).await?;
        let mut tail = Vec::new();
        file.read_to_end(&mut tail).await?;

        let complete = if self.follow {
            tail.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1)
        } else {
            tail.len()
        };
        if complete == 0 {
            return Ok(cache);
        }
        let text = std::str::from_utf8(&tail[..complete])
            .map_err(|e| FetchError::format_err(e.to_string()).with_context(self.context()))?;
        let parsed = parse_lines(text, cache.lines + 1)?;
        tracing::debug!(path = %self.path.display(), new_records = parsed.len(), "replay file advanced");

        cache.records.extend(parsed);
        cache.lines += text.lines().count();
        cache.offset += complete as u64;
        Ok(cache)
    }
}

impl ShardFetcher for ReplayFetcher {
    fn acquire_cursor(
        &self,
        start: StartPosition,
    ) -> Pin<Box<dyn Future<Output = Result<Cursor, FetchError>> + Send + '_>> {
        Box::pin(async move {
            let position = match start {
                StartPosition::Earliest => 0,
                StartPosition::Latest => self.load().await?.records.len(),
            };
            Ok(Cursor::new(position.to_string()))
        })
    }

    fn fetch_next_batch<'a>(
        &'a self,
        cursor: &'a Cursor,
        max_records: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Batch, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let position = parse_cursor(cursor)?;
            let cache = self.load().await?;
            let records = &cache.records;
            if position > records.len() {
                return Err(FetchError::fatal(format!(
                    "cursor {position} is past the end of shard ({} records)",
                    records.len()
                )));
            }
            let end = records.len().min(position.saturating_add(max_records));
            let taken: Vec<RawRecord> = records[position..end].to_vec();
            let lag_ms = records.last().and_then(|r| r.arrival_ms).map(|t| (now_ms() - t).max(0));

            let mut batch = if !self.follow && end == records.len() {
                Batch::closed(taken)
            } else {
                Batch::new(taken, Cursor::new(end.to_string()))
            };
            batch.lag_ms = lag_ms;
            Ok(batch)
        })
    }

    fn shard_id(&self) -> &str {
        &self.shard_id
    }
}

/// Разобрать JSON-lines. Пустые строки пропускаются; `first_line` —
/// номер первой строки `content` в файле, для сообщений об ошибках.
pub fn parse_lines(content: &str, first_line: usize) -> Result<Vec<RawRecord>, FetchError> {
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: RawRecord = serde_json::from_str(line)
            .map_err(|e| FetchError::from(e).with_context(format!("line {}", first_line + idx)))?;
        records.push(record);
    }
    Ok(records)
}

pub fn parse_cursor(cursor: &Cursor) -> Result<usize, FetchError> {
    cursor
        .as_str()
        .parse::<usize>()
        .map_err(|_| FetchError::fatal(format!("malformed replay cursor '{cursor}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardtap_api::ErrorKind;
    use std::io::Write;

    fn line(seq: &str, data: &[u8]) -> String {
        serde_json::to_string(&RawRecord::new(seq, data.to_vec())).unwrap()
    }

    fn replay_file(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for l in lines {
            writeln!(file, "{l}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn append(file: &mut tempfile::NamedTempFile, text: &str) {
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[test]
    fn parse_lines_skips_blank_and_reports_line_number() {
        let content = format!("{}\n\n{}\n", line("1", b"a"), line("2", b"b"));
        let records = parse_lines(&content, 1).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].data, b"b");

        let bad = format!("{}\nnot json\n", line("1", b"a"));
        let err = parse_lines(&bad, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.message().contains("line 2"), "{}", err.message());

        let err = parse_lines("not json\n", 7).unwrap_err();
        assert!(err.message().contains("line 7"), "{}", err.message());
    }

    #[test]
    fn malformed_cursor_is_fatal() {
        let err = parse_cursor(&Cursor::new("abc")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert_eq!(parse_cursor(&Cursor::new("42")).unwrap(), 42);
    }

    #[tokio::test]
    async fn pages_through_file_and_closes_at_end() {
        let file = replay_file(&[line("1", b"a"), line("2", b"b"), line("3", b"c")]);
        let fetcher = ReplayFetcher::new(file.path(), "shard-0", false);

        let cursor = fetcher.acquire_cursor(StartPosition::Earliest).await.unwrap();
        assert_eq!(cursor.as_str(), "0");

        let first = fetcher.fetch_next_batch(&cursor, 2).await.unwrap();
        let seqs: Vec<&str> = first.records.iter().map(|r| r.sequence.as_str()).collect();
        assert_eq!(seqs, vec!["1", "2"]);
        let next = first.next_cursor.unwrap();
        assert_eq!(next.as_str(), "2");

        let last = fetcher.fetch_next_batch(&next, 2).await.unwrap();
        assert_eq!(last.records.len(), 1);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn follow_mode_keeps_cursor_at_tail() {
        let file = replay_file(&[line("1", b"a")]);
        let fetcher = ReplayFetcher::new(file.path(), "shard-0", true);

        let cursor = fetcher.acquire_cursor(StartPosition::Latest).await.unwrap();
        assert_eq!(cursor.as_str(), "1");
        let batch = fetcher.fetch_next_batch(&cursor, 10).await.unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.next_cursor, Some(Cursor::new("1")));
    }

    #[tokio::test]
    async fn follow_mode_waits_for_complete_lines() {
        let mut file = replay_file(&[line("1", b"a")]);
        let fetcher = ReplayFetcher::new(file.path(), "shard-0", true);
        let at_tail = Cursor::new("1");
        assert!(fetcher.fetch_next_batch(&at_tail, 10).await.unwrap().records.is_empty());

        let second = line("2", b"b");
        let (head, rest) = second.split_at(5);
        append(&mut file, head);
        let batch = fetcher.fetch_next_batch(&at_tail, 10).await.unwrap();
        assert!(batch.records.is_empty());

        append(&mut file, &format!("{rest}\n"));
        let batch = fetcher.fetch_next_batch(&at_tail, 10).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].sequence, "2");
        assert_eq!(batch.next_cursor, Some(Cursor::new("2")));
    }

    #[tokio::test]
    async fn parsed_lines_are_not_read_again() {
        let first = line("1", b"a");
        let file = replay_file(std::slice::from_ref(&first));
        let fetcher = ReplayFetcher::new(file.path(), "shard-0", true);
        let batch = fetcher.fetch_next_batch(&Cursor::new("0"), 10).await.unwrap();
        assert_eq!(batch.records.len(), 1);

        // Уже разобранная строка испорчена, дописана новая: читается только хвост.
        let garbage = "x".repeat(first.len());
        std::fs::write(file.path(), format!("{garbage}\n{}\n", line("2", b"b"))).unwrap();
        let batch = fetcher.fetch_next_batch(&Cursor::new("1"), 10).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].sequence, "2");
    }

    #[tokio::test]
    async fn shrunk_file_is_read_from_start() {
        let file = replay_file(&[line("1", b"a"), line("2", b"b")]);
        let fetcher = ReplayFetcher::new(file.path(), "shard-0", true);
        let cursor = fetcher.acquire_cursor(StartPosition::Latest).await.unwrap();
        assert_eq!(cursor.as_str(), "2");

        std::fs::write(file.path(), format!("{}\n", line("9", b"z"))).unwrap();
        let cursor = fetcher.acquire_cursor(StartPosition::Latest).await.unwrap();
        assert_eq!(cursor.as_str(), "1");
    }

    #[tokio::test]
    async fn cursor_past_end_is_fatal() {
        let file = replay_file(&[line("1", b"a")]);
        let fetcher = ReplayFetcher::new(file.path(), "shard-0", true);
        let err = fetcher.fetch_next_batch(&Cursor::new("5"), 10).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[tokio::test]
    async fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ReplayFetcher::new(dir.path().join("absent.jsonl"), "shard-0", false);
        let err = fetcher.acquire_cursor(StartPosition::Latest).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(!err.is_retriable());
    }
}
