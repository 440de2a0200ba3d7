use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use std::io::SeekFrom;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// One stored motion record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    /// Node-side wall clock, stored verbatim
    pub timestamp: String,
    /// Server-side receive time (RFC 3339)
    pub received_at: String,
}

struct StoreState {
    entries: Vec<LogEntry>,
    next_id: u64,
}

/// Append-only JSON-lines store. Each line is one `LogEntry`.
pub struct EventStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl EventStore {
    /// Open (or create on first append) the store at `path`, loading existing entries
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => load_entries(&path, &bytes).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        log::info!(
            "Opened event store {} ({} entries)",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            state: Mutex::new(StoreState { entries, next_id }),
        })
    }

    pub async fn append(&self, timestamp: &str) -> Result<LogEntry, StoreError> {
        let mut state = self.state.lock().await;
        let entry = LogEntry {
            id: state.next_id,
            timestamp: timestamp.to_string(),
            received_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        state.next_id += 1;
        state.entries.push(entry.clone());
        Ok(entry)
    }

    /// All entries, newest first
    pub async fn list(&self) -> Vec<LogEntry> {
        let state = self.state.lock().await;
        state.entries.iter().rev().cloned().collect()
    }
}

/// Parse the file, repairing an unterminated last line left by an
/// interrupted append. Bad lines before the last newline stay fatal.
async fn load_entries(path: &Path, bytes: &[u8]) -> Result<Vec<LogEntry>, StoreError> {
    let complete = bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let (body, tail) = bytes.split_at(complete);

    let mut entries = parse_lines(&String::from_utf8_lossy(body))?;
    if tail.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(entries);
    }

    let mut file = OpenOptions::new().write(true).open(path).await?;
    match serde_json::from_slice::<LogEntry>(tail) {
        Ok(entry) => {
            // Whole record, only the newline is missing
            entries.push(entry);
            file.seek(SeekFrom::End(0)).await?;
            file.write_all(b"\n").await?;
        }
        Err(e) => {
            log::warn!(
                "Dropping torn last entry of {} ({} bytes): {}",
                path.display(),
                tail.len(),
                e
            );
            file.set_len(complete as u64).await?;
        }
    }
    file.flush().await?;
    Ok(entries)
}

fn parse_lines(text: &str) -> Result<Vec<LogEntry>, StoreError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::Corrupt { line: i + 1, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "motion_sentry_store_{}_{}.jsonl",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn test_append_and_list_newest_first() {
        let path = temp_store("order");
        let store = EventStore::open(&path).await.unwrap();

        store.append("2024-11-02 11:04:09").await.unwrap();
        store.append("2024-11-02 11:05:30").await.unwrap();

        let entries = store.list().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 2);
        assert_eq!(entries[0].timestamp, "2024-11-02 11:05:30");
        assert_eq!(entries[1].id, 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_ids_survive_reopen() {
        let path = temp_store("reopen");
        {
            let store = EventStore::open(&path).await.unwrap();
            store.append("1970-01-01 00:00:00").await.unwrap();
            store.append("2024-11-02 11:04:09").await.unwrap();
        }

        let store = EventStore::open(&path).await.unwrap();
        assert_eq!(store.list().await.len(), 2);
        let entry = store.append("2024-11-02 11:06:00").await.unwrap();
        assert_eq!(entry.id, 3);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_reported() {
        let path = temp_store("corrupt");
        std::fs::write(
            &path,
            "{\"id\":1,\"timestamp\":\"a\",\"received_at\":\"b\"}\nnot json\n",
        )
        .unwrap();

        match EventStore::open(&path).await {
            Err(StoreError::Corrupt { line, .. }) => assert_eq!(line, 2),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("corrupt store opened"),
        }

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_torn_last_line_is_dropped() {
        let path = temp_store("torn");
        std::fs::write(
            &path,
            "{\"id\":1,\"timestamp\":\"a\",\"received_at\":\"b\"}\n{\"id\":2,\"timesta",
        )
        .unwrap();

        let store = EventStore::open(&path).await.unwrap();
        assert_eq!(store.list().await.len(), 1);

        let entry = store.append("2024-11-02 11:04:09").await.unwrap();
        assert_eq!(entry.id, 2);

        let reopened = EventStore::open(&path).await.unwrap();
        let entries = reopened.list().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "2024-11-02 11:04:09");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unterminated_complete_line_is_kept() {
        let path = temp_store("unterminated");
        std::fs::write(&path, "{\"id\":7,\"timestamp\":\"a\",\"received_at\":\"b\"}").unwrap();

        let store = EventStore::open(&path).await.unwrap();
        let entry = store.append("2024-11-02 11:04:09").await.unwrap();
        assert_eq!(entry.id, 8);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);

        let _ = std::fs::remove_file(&path);
    }
}
