//! Append-only newline-delimited JSON persistence for the ingestion buffer
//! and dead-letter store (§6.3).

use std::path::Path;

use loom_core::{LoomError, LoomResult};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Appends a single record as one JSON line. Flushed before returning so
/// the caller can rely on write-before-ack durability (§4.9, §9).
pub async fn append_line<T: Serialize>(path: &Path, record: &T) -> LoomResult<()> {
    let mut line = serde_json::to_string(record)
        .map_err(|e| LoomError::invalid(format!("failed to serialize spool record: {e}")))?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| LoomError::unavailable(format!("failed to open spool {}: {e}", path.display())))?;

    file.write_all(line.as_bytes())
        .await
        .map_err(|e| LoomError::unavailable(format!("failed to write spool {}: {e}", path.display())))?;
    file.flush()
        .await
        .map_err(|e| LoomError::unavailable(format!("failed to flush spool {}: {e}", path.display())))?;

    Ok(())
}

/// Parses every line of `path` as `T`, stopping (and diagnosing) at the
/// first line that fails to parse — the truncation recovery strategy in
/// §4.9/§6.3. Returns the parsed records and whether truncation occurred.
pub async fn load_lines<T: DeserializeOwned>(path: &Path) -> LoomResult<(Vec<T>, bool)> {
    if !path.exists() {
        return Ok((Vec::new(), false));
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoomError::unavailable(format!("failed to read spool {}: {e}", path.display())))?;

    let mut records = Vec::new();
    let mut truncated = false;

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) => records.push(record),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    %error,
                    "RECOVERED: truncating spool at first unparseable line"
                );
                truncated = true;
                break;
            }
        }
    }

    Ok((records, truncated))
}

/// Fully rewrites `path` to contain exactly `records`, one per line. Used
/// to compact the spool after acks/nacks/evictions so the on-disk tail
/// doesn't grow without bound (§4.9).
pub async fn rewrite<T: Serialize>(path: &Path, records: &[T]) -> LoomResult<()> {
    let mut content = String::new();
    for record in records {
        content.push_str(
            &serde_json::to_string(record)
                .map_err(|e| LoomError::invalid(format!("failed to serialize spool record: {e}")))?,
        );
        content.push('\n');
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|e| LoomError::unavailable(format!("failed to rewrite spool {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        n: u32,
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spool.ndjson");

        append_line(&path, &Sample { n: 1 }).await.unwrap();
        append_line(&path, &Sample { n: 2 }).await.unwrap();

        let (records, truncated) = load_lines::<Sample>(&path).await.unwrap();
        assert_eq!(records, vec![Sample { n: 1 }, Sample { n: 2 }]);
        assert!(!truncated);
    }

    #[tokio::test]
    async fn corrupt_tail_truncates_recoverably() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spool.ndjson");

        tokio::fs::write(&path, "{\"n\":1}\nnot json\n{\"n\":3}\n")
            .await
            .unwrap();

        let (records, truncated) = load_lines::<Sample>(&path).await.unwrap();
        assert_eq!(records, vec![Sample { n: 1 }]);
        assert!(truncated);
    }

    #[tokio::test]
    async fn rewrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spool.ndjson");

        append_line(&path, &Sample { n: 1 }).await.unwrap();
        rewrite(&path, &[Sample { n: 2 }, Sample { n: 3 }]).await.unwrap();

        let (records, _) = load_lines::<Sample>(&path).await.unwrap();
        assert_eq!(records, vec![Sample { n: 2 }, Sample { n: 3 }]);
    }
}
