//! CSV-backed result store and input reading.
//!
//! The output dataset is rewritten whole after every batch: records are
//! serialized to a temporary file next to the target and atomically
//! renamed over it, so a crash mid-write leaves the previous complete
//! dataset untouched.

use std::path::{Path, PathBuf};

use demeter_core::error::AppError;
use demeter_core::record::WordRecord;
use demeter_core::traits::ResultStore;
use demeter_core::work::dedupe_keys;

/// Durable [`ResultStore`] over a single CSV file.
#[derive(Clone)]
pub struct CsvResultStore {
    path: PathBuf,
}

impl CsvResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl ResultStore for CsvResultStore {
    async fn load(&self) -> Result<Vec<WordRecord>, AppError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            let record: WordRecord = row?;
            records.push(record);
        }
        Ok(records)
    }

    async fn persist(&self, records: &[WordRecord]) -> Result<(), AppError> {
        let tmp = self.tmp_path();
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer
                .flush()
                .map_err(|e| AppError::StoreError(format!("Failed to flush {}: {e}", tmp.display())))?;
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::StoreError(format!("Failed to replace {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}

/// Read the work keys from an input CSV: take the named column, drop
/// blanks, deduplicate preserving first-occurrence order.
pub fn read_key_column(path: &Path, column: &str) -> Result<Vec<String>, AppError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let Some(index) = headers.iter().position(|h| h == column) else {
        return Err(AppError::StoreError(format!(
            "Input {} has no '{column}' column",
            path.display()
        )));
    };

    let mut keys = Vec::new();
    for row in reader.records() {
        let row = row?;
        if let Some(value) = row.get(index) {
            keys.push(value.to_string());
        }
    }
    Ok(dedupe_keys(keys))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<WordRecord> {
        let mut a = WordRecord::empty("你好");
        a.vietnamese_meaning = "xin chào".to_string();
        a.pinyin_latin = "nǐ hǎo".to_string();
        let b = WordRecord::not_found("再见");
        vec![a, b]
    }

    #[tokio::test]
    async fn test_persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvResultStore::new(dir.path().join("out.csv"));
        let records = sample_records();

        store.persist(&records).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvResultStore::new(dir.path().join("absent.csv"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "foo,bar\n1,2\n").unwrap();

        let store = CsvResultStore::new(&path);
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn test_persist_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let store = CsvResultStore::new(&path);
        let records = sample_records();

        store.persist(&records).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        store.persist(&records).await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_persist_rewrites_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvResultStore::new(dir.path().join("out.csv"));

        store.persist(&sample_records()[..1]).await.unwrap();
        store.persist(&sample_records()).await.unwrap();

        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvResultStore::new(dir.path().join("out.csv"));
        store.persist(&sample_records()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["out.csv"]);
    }

    #[test]
    fn test_read_key_column_dedupes_and_drops_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(
            &path,
            "simplified_chinese,note\n你好,greeting\n再见,farewell\n你好,dup\n,blank\n",
        )
        .unwrap();

        let keys = read_key_column(&path, "simplified_chinese").unwrap();
        assert_eq!(keys, vec!["你好", "再见"]);
    }

    #[test]
    fn test_read_key_column_missing_column_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(&path, "word\n你好\n").unwrap();

        let err = read_key_column(&path, "simplified_chinese").unwrap_err();
        assert!(err.to_string().contains("simplified_chinese"));
    }
}
