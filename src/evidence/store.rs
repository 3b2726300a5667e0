use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::accumulator::TestLog;
use super::types::{EvidenceResult, TestResult};

/// File name of the aggregate evidence written at the end of a deferred run
pub const AGGREGATE_FILE: &str = "evidences.json";

/// JSON persistence for per-test evidence logs
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    /// Directory holding one JSON file per test
    pub dir: PathBuf,
}

impl EvidenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the log file for a test title
    pub fn log_path(&self, title: &str) -> PathBuf {
        self.dir.join(format!("{}.json", log_file_stem(title)))
    }

    /// Write (or overwrite) the log for one test
    pub fn write_log(&self, log: &TestLog) -> EvidenceResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.log_path(&log.title);
        fs::write(&path, serde_json::to_string_pretty(log)?)?;
        Ok(path)
    }

    /// Read one log file
    pub fn read_log(path: &Path) -> EvidenceResult<TestLog> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// List all JSON log files in the store
    pub fn list_logs(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut logs = Vec::new();
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)? {
                let entry = entry?;
                let path = entry.path();
                let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
                let skipped = path
                    .file_name()
                    .map(|n| n == AGGREGATE_FILE || n.to_string_lossy().starts_with('.'))
                    .unwrap_or(true);
                if path.is_file() && is_json && !skipped {
                    logs.push(path);
                }
            }
        }
        logs.sort();
        Ok(logs)
    }

    /// Load every finalized log as a test result, oldest test first.
    ///
    /// Logs still collecting (a run that died mid-test) and files that do not
    /// parse are skipped.
    pub fn load_results(&self) -> EvidenceResult<Vec<TestResult>> {
        let mut logs = Vec::new();
        for path in self.list_logs()? {
            match Self::read_log(&path) {
                Ok(log) => logs.push(log),
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable evidence log"),
            }
        }
        logs.sort_by(|a, b| a.started_at.cmp(&b.started_at));

        let mut results = Vec::with_capacity(logs.len());
        for log in logs {
            match log.result() {
                Some(result) => results.push(result),
                None => warn!(title = %log.title, "evidence log never finalized, skipping"),
            }
        }
        debug!(dir = %self.dir.display(), count = results.len(), "loaded evidence logs");
        Ok(results)
    }
}

/// Write a list of results as one JSON array
pub fn write_aggregate(path: &Path, results: &[TestResult]) -> EvidenceResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}

/// Read a JSON array of results
pub fn read_aggregate(path: &Path) -> EvidenceResult<Vec<TestResult>> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Title made safe for screenshot folder names: `:` and `/` become `-`
pub fn display_safe_title(title: &str) -> String {
    title.replace([':', '/'], "-")
}

/// File stem for a test's log: lowercase, non-alphanumerics become `_`
pub fn log_file_stem(title: &str) -> String {
    display_safe_title(title)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::types::{StepRecord, TestStatus};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_stem() {
        assert_eq!(log_file_stem("CT01: Login/Logout"), "ct01__login_logout");
        assert_eq!(log_file_stem("Solicitação"), "solicita__o");
        assert_eq!(display_safe_title("a:b/c"), "a-b-c");
    }

    #[test]
    fn test_round_trip_through_directory() {
        let dir = TempDir::new().unwrap();
        let store = EvidenceStore::new(dir.path());

        let mut first = TestLog::new("first");
        first.record(StepRecord::screenshot("1.png")).unwrap();
        first.finalize(TestStatus::Passed).unwrap();
        store.write_log(&first).unwrap();

        let mut second = TestLog::new("second");
        second.started_at = first.started_at + chrono::Duration::seconds(1);
        second.finalize(TestStatus::Failed).unwrap();
        store.write_log(&second).unwrap();

        let open = TestLog::new("still running");
        store.write_log(&open).unwrap();

        assert_eq!(store.list_logs().unwrap().len(), 3);
        let results = store.load_results().unwrap();
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
        assert_eq!(results[1].status, TestStatus::Failed);
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let store = EvidenceStore::new("/definitely/not/here");
        assert!(store.list_logs().unwrap().is_empty());
        assert!(store.load_results().unwrap().is_empty());
    }

    #[test]
    fn test_aggregate_and_hidden_files_are_skipped_by_listing() {
        let dir = TempDir::new().unwrap();
        let store = EvidenceStore::new(dir.path());
        write_aggregate(&dir.path().join(AGGREGATE_FILE), &[]).unwrap();
        fs::write(dir.path().join(".session.json"), "{}").unwrap();
        assert!(store.list_logs().unwrap().is_empty());
        assert!(read_aggregate(&dir.path().join(AGGREGATE_FILE)).unwrap().is_empty());
    }
}
