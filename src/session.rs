//! Report session: the state owned by one test run.
//!
//! A session is created at run start and dropped at run end. It holds:
//! - The feature index, built on first use and immutable afterwards
//! - The per-test evidence log table
//! - The finished test results waiting for the report
//! - Output locations and report options

use once_cell::unsync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::config;
use crate::evidence::{AGGREGATE_FILE, EvidenceAccumulator, EvidenceStore, TestResult};
use crate::evidence::store::display_safe_title;
use crate::gherkin::FeatureIndex;
use crate::report::ReportOptions;

/// Name of the metadata file written into the logs directory
pub const SESSION_METADATA_FILE: &str = ".session.json";

/// State of one evidence-collecting test run
#[derive(Debug)]
pub struct ReportSession {
    /// Unique session ID
    pub id: String,
    /// Roots scanned for feature files
    pub feature_dirs: Vec<PathBuf>,
    /// Per-test JSON logs
    pub logs_dir: PathBuf,
    /// Reports and the aggregate evidence file
    pub output_dir: PathBuf,
    pub options: ReportOptions,
    index: OnceCell<FeatureIndex>,
    accumulator: EvidenceAccumulator,
    results: Vec<TestResult>,
}

impl ReportSession {
    /// Create a session using the configured directories
    pub fn new() -> Self {
        let cfg = config::get();
        Self::with_dirs(
            cfg.paths.feature_dirs.clone(),
            cfg.paths.logs_dir.clone(),
            cfg.paths.output_dir.clone(),
        )
    }

    /// Create a session with explicit directories
    pub fn with_dirs(
        feature_dirs: Vec<PathBuf>,
        logs_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: generate_session_id(),
            feature_dirs,
            logs_dir: logs_dir.into(),
            output_dir: output_dir.into(),
            options: ReportOptions::default(),
            index: OnceCell::new(),
            accumulator: EvidenceAccumulator::new(),
            results: Vec::new(),
        }
    }

    /// Persist every evidence log change under `logs_dir`
    pub fn persist_logs(mut self, persist: bool) -> Self {
        self.accumulator = if persist {
            EvidenceAccumulator::with_store(EvidenceStore::new(&self.logs_dir))
        } else {
            EvidenceAccumulator::new()
        };
        self
    }

    /// Set report options
    pub fn options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }

    /// Use an already built index instead of scanning `feature_dirs`
    pub fn with_index(self, index: FeatureIndex) -> Self {
        Self {
            index: OnceCell::from(index),
            ..self
        }
    }

    /// Create the output directories and write session metadata
    pub fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.logs_dir)?;
        fs::create_dir_all(&self.output_dir)?;

        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
            "feature_dirs": self.feature_dirs,
            "output_dir": self.output_dir,
        });

        let metadata_path = self.logs_dir.join(SESSION_METADATA_FILE);
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        Ok(())
    }

    /// The feature index, scanned from `feature_dirs` on first access
    pub fn index(&self) -> &FeatureIndex {
        self.index.get_or_init(|| {
            let index = FeatureIndex::build(&self.feature_dirs);
            info!(scenarios = index.len(), "loaded feature scenarios");
            index
        })
    }

    pub fn accumulator(&self) -> &EvidenceAccumulator {
        &self.accumulator
    }

    pub fn accumulator_mut(&mut self) -> &mut EvidenceAccumulator {
        &mut self.accumulator
    }

    /// Add a finished test to the report queue
    pub fn push_result(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Path of the consolidated report
    pub fn report_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.output_dir.join(format!("Evidence_Report_{}.pdf", stamp))
    }

    /// Path of a single test's report
    pub fn test_report_path(&self, title: &str) -> PathBuf {
        self.output_dir.join(format!("{}.pdf", report_file_stem(title)))
    }

    /// Path of the aggregate evidence file
    pub fn aggregate_path(&self) -> PathBuf {
        self.output_dir.join(AGGREGATE_FILE)
    }

    /// Per-test log files written so far
    pub fn list_logs(&self) -> std::io::Result<Vec<PathBuf>> {
        EvidenceStore::new(&self.logs_dir).list_logs()
    }
}

impl Default for ReportSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let pid = std::process::id();
    format!("session_{}_{}", timestamp, pid)
}

/// File stem for a per-test report: keeps the title readable, drops
/// characters that are invalid in file names
fn report_file_stem(title: &str) -> String {
    display_safe_title(title)
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Whether `dir` holds a session metadata file
pub fn is_session_dir(dir: &Path) -> bool {
    dir.join(SESSION_METADATA_FILE).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_id() {
        let session = ReportSession::with_dirs(vec![], "logs", "out");
        assert!(session.id.starts_with("session_"));
    }

    #[test]
    fn test_report_file_stem() {
        assert_eq!(report_file_stem("CT01: Login/Logout?"), "CT01- Login-Logout_");
        assert_eq!(report_file_stem("  Solicitação  "), "Solicitação");
    }

    #[test]
    fn test_paths() {
        let session = ReportSession::with_dirs(vec![], "logs", "out");
        assert_eq!(session.test_report_path("a:b"), PathBuf::from("out/a-b.pdf"));
        assert_eq!(session.aggregate_path(), PathBuf::from("out").join(AGGREGATE_FILE));
        let report = session.report_path();
        assert!(report.file_name().unwrap().to_string_lossy().starts_with("Evidence_Report_"));
    }

    #[test]
    fn test_init_writes_metadata() {
        let dir = TempDir::new().unwrap();
        let session = ReportSession::with_dirs(vec![], dir.path().join("logs"), dir.path().join("out"));
        session.init().unwrap();
        assert!(is_session_dir(&session.logs_dir));
        assert!(session.output_dir.is_dir());
    }

    #[test]
    fn test_index_is_built_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.feature"), "Scenario: One\n  Given x\n").unwrap();
        let session = ReportSession::with_dirs(vec![dir.path().to_path_buf()], "logs", "out");
        assert_eq!(session.index().len(), 1);

        fs::write(dir.path().join("b.feature"), "Scenario: Two\n  Given y\n").unwrap();
        assert_eq!(session.index().len(), 1);
    }

    #[test]
    fn test_prebuilt_index_is_used() {
        let mut index = FeatureIndex::new();
        index.parse_str("Scenario: Pre\n  Given z\n", None);
        let session = ReportSession::with_dirs(vec![], "logs", "out").with_index(index);
        assert!(session.index().get("Pre").is_some());
    }
}
