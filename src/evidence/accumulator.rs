//! Per-test evidence logs.
//!
//! Each test owns a `TestLog` that moves from `Collecting` to `Finalized`
//! exactly once. Finalizing reconciles the last entry with the test's real
//! outcome, so a test that failed after its last screenshot still ends with
//! a failed entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::store::EvidenceStore;
use super::types::{EvidenceError, EvidenceResult, StepRecord, StepStatus, TestResult, TestStatus};

/// Lifecycle state of a test log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogState {
    Collecting,
    Finalized,
}

/// Evidence collected for one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestLog {
    pub title: String,
    pub state: LogState,
    pub started_at: DateTime<Utc>,
    /// Final status, set when the log is finalized
    pub status: Option<TestStatus>,
    pub steps: Vec<StepRecord>,
}

impl TestLog {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: LogState::Collecting,
            started_at: Utc::now(),
            status: None,
            steps: Vec::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state == LogState::Finalized
    }

    /// Append an entry. Fails once the log is finalized.
    pub fn record(&mut self, step: StepRecord) -> EvidenceResult<()> {
        if self.is_finalized() {
            return Err(EvidenceError::Finalized(self.title.clone()));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Close the log with the test's final status.
    ///
    /// If the last entry carries a screenshot it becomes the final-state
    /// entry (relabelled with the test title); otherwise a screenshot-less
    /// entry is appended.
    pub fn finalize(&mut self, status: TestStatus) -> EvidenceResult<TestResult> {
        if self.is_finalized() {
            return Err(EvidenceError::Finalized(self.title.clone()));
        }

        let step_status = StepStatus::from(status);
        match self.steps.last_mut() {
            Some(last) if last.screenshot.is_some() => {
                last.label = self.title.clone();
                last.status = step_status;
            }
            _ => self.steps.push(StepRecord::new(self.title.clone(), step_status, None)),
        }

        self.state = LogState::Finalized;
        self.status = Some(status);
        Ok(self.to_result(status))
    }

    fn to_result(&self, status: TestStatus) -> TestResult {
        TestResult {
            title: self.title.clone(),
            status,
            steps: self.steps.clone(),
        }
    }

    /// The finished result, if this log has been finalized
    pub fn result(&self) -> Option<TestResult> {
        match (self.state, self.status) {
            (LogState::Finalized, Some(status)) => Some(self.to_result(status)),
            _ => None,
        }
    }
}

/// Table of open test logs, cleared at every test boundary.
///
/// When a store is attached, every change is persisted so the report can be
/// rendered later from disk.
#[derive(Debug, Default)]
pub struct EvidenceAccumulator {
    logs: HashMap<String, TestLog>,
    store: Option<EvidenceStore>,
}

impl EvidenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist every log change through `store`
    pub fn with_store(store: EvidenceStore) -> Self {
        Self {
            logs: HashMap::new(),
            store: Some(store),
        }
    }

    pub fn store(&self) -> Option<&EvidenceStore> {
        self.store.as_ref()
    }

    /// Start a fresh log for `title`, discarding logs of earlier tests
    pub fn begin(&mut self, title: &str) -> EvidenceResult<()> {
        self.logs.clear();
        let log = TestLog::new(title);
        self.persist(&log)?;
        self.logs.insert(title.to_string(), log);
        Ok(())
    }

    /// Append an entry to the open log for `title`.
    ///
    /// Entries for a test that was never begun are dropped.
    pub fn record(&mut self, title: &str, step: StepRecord) -> EvidenceResult<()> {
        let Some(log) = self.logs.get_mut(title) else {
            debug!(title, "no open evidence log, dropping record");
            return Ok(());
        };
        log.record(step)?;
        if let Some(store) = &self.store {
            store.write_log(log)?;
        }
        Ok(())
    }

    /// Finalize the log for `title` and return its result
    pub fn finalize(&mut self, title: &str, status: TestStatus) -> EvidenceResult<TestResult> {
        let log = self
            .logs
            .get_mut(title)
            .ok_or_else(|| EvidenceError::UnknownTest(title.to_string()))?;
        let result = log.finalize(status)?;
        if let Some(store) = &self.store {
            store.write_log(log)?;
        }
        Ok(result)
    }

    /// The current log for `title`, if open
    pub fn log(&self, title: &str) -> Option<&TestLog> {
        self.logs.get(title)
    }

    fn persist(&self, log: &TestLog) -> EvidenceResult<()> {
        if let Some(store) = &self.store {
            if let Err(e) = store.write_log(log) {
                warn!(title = %log.title, error = %e, "failed to persist evidence log");
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn finalize_relabels_trailing_screenshot() {
        let mut log = TestLog::new("CT01 login");
        log.record(StepRecord::screenshot("a.png")).unwrap();
        log.record(StepRecord::screenshot("b.png")).unwrap();

        let result = log.finalize(TestStatus::Failed).unwrap();
        assert_eq!(result.steps.len(), 2);
        let last = result.steps.last().unwrap();
        assert_eq!(last.label, "CT01 login");
        assert_eq!(last.status, StepStatus::Failed);
        assert_eq!(last.screenshot, Some(PathBuf::from("b.png")));
        assert_eq!(result.steps[0].status, StepStatus::Screenshot);
    }

    #[test]
    fn finalize_appends_entry_without_trailing_screenshot() {
        let mut log = TestLog::new("CT02");
        log.record(StepRecord::new("Given x", StepStatus::Passed, None)).unwrap();

        let result = log.finalize(TestStatus::Passed).unwrap();
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[1].label, "CT02");
        assert_eq!(result.steps[1].screenshot, None);
        assert_eq!(result.status, TestStatus::Passed);
    }

    #[test]
    fn finalize_empty_log_appends_entry() {
        let mut log = TestLog::new("CT03");
        let result = log.finalize(TestStatus::Failed).unwrap();
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].status, StepStatus::Failed);
    }

    #[test]
    fn finalized_log_rejects_changes() {
        let mut log = TestLog::new("CT04");
        log.finalize(TestStatus::Passed).unwrap();
        assert!(matches!(
            log.record(StepRecord::screenshot("late.png")),
            Err(EvidenceError::Finalized(_))
        ));
        assert!(matches!(log.finalize(TestStatus::Failed), Err(EvidenceError::Finalized(_))));
        assert_eq!(log.result().unwrap().status, TestStatus::Passed);
    }

    #[test]
    fn accumulator_clears_table_at_test_boundary() {
        let mut acc = EvidenceAccumulator::new();
        acc.begin("first").unwrap();
        acc.record("first", StepRecord::screenshot("1.png")).unwrap();
        acc.begin("second").unwrap();
        assert!(acc.log("first").is_none());
        assert!(acc.log("second").unwrap().steps.is_empty());
    }

    #[test]
    fn accumulator_drops_records_for_unknown_tests() {
        let mut acc = EvidenceAccumulator::new();
        acc.record("ghost", StepRecord::screenshot("1.png")).unwrap();
        assert!(acc.log("ghost").is_none());
        assert!(matches!(
            acc.finalize("ghost", TestStatus::Passed),
            Err(EvidenceError::UnknownTest(_))
        ));
    }
}
