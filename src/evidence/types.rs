// Core types for evidence collection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Label given to routine screenshots
pub const SCREENSHOT_LABEL: &str = "Screenshot Captured";

/// Label given to screenshots the runner takes on failure
pub const FAILURE_SCREENSHOT_LABEL: &str = "Failure Detected (Screenshot)";

/// Status of a single evidence entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Screenshot,
}

/// Final state of a test as reported by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Pending,
    Skipped,
}

impl TestStatus {
    pub fn is_failed(self) -> bool {
        self == TestStatus::Failed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Pending => "pending",
            TestStatus::Skipped => "skipped",
        }
    }
}

impl FromStr for TestStatus {
    type Err = EvidenceError;

    /// Parse a runner state string, ignoring case and surrounding space
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "passed" => Ok(TestStatus::Passed),
            "failed" => Ok(TestStatus::Failed),
            "pending" => Ok(TestStatus::Pending),
            "skipped" => Ok(TestStatus::Skipped),
            _ => Err(EvidenceError::UnknownStatus(s.to_string())),
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TestStatus> for StepStatus {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Failed => StepStatus::Failed,
            // The evidence trail only distinguishes failure from success.
            TestStatus::Passed | TestStatus::Pending | TestStatus::Skipped => StepStatus::Passed,
        }
    }
}

/// One entry in a test's evidence trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step text or a generic screenshot label
    #[serde(rename = "step")]
    pub label: String,

    pub status: StepStatus,

    /// Screenshot file, if this entry carries one
    pub screenshot: Option<PathBuf>,

    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    /// Create a record stamped with the current time
    pub fn new(label: impl Into<String>, status: StepStatus, screenshot: Option<PathBuf>) -> Self {
        Self {
            label: label.into(),
            status,
            screenshot,
            timestamp: Utc::now(),
        }
    }

    /// A routine screenshot entry
    pub fn screenshot(path: impl Into<PathBuf>) -> Self {
        Self::new(SCREENSHOT_LABEL, StepStatus::Screenshot, Some(path.into()))
    }

    /// A screenshot taken because the test failed
    pub fn failure_screenshot(path: impl Into<PathBuf>) -> Self {
        Self::new(FAILURE_SCREENSHOT_LABEL, StepStatus::Failed, Some(path.into()))
    }

    /// Whether the label is one of the generic placeholders rather than step text
    pub fn has_custom_label(&self) -> bool {
        !self.label.is_empty() && self.label != SCREENSHOT_LABEL && !self.label.starts_with("final_")
    }
}

/// A finished test and its evidence trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub title: String,
    pub status: TestStatus,
    pub steps: Vec<StepRecord>,
}

impl TestResult {
    /// Entries that reference a screenshot
    pub fn screenshots(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.screenshot.is_some())
    }
}

/// Result type for evidence operations
pub type EvidenceResult<T> = Result<T, EvidenceError>;

/// Error types for evidence operations
#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Evidence log for '{0}' is already finalized")]
    Finalized(String),

    #[error("No evidence log open for '{0}'")]
    UnknownTest(String),

    #[error("Unknown test status '{0}'")]
    UnknownStatus(String),
}
