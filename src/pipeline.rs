//! Evidence pipeline: turns test-runner lifecycle events into evidence logs
//! and, at the end of the run, into reports.
//!
//! Evidence generation is best effort. Hook failures and report failures are
//! logged and collected in the `RunReport`; they never reach the runner as
//! test failures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config;
use crate::evidence::{EvidenceResult, StepRecord, TestStatus, write_aggregate};
use crate::report::{WrittenReport, render_report, render_to_file};
use crate::session::ReportSession;

/// What happens with the collected evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    /// One report for the whole run, written when the run ends
    Consolidated,
    /// One report per test, written as each test ends
    PerTest,
    /// Only persist evidence; render later with the offline entry point
    Deferred,
}

/// A mode name that is none of `consolidated`, `per-test` or `deferred`
#[derive(Debug, Error)]
#[error("unknown evidence mode '{0}', expected consolidated, per-test or deferred")]
pub struct UnknownMode(pub String);

impl FromStr for PipelineMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "consolidated" => Ok(PipelineMode::Consolidated),
            "per-test" | "per_test" | "pertest" => Ok(PipelineMode::PerTest),
            "deferred" => Ok(PipelineMode::Deferred),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

impl PipelineMode {
    /// Mode from the environment; an unknown value falls back to consolidated
    pub fn configured() -> Self {
        config::get().mode.parse().unwrap_or_else(|e: UnknownMode| {
            warn!(error = %e, "using consolidated evidence mode");
            PipelineMode::Consolidated
        })
    }
}

/// A screenshot the runner just saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotEvent {
    pub path: PathBuf,
    /// Screenshot name given by the runner
    #[serde(default)]
    pub name: String,
}

impl ScreenshotEvent {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// The runner marks automatic failure screenshots with `(failed)`
    pub fn is_failure(&self) -> bool {
        self.path.to_string_lossy().contains("(failed)") || self.name.contains("(failed)")
    }

    pub fn to_record(&self) -> StepRecord {
        if self.is_failure() {
            StepRecord::failure_screenshot(&self.path)
        } else {
            StepRecord::screenshot(&self.path)
        }
    }
}

/// Hooks the test runner calls while tests execute
pub trait LifecycleHooks {
    /// A test is about to start
    fn before_test(&mut self, title: &str);

    /// The runner saved a screenshot during `title`
    fn after_screenshot(&mut self, title: &str, shot: &ScreenshotEvent);

    /// `title` finished with `status`
    fn after_test(&mut self, title: &str, status: TestStatus);
}

/// A lifecycle event as streamed by an out-of-process runner (one JSON object per line)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    BeforeTest {
        title: String,
    },
    AfterScreenshot {
        title: String,
        path: PathBuf,
        #[serde(default)]
        name: String,
    },
    AfterTest {
        title: String,
        status: TestStatus,
    },
    AfterRun,
}

/// Parse JSON-lines lifecycle events, ignoring blank lines
pub fn parse_event_lines(text: &str) -> EvidenceResult<Vec<LifecycleEvent>> {
    let mut events = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}

/// Outcome of a run as seen by the evidence pipeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub tests: usize,
    pub passed: usize,
    pub failed: usize,
    /// Reports written during the run
    pub reports: Vec<WrittenReport>,
    /// Aggregate evidence file, in deferred mode
    pub aggregate: Option<PathBuf>,
    /// Evidence problems; informational only
    pub errors: Vec<String>,
}

/// Lifecycle hooks wired to a report session
#[derive(Debug)]
pub struct EvidencePipeline {
    session: ReportSession,
    mode: PipelineMode,
    run: RunReport,
}

impl EvidencePipeline {
    pub fn new(session: ReportSession, mode: PipelineMode) -> Self {
        Self {
            session,
            mode,
            run: RunReport::default(),
        }
    }

    pub fn session(&self) -> &ReportSession {
        &self.session
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    fn note_error(&mut self, context: &str, err: impl std::fmt::Display) {
        warn!(context, error = %err, "evidence pipeline error");
        self.run.errors.push(format!("{}: {}", context, err));
    }

    fn write_test_report(&mut self, title: &str) {
        let Some(result) = self.session.results().last().cloned() else {
            return;
        };
        let path = self.session.test_report_path(title);
        let rendered = render_report(
            std::slice::from_ref(&result),
            self.session.index(),
            &self.session.options,
        )
        .and_then(|report| report.write_to(&path).map(|_| report));

        match rendered {
            Ok(report) => {
                info!(path = %path.display(), "test evidence report written");
                self.run.reports.push(WrittenReport {
                    path,
                    summary: report.summary,
                });
            }
            Err(e) => {
                error!(test = title, error = %e, "failed to write test evidence report");
                self.note_error("per-test report", e);
            }
        }
    }

    /// Finish the run: render or persist everything collected.
    ///
    /// Returns once any report file is fully written.
    pub async fn after_run(&mut self) -> RunReport {
        match self.mode {
            PipelineMode::Consolidated => {
                let path = self.session.report_path();
                let written = render_to_file(
                    self.session.results(),
                    self.session.index(),
                    &self.session.options,
                    &path,
                )
                .await;
                match written {
                    Ok(report) => self.run.reports.push(report),
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "failed to write evidence report");
                        self.note_error("consolidated report", e);
                    }
                }
            }
            PipelineMode::PerTest => {}
            PipelineMode::Deferred => {
                let path = self.session.aggregate_path();
                match write_aggregate(&path, self.session.results()) {
                    Ok(()) => {
                        info!(path = %path.display(), tests = self.session.results().len(), "evidence persisted for offline rendering");
                        self.run.aggregate = Some(path);
                    }
                    Err(e) => self.note_error("aggregate evidence", e),
                }
            }
        }
        std::mem::take(&mut self.run)
    }

    /// Feed events through the hooks. The run is finished at the first
    /// `AfterRun` event, or after the last event if none arrives.
    pub async fn replay<I>(&mut self, events: I) -> RunReport
    where
        I: IntoIterator<Item = LifecycleEvent>,
    {
        for event in events {
            match event {
                LifecycleEvent::BeforeTest { title } => self.before_test(&title),
                LifecycleEvent::AfterScreenshot { title, path, name } => {
                    self.after_screenshot(&title, &ScreenshotEvent { path, name })
                }
                LifecycleEvent::AfterTest { title, status } => self.after_test(&title, status),
                LifecycleEvent::AfterRun => return self.after_run().await,
            }
        }
        self.after_run().await
    }
}

impl LifecycleHooks for EvidencePipeline {
    fn before_test(&mut self, title: &str) {
        debug!(test = title, "evidence log opened");
        if let Err(e) = self.session.accumulator_mut().begin(title) {
            self.note_error("begin test", e);
        }
    }

    fn after_screenshot(&mut self, title: &str, shot: &ScreenshotEvent) {
        let record = shot.to_record();
        if let Err(e) = self.session.accumulator_mut().record(title, record) {
            self.note_error("record screenshot", e);
        }
    }

    fn after_test(&mut self, title: &str, status: TestStatus) {
        let result = match self.session.accumulator_mut().finalize(title, status) {
            Ok(result) => result,
            Err(e) => {
                self.note_error("finalize test", e);
                return;
            }
        };

        self.run.tests += 1;
        if status.is_failed() {
            self.run.failed += 1;
        } else if status == TestStatus::Passed {
            self.run.passed += 1;
        }
        self.session.push_result(result);

        if self.mode == PipelineMode::PerTest {
            self.write_test_report(title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gherkin::FeatureIndex;
    use crate::report::ReportOptions;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn pipeline(dir: &TempDir, mode: PipelineMode) -> EvidencePipeline {
        let session = ReportSession::with_dirs(vec![], dir.path().join("logs"), dir.path().join("out"))
            .persist_logs(true)
            .options(ReportOptions::new().logo(None).host(None))
            .with_index(FeatureIndex::new());
        EvidencePipeline::new(session, mode)
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Consolidated".parse::<PipelineMode>().unwrap(), PipelineMode::Consolidated);
        assert_eq!("per_test".parse::<PipelineMode>().unwrap(), PipelineMode::PerTest);
        assert_eq!("deferred".parse::<PipelineMode>().unwrap(), PipelineMode::Deferred);
        let err = "other".parse::<PipelineMode>().unwrap_err();
        assert_eq!(err.0, "other");
    }

    #[test]
    fn test_failure_screenshot_detection() {
        assert!(ScreenshotEvent::new("shots/CT01 (failed).png", "").is_failure());
        assert!(ScreenshotEvent::new("shots/x.png", "CT01 -- (failed)").is_failure());
        assert!(!ScreenshotEvent::new("shots/x.png", "after-each/CT01").is_failure());
    }

    #[test]
    fn test_parse_event_lines() {
        let events = parse_event_lines(
            r#"{"event":"before_test","title":"CT01"}

{"event":"after_screenshot","title":"CT01","path":"a.png"}
{"event":"after_test","title":"CT01","status":"failed"}
{"event":"after_run"}"#,
        )
        .unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[1],
            LifecycleEvent::AfterScreenshot {
                title: "CT01".to_string(),
                path: PathBuf::from("a.png"),
                name: String::new(),
            }
        );
        assert!(parse_event_lines("{not json}").is_err());
    }

    #[tokio::test]
    async fn test_hooks_accumulate_and_persist() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, PipelineMode::Deferred);

        pipeline.before_test("CT01");
        pipeline.after_screenshot("CT01", &ScreenshotEvent::new("a.png", "step"));
        pipeline.after_test("CT01", TestStatus::Failed);
        pipeline.before_test("CT02");
        pipeline.after_test("CT02", TestStatus::Passed);

        assert_eq!(pipeline.session().list_logs().unwrap().len(), 2);

        let run = pipeline.after_run().await;
        assert_eq!((run.tests, run.passed, run.failed), (2, 1, 1));
        assert!(run.reports.is_empty());
        let aggregate = run.aggregate.unwrap();
        let results = crate::evidence::read_aggregate(&aggregate).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].steps[0].label, "CT01");
        assert_eq!(results[0].steps[0].status, crate::evidence::StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_screenshot_outside_test_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, PipelineMode::Deferred);
        pipeline.after_screenshot("nobody", &ScreenshotEvent::new("a.png", ""));
        pipeline.after_test("nobody", TestStatus::Passed);
        let run = pipeline.after_run().await;
        assert_eq!(run.tests, 0);
        assert_eq!(run.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_consolidated_report_written() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, PipelineMode::Consolidated);
        let run = pipeline.replay(Vec::<LifecycleEvent>::new()).await;
        assert_eq!(run.reports.len(), 1);
        assert!(run.reports[0].path.exists());
        assert_eq!(run.reports[0].summary.pages, 1);
    }

    #[tokio::test]
    async fn test_report_write_failure_is_recorded_not_raised() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("out");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let mut pipeline = pipeline(&dir, PipelineMode::Consolidated);
        pipeline.before_test("CT01");
        pipeline.after_test("CT01", TestStatus::Failed);

        let run = pipeline.after_run().await;
        assert_eq!((run.tests, run.passed, run.failed), (1, 0, 1));
        assert!(run.reports.is_empty());
        assert_eq!(run.errors.len(), 1);
        assert!(run.errors[0].starts_with("consolidated report:"), "{}", run.errors[0]);
        assert_eq!(pipeline.session().results()[0].status, TestStatus::Failed);
    }

    #[tokio::test]
    async fn test_per_test_reports_written() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, PipelineMode::PerTest);
        let events = vec![
            LifecycleEvent::BeforeTest { title: "CT01: a".to_string() },
            LifecycleEvent::AfterTest { title: "CT01: a".to_string(), status: TestStatus::Passed },
            LifecycleEvent::BeforeTest { title: "CT02".to_string() },
            LifecycleEvent::AfterTest { title: "CT02".to_string(), status: TestStatus::Failed },
            LifecycleEvent::AfterRun,
        ];
        let run = pipeline.replay(events).await;
        assert_eq!(run.reports.len(), 2);
        assert!(dir.path().join("out").join("CT01- a.pdf").exists());
    }
}
