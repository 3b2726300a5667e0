//! BDD Evidence - PDF evidence reports for BDD browser test runs.
//!
//! This crate provides:
//! - Feature file indexing (scenario title -> step lines)
//! - Tolerant matching of runtime test titles to scenarios
//! - Per-test evidence logs built from lifecycle events
//! - Paginated PDF reports with header, status, BDD steps and screenshots
//! - A lifecycle pipeline that ties it together for one test run
//!
//! # Example
//!
//! ```rust,no_run
//! use bdd_evidence::{EvidencePipeline, LifecycleHooks, PipelineMode, ReportSession, ScreenshotEvent, TestStatus};
//!
//! # async fn run() {
//! let session = ReportSession::new().persist_logs(true);
//! let mut pipeline = EvidencePipeline::new(session, PipelineMode::configured());
//!
//! pipeline.before_test("CT01 login with valid user");
//! pipeline.after_screenshot(
//!     "CT01 login with valid user",
//!     &ScreenshotEvent::new("cypress/screenshots/login.png", "login"),
//! );
//! pipeline.after_test("CT01 login with valid user", TestStatus::Passed);
//!
//! let run = pipeline.after_run().await;
//! for report in &run.reports {
//!     println!("{}", report.path.display());
//! }
//! # }
//! ```

pub mod config;
pub mod evidence;
pub mod gherkin;
pub mod pipeline;
pub mod report;
pub mod session;

// Re-export evidence types
pub use evidence::{
    EvidenceAccumulator, EvidenceError, EvidenceResult, EvidenceStore, StepRecord, StepStatus,
    TestLog, TestResult, TestStatus,
};

// Re-export feature index and matcher
pub use gherkin::{FeatureIndex, MatchKind, ScenarioLookup, ScenarioRecord, find_scenario, normalize_title};

// Re-export report rendering
pub use report::{
    RenderSummary, RenderedReport, ReportError, ReportOptions, ReportResult, WrittenReport,
    render_report, render_to_file,
};

// Re-export pipeline and session
pub use pipeline::{
    EvidencePipeline, LifecycleEvent, LifecycleHooks, PipelineMode, RunReport, ScreenshotEvent,
    UnknownMode, parse_event_lines,
};
pub use session::ReportSession;
