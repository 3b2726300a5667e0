pub mod accumulator;
pub mod store;
pub mod types;

pub use accumulator::{EvidenceAccumulator, LogState, TestLog};
pub use store::{AGGREGATE_FILE, EvidenceStore, log_file_stem, read_aggregate, write_aggregate};
pub use types::{
    EvidenceError, EvidenceResult, FAILURE_SCREENSHOT_LABEL, SCREENSHOT_LABEL, StepRecord,
    StepStatus, TestResult, TestStatus,
};
