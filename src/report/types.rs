// Types shared by the report renderer

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of block placed on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Header,
    Title,
    Status,
    Bdd,
    Label,
    Image,
    ImageError,
    Separator,
}

/// Where a block ended up; positions are measured from the top of the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    /// Zero-based page number
    pub page: usize,
    pub kind: BlockKind,
    pub top: f32,
    pub bottom: f32,
}

/// What the renderer produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderSummary {
    pub pages: usize,
    pub tests: usize,
    /// Screenshots embedded in the document
    pub images: usize,
    /// Records whose screenshot file did not exist
    pub missing_images: usize,
    /// Screenshots that existed but could not be decoded
    pub image_errors: usize,
    /// Tests that got a BDD block
    pub bdd_blocks: usize,
    pub placements: Vec<Placement>,
}

impl RenderSummary {
    /// Placements of one kind, in drawing order
    pub fn blocks(&self, kind: BlockKind) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(move |p| p.kind == kind)
    }
}

/// A rendered report held in memory
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub summary: RenderSummary,
}

/// Outcome of writing a report to disk
#[derive(Debug, Clone, Serialize)]
pub struct WrittenReport {
    pub path: PathBuf,
    pub summary: RenderSummary,
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Error types for report operations
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Evidence error: {0}")]
    Evidence(#[from] crate::evidence::EvidenceError),
}
