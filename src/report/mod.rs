pub mod layout;
pub mod metrics;
pub mod pdf;
pub mod render;
pub mod types;

pub use layout::{Cursor, LayoutConfig, Rgb, fit_within, parse_hex_color};
pub use metrics::{Font, text_width, wrap_text};
pub use pdf::{ImageHandle, PdfCanvas};
pub use render::{
    IMAGE_ERROR_MARKER, PLACEHOLDER_LABEL, ReportOptions, render_report, render_to_file,
    write_report,
};
pub use types::{BlockKind, Placement, RenderSummary, RenderedReport, ReportError, ReportResult, WrittenReport};
