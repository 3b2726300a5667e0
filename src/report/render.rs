//! Evidence report layout.
//!
//! The document starts with a header block (band, logo, organization,
//! generation time, environment). Each test then gets a title, a two-tone
//! status line, its BDD steps (once), and one block per screenshot that
//! exists on disk, followed by a separator rule.
//!
//! Two page-break thresholds apply: `text_break_y` before a test section and
//! the stricter `image_break_y` before an image block. An evidence block
//! (label, owed BDD steps, image) that would still cross the bottom margin
//! moves to the next page whole, so an image never leaves its label behind.

use chrono::{DateTime, Local};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::layout::{Cursor, LayoutConfig, Rgb, fit_within};
use super::metrics::{Font, text_width, wrap_text};
use super::pdf::PdfCanvas;
use super::types::{BlockKind, Placement, RenderSummary, RenderedReport, ReportResult, WrittenReport};
use crate::config;
use crate::evidence::{StepRecord, TestResult};
use crate::gherkin::ScenarioLookup;

/// Label drawn above screenshots that carry no step text
pub const PLACEHOLDER_LABEL: &str = "Screenshot";

/// Inline marker replacing a screenshot that could not be decoded
pub const IMAGE_ERROR_MARKER: &str = "[Error loading image]";

const TITLE_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const SMALL_SIZE: f32 = 9.0;

/// Header content and layout of a report
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub company_name: String,
    pub subtitle: String,
    pub environment: String,
    pub device: String,
    /// Machine the run happened on
    pub host: Option<String>,
    /// Logo drawn at the top right of the first page, when the file exists
    pub logo_path: Option<PathBuf>,
    pub generated_at: DateTime<Local>,
    pub layout: LayoutConfig,
}

impl Default for ReportOptions {
    fn default() -> Self {
        let cfg = &config::get().report;
        Self {
            company_name: cfg.company_name.clone(),
            subtitle: cfg.subtitle.clone(),
            environment: cfg.environment.clone(),
            device: cfg.device.clone(),
            host: hostname::get().ok().map(|h| h.to_string_lossy().to_string()),
            logo_path: Some(cfg.logo_path.clone()),
            generated_at: Local::now(),
            layout: LayoutConfig::default(),
        }
    }
}

impl ReportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn company_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = name.into();
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    pub fn logo(mut self, path: Option<PathBuf>) -> Self {
        self.logo_path = path;
        self
    }

    pub fn generated_at(mut self, at: DateTime<Local>) -> Self {
        self.generated_at = at;
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    fn environment_line(&self) -> String {
        let mut line = format!("Environment: {} | Device: {}", self.environment, self.device);
        if let Some(host) = &self.host {
            line.push_str(&format!(" | Host: {}", host));
        }
        line
    }
}

/// Whether the BDD block of the current test is still owed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BddBlock<'s> {
    Pending(&'s [String]),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

struct ReportWriter<'a> {
    canvas: PdfCanvas,
    cursor: Cursor,
    layout: &'a LayoutConfig,
    summary: RenderSummary,
}

impl<'a> ReportWriter<'a> {
    fn new(layout: &'a LayoutConfig) -> Self {
        let mut canvas = PdfCanvas::new(layout.page_width, layout.page_height);
        canvas.add_page();
        Self {
            canvas,
            cursor: Cursor::new(layout.margin),
            layout,
            summary: RenderSummary::default(),
        }
    }

    fn place(&mut self, kind: BlockKind, top: f32, bottom: f32) {
        self.summary.placements.push(Placement {
            page: self.cursor.page,
            kind,
            top,
            bottom,
        });
    }

    fn band(&mut self) {
        let layout = self.layout;
        self.canvas.fill_rect(
            0.0,
            0.0,
            layout.page_width,
            layout.header_band_height,
            layout.band_color,
        );
    }

    /// First content position on continuation pages
    fn page_top(&self) -> f32 {
        self.layout.margin + 2.0 * self.layout.line_height(BODY_SIZE)
    }

    fn new_page(&mut self) {
        self.canvas.add_page();
        self.band();
        let top = self.page_top();
        self.cursor.next_page(top);
        self.place(BlockKind::Header, 0.0, self.layout.header_band_height);
    }

    /// Start a new page if the cursor is already past `threshold`
    fn break_after(&mut self, threshold: f32) {
        if self.cursor.y > threshold {
            self.new_page();
        }
    }

    fn move_down(&mut self, lines: f32, size: f32) {
        self.cursor.advance(lines * self.layout.line_height(size));
    }

    fn text_height(&self, text: &str, font: Font, size: f32) -> f32 {
        let lines = wrap_text(text, font, size, self.layout.content_width()).len();
        lines as f32 * self.layout.line_height(size)
    }

    fn bdd_height(&self, steps: &[String]) -> f32 {
        let lines: f32 = steps
            .iter()
            .map(|step| self.text_height(step, Font::Regular, SMALL_SIZE))
            .sum();
        lines + 0.5 * self.layout.line_height(SMALL_SIZE)
    }

    /// Wrapped text at the cursor. Lines that would cross the bottom margin
    /// continue on a new page.
    fn write_text(&mut self, kind: BlockKind, text: &str, font: Font, size: f32, color: Rgb, align: Align) {
        let layout = self.layout;
        let line_height = layout.line_height(size);
        let lines = wrap_text(text, font, size, layout.content_width());

        let mut segment_top = self.cursor.y;
        for line in lines {
            if self.cursor.overflows(line_height, layout.bottom_limit()) {
                if self.cursor.y > segment_top {
                    self.place(kind, segment_top, self.cursor.y);
                }
                self.new_page();
                segment_top = self.cursor.y;
            }
            let x = match align {
                Align::Left => layout.margin,
                Align::Center => {
                    let width = text_width(&line, font, size);
                    layout.margin + ((layout.content_width() - width) / 2.0).max(0.0)
                }
            };
            self.canvas.text(x, self.cursor.y, font, size, color, &line);
            self.cursor.advance(line_height);
        }
        self.place(kind, segment_top, self.cursor.y);
    }

    fn header(&mut self, options: &ReportOptions) {
        let layout = self.layout;
        self.band();

        if let Some(logo) = options.logo_path.as_deref().filter(|p| p.exists()) {
            match load_image(logo) {
                Ok(image) => {
                    let (w, h) = fit_within(
                        image.width() as f32,
                        image.height() as f32,
                        layout.logo_max_width,
                        layout.logo_max_height,
                    );
                    let x = layout.page_width - layout.margin - w;
                    let handle = self.canvas.embed_image(image);
                    self.canvas.draw_image(handle, x, 40.0, w, h);
                }
                Err(e) => warn!(logo = %logo.display(), error = %e, "could not load report logo"),
            }
        }

        let m = layout.margin;
        self.canvas
            .text(m, 50.0, Font::Bold, 14.0, layout.text_color, &options.company_name);
        self.canvas
            .text(m, 70.0, Font::Regular, TITLE_SIZE, layout.text_color, &options.subtitle);
        let date = format!("Date: {}", options.generated_at.format("%Y-%m-%d %H:%M:%S"));
        self.canvas
            .text(m, 90.0, Font::Regular, BODY_SIZE, layout.muted_color, &date);
        self.canvas.text(
            m,
            105.0,
            Font::Regular,
            BODY_SIZE,
            layout.muted_color,
            &options.environment_line(),
        );
        self.place(BlockKind::Header, 0.0, layout.content_top);

        self.cursor.y = layout.content_top;
        self.move_down(1.0, BODY_SIZE);
    }

    fn test_section(&mut self, test: &TestResult, lookup: &dyn ScenarioLookup) {
        let layout = self.layout;
        self.break_after(layout.text_break_y);

        self.write_text(BlockKind::Title, &test.title, Font::Bold, TITLE_SIZE, layout.text_color, Align::Left);
        let status_color = if test.status.is_failed() {
            layout.failed_color
        } else {
            layout.passed_color
        };
        let status = format!("Status: {}", test.status.as_str().to_uppercase());
        self.write_text(BlockKind::Status, &status, Font::Regular, BODY_SIZE, status_color, Align::Left);
        self.move_down(0.5, BODY_SIZE);

        let mut bdd = match lookup.steps_for(&test.title) {
            Some(steps) if !steps.is_empty() => BddBlock::Pending(steps),
            _ => BddBlock::Done,
        };

        for step in &test.steps {
            let Some(path) = step.screenshot.as_deref() else {
                continue;
            };
            if !path.exists() {
                debug!(test = %test.title, screenshot = %path.display(), "screenshot missing, block omitted");
                self.summary.missing_images += 1;
                continue;
            }
            self.evidence_block(step, path, &mut bdd);
        }

        if let BddBlock::Pending(steps) = bdd {
            self.bdd_block(steps);
        }

        self.separator();
        self.summary.tests += 1;
    }

    fn evidence_block(&mut self, step: &StepRecord, path: &Path, bdd: &mut BddBlock<'_>) {
        let layout = self.layout;
        self.break_after(layout.image_break_y);

        let (label, font, size, color, align) = if step.has_custom_label() {
            (step.label.as_str(), Font::Bold, BODY_SIZE, layout.text_color, Align::Left)
        } else {
            (PLACEHOLDER_LABEL, Font::Regular, SMALL_SIZE, layout.muted_color, Align::Center)
        };
        let image = load_image(path);

        // Label, owed BDD block and image go on the same page.
        let body_height = match &image {
            Ok(image) => {
                fit_within(
                    image.width() as f32,
                    image.height() as f32,
                    layout.image_max_width,
                    layout.image_max_height,
                )
                .1
            }
            Err(_) => layout.line_height(BODY_SIZE),
        };
        let mut needed = self.text_height(label, font, size) + 0.2 * layout.line_height(size) + body_height;
        if let BddBlock::Pending(steps) = *bdd {
            needed += self.bdd_height(steps);
        }
        // Half a point of slack absorbs float drift between this sum and the drawing.
        if self.cursor.y > self.page_top() && self.cursor.overflows(needed + 0.5, layout.bottom_limit()) {
            self.new_page();
        }

        self.write_text(BlockKind::Label, label, font, size, color, align);
        self.move_down(0.2, size);

        if let BddBlock::Pending(steps) = *bdd {
            self.bdd_block(steps);
            *bdd = BddBlock::Done;
        }

        match image {
            Ok(image) => self.image_block(image),
            Err(e) => {
                warn!(screenshot = %path.display(), error = %e, "could not load screenshot");
                self.summary.image_errors += 1;
                self.write_text(BlockKind::ImageError, IMAGE_ERROR_MARKER, Font::Regular, BODY_SIZE, layout.failed_color, Align::Left);
            }
        }
        self.move_down(1.0, BODY_SIZE);
    }

    fn bdd_block(&mut self, steps: &[String]) {
        let layout = self.layout;
        for line in steps {
            self.write_text(BlockKind::Bdd, line, Font::Regular, SMALL_SIZE, layout.bdd_color, Align::Left);
        }
        self.move_down(0.5, SMALL_SIZE);
        self.summary.bdd_blocks += 1;
    }

    fn image_block(&mut self, image: RgbImage) {
        let layout = self.layout;
        let (w, h) = fit_within(
            image.width() as f32,
            image.height() as f32,
            layout.image_max_width,
            layout.image_max_height,
        );
        if self.cursor.overflows(h, layout.bottom_limit()) {
            self.new_page();
        }
        let x = layout.margin + ((layout.content_width() - w) / 2.0).max(0.0);
        let top = self.cursor.y;
        let handle = self.canvas.embed_image(image);
        self.canvas.draw_image(handle, x, top, w, h);
        self.cursor.advance(h);
        self.place(BlockKind::Image, top, top + h);
        self.summary.images += 1;
    }

    fn separator(&mut self) {
        let layout = self.layout;
        self.move_down(1.0, BODY_SIZE);
        if self.cursor.y > layout.bottom_limit() {
            self.new_page();
        }
        let y = self.cursor.y;
        self.canvas.hline(
            layout.margin,
            layout.page_width - layout.margin,
            y,
            layout.separator_color,
            1.0,
        );
        self.place(BlockKind::Separator, y, y);
        self.move_down(1.0, BODY_SIZE);
    }

    fn finish(mut self) -> ReportResult<RenderedReport> {
        self.summary.pages = self.canvas.page_count();
        let bytes = self.canvas.finish()?;
        Ok(RenderedReport {
            bytes,
            summary: self.summary,
        })
    }
}

fn load_image(path: &Path) -> image::ImageResult<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

/// Lay out the report for `results` in memory.
///
/// Per-record problems (missing or undecodable screenshots, no matching
/// scenario) only affect that record's block; only PDF serialization
/// failures are returned as errors.
pub fn render_report(
    results: &[TestResult],
    lookup: &dyn ScenarioLookup,
    options: &ReportOptions,
) -> ReportResult<RenderedReport> {
    let mut writer = ReportWriter::new(&options.layout);
    writer.canvas.set_title(format!("{} - {}", options.company_name, options.subtitle));
    writer.header(options);
    for test in results {
        writer.test_section(test, lookup);
    }
    let report = writer.finish()?;
    debug!(
        pages = report.summary.pages,
        tests = report.summary.tests,
        images = report.summary.images,
        "report laid out"
    );
    Ok(report)
}

impl RenderedReport {
    /// Write the document to `path`, creating parent directories
    pub fn write_to(&self, path: &Path) -> ReportResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Write report bytes and wait until they are flushed and synced to disk
pub async fn write_report(bytes: &[u8], path: &Path) -> ReportResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Render and write a report, returning once the file is fully written
pub async fn render_to_file(
    results: &[TestResult],
    lookup: &dyn ScenarioLookup,
    options: &ReportOptions,
    path: &Path,
) -> ReportResult<WrittenReport> {
    let report = render_report(results, lookup, options)?;
    write_report(&report.bytes, path).await?;
    info!(path = %path.display(), pages = report.summary.pages, "evidence report written");
    Ok(WrittenReport {
        path: path.to_path_buf(),
        summary: report.summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{StepStatus, TestStatus};
    use crate::gherkin::{FeatureIndex, NoScenarios};
    use tempfile::TempDir;

    fn options() -> ReportOptions {
        ReportOptions::new()
            .company_name("ACME")
            .host(None)
            .logo(None)
    }

    fn png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, image::Rgb([200, 30, 30]))
            .save(&path)
            .unwrap();
        path
    }

    fn test_with(title: &str, status: TestStatus, shots: &[PathBuf]) -> TestResult {
        TestResult {
            title: title.to_string(),
            status,
            steps: shots.iter().map(|p| StepRecord::screenshot(p.clone())).collect(),
        }
    }

    #[test]
    fn zero_tests_render_header_only() {
        let report = render_report(&[], &NoScenarios, &options()).unwrap();
        assert_eq!(report.summary.pages, 1);
        assert_eq!(report.summary.tests, 0);
        assert_eq!(report.summary.blocks(BlockKind::Header).count(), 1);
        assert!(report.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn missing_screenshot_is_omitted() {
        let test = test_with("CT01", TestStatus::Passed, &[PathBuf::from("/no/such/shot.png")]);
        let report = render_report(&[test], &NoScenarios, &options()).unwrap();
        assert_eq!(report.summary.tests, 1);
        assert_eq!(report.summary.images, 0);
        assert_eq!(report.summary.missing_images, 1);
    }

    #[test]
    fn undecodable_screenshot_gets_error_marker() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("broken.png");
        std::fs::write(&bad, b"not a png").unwrap();
        let test = test_with("CT02", TestStatus::Failed, &[bad]);
        let report = render_report(&[test], &NoScenarios, &options()).unwrap();
        assert_eq!(report.summary.image_errors, 1);
        assert_eq!(report.summary.blocks(BlockKind::ImageError).count(), 1);
    }

    #[test]
    fn bdd_block_is_printed_once_per_test() {
        let dir = TempDir::new().unwrap();
        let shots = vec![png(dir.path(), "a.png", 40, 20), png(dir.path(), "b.png", 40, 20)];
        let mut index = FeatureIndex::new();
        index.parse_str("Scenario: CT03 login\n  Given a\n  When b\n", None);

        let report = render_report(&[test_with("CT03 login", TestStatus::Passed, &shots)], &index, &options()).unwrap();
        assert_eq!(report.summary.bdd_blocks, 1);
        assert_eq!(report.summary.blocks(BlockKind::Bdd).count(), 2);
        assert_eq!(report.summary.images, 2);
    }

    #[test]
    fn bdd_block_printed_without_screenshots() {
        let mut index = FeatureIndex::new();
        index.parse_str("Scenario: CT04\n  Given a\n", None);
        let test = TestResult {
            title: "CT04".to_string(),
            status: TestStatus::Passed,
            steps: vec![StepRecord::new("CT04", StepStatus::Passed, None)],
        };
        let report = render_report(&[test], &index, &options()).unwrap();
        assert_eq!(report.summary.bdd_blocks, 1);
    }

    #[test]
    fn image_stays_on_the_page_of_its_label() {
        let dir = TempDir::new().unwrap();
        let full = png(dir.path(), "full.png", 450, 250);

        for height in (5..=250).step_by(15) {
            let shot = png(dir.path(), &format!("h{}.png", height), 450, height);
            for bdd_steps in 0..=5 {
                let mut feature = String::from("Scenario: CT1\n");
                for i in 0..bdd_steps {
                    feature.push_str(&format!("  Given step {}\n", i));
                }
                let mut index = FeatureIndex::new();
                index.parse_str(&feature, None);

                let tests = vec![
                    test_with("CT0", TestStatus::Passed, &[shot.clone(), shot.clone()]),
                    test_with("CT1", TestStatus::Passed, &[full.clone()]),
                ];
                let report = render_report(&tests, &index, &options()).unwrap();

                let mut label_page = None;
                for block in &report.summary.placements {
                    match block.kind {
                        BlockKind::Label => label_page = Some(block.page),
                        BlockKind::Image => assert_eq!(
                            label_page,
                            Some(block.page),
                            "height={} bdd_steps={}: {:?}",
                            height,
                            bdd_steps,
                            block
                        ),
                        _ => {}
                    }
                }
            }
        }
    }

    #[test]
    fn images_never_cross_the_bottom_margin() {
        let dir = TempDir::new().unwrap();
        let shot = png(dir.path(), "tall.png", 450, 250);
        let tests: Vec<TestResult> = (0..6)
            .map(|i| test_with(&format!("CT{}", i), TestStatus::Passed, &[shot.clone(), shot.clone()]))
            .collect();

        let opts = options();
        let report = render_report(&tests, &NoScenarios, &opts).unwrap();
        assert!(report.summary.pages > 1);
        assert_eq!(report.summary.images, 12);
        for image in report.summary.blocks(BlockKind::Image) {
            assert!(image.bottom <= opts.layout.bottom_limit(), "{:?}", image);
        }
    }
}
