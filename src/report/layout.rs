//! Page geometry, colours and the vertical cursor used while laying out a report.
//!
//! All positions are in PDF points measured from the top-left corner of the
//! page; the canvas converts them to PDF's bottom-up space when drawing.

use serde::{Deserialize, Serialize};

/// RGB colour
pub type Rgb = [u8; 3];

/// Parse `#rrggbb` (leading `#` optional)
pub fn parse_hex_color(hex: &str) -> Option<Rgb> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

/// Layout parameters of the evidence report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Page width in points (A4: 595.28)
    pub page_width: f32,
    /// Page height in points (A4: 841.89)
    pub page_height: f32,
    /// Left, right and bottom margin; also the top of continuation pages
    pub margin: f32,
    /// Cursor position at which the first test section starts on page one
    pub content_top: f32,
    /// A test section starting below this line moves to the next page
    pub text_break_y: f32,
    /// An image block starting below this line moves to the next page.
    /// Must be above `text_break_y`: images need far more room than text.
    pub image_break_y: f32,
    /// Screenshots are scaled down to fit this box, keeping aspect ratio
    pub image_max_width: f32,
    pub image_max_height: f32,
    /// Logo fit box, drawn at the top right of the first page
    pub logo_max_width: f32,
    pub logo_max_height: f32,
    /// Height of the coloured band at the top of every page
    pub header_band_height: f32,
    /// Line height as a multiple of the font size
    pub line_height_factor: f32,
    pub band_color: Rgb,
    pub passed_color: Rgb,
    pub failed_color: Rgb,
    pub text_color: Rgb,
    pub muted_color: Rgb,
    pub bdd_color: Rgb,
    pub separator_color: Rgb,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            margin: 50.0,
            content_top: 130.0,
            text_break_y: 700.0,
            image_break_y: 600.0,
            image_max_width: 450.0,
            image_max_height: 250.0,
            logo_max_width: 100.0,
            logo_max_height: 50.0,
            header_band_height: 20.0,
            line_height_factor: 1.156,
            band_color: [0xE4, 0x00, 0x2B],
            passed_color: [0x28, 0xA7, 0x45],
            failed_color: [0xE4, 0x00, 0x2B],
            text_color: [0, 0, 0],
            muted_color: [0x55, 0x55, 0x55],
            bdd_color: [0x33, 0x33, 0x33],
            separator_color: [0xCC, 0xCC, 0xCC],
        }
    }
}

impl LayoutConfig {
    /// Width available between the side margins
    pub fn content_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    /// Lowest position any block may reach
    pub fn bottom_limit(&self) -> f32 {
        self.page_height - self.margin
    }

    pub fn line_height(&self, font_size: f32) -> f32 {
        font_size * self.line_height_factor
    }
}

/// Scale `(width, height)` down to fit inside the box; never scales up
pub fn fit_within(width: f32, height: f32, max_width: f32, max_height: f32) -> (f32, f32) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (max_width / width).min(max_height / height).min(1.0);
    (width * scale, height * scale)
}

/// Current page and vertical position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    /// Zero-based page number
    pub page: usize,
    pub y: f32,
}

impl Cursor {
    pub fn new(y: f32) -> Self {
        Self { page: 0, y }
    }

    pub fn advance(&mut self, dy: f32) {
        self.y += dy;
    }

    /// Move to the top of the next page
    pub fn next_page(&mut self, top: f32) {
        self.page += 1;
        self.y = top;
    }

    /// Whether a block of `height` starting here would cross `limit`
    pub fn overflows(&self, height: f32, limit: f32) -> bool {
        self.y + height > limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#E4002B"), Some([0xE4, 0x00, 0x2B]));
        assert_eq!(parse_hex_color("28a745"), Some([0x28, 0xA7, 0x45]));
        assert_eq!(parse_hex_color("fff"), None);
        assert_eq!(parse_hex_color("zzzzzz"), None);
    }

    #[test]
    fn test_fit_within_keeps_aspect_ratio() {
        assert_eq!(fit_within(900.0, 500.0, 450.0, 250.0), (450.0, 250.0));
        let (w, h) = fit_within(1000.0, 1000.0, 450.0, 250.0);
        assert_eq!((w, h), (250.0, 250.0));
        assert_eq!(fit_within(100.0, 50.0, 450.0, 250.0), (100.0, 50.0));
        assert_eq!(fit_within(0.0, 50.0, 450.0, 250.0), (0.0, 0.0));
    }

    #[test]
    fn test_default_thresholds_are_ordered() {
        let layout = LayoutConfig::default();
        assert!(layout.image_break_y < layout.text_break_y);
        assert!(layout.text_break_y < layout.bottom_limit());
        assert!(layout.image_break_y + layout.image_max_height > layout.text_break_y);
    }

    #[test]
    fn test_cursor_overflow_and_paging() {
        let mut cursor = Cursor::new(700.0);
        assert!(cursor.overflows(100.0, 791.89));
        cursor.next_page(70.0);
        assert_eq!(cursor.page, 1);
        assert!(!cursor.overflows(100.0, 791.89));
        cursor.advance(10.0);
        assert_eq!(cursor.y, 80.0);
    }
}
