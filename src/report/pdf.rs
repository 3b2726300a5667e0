//! Minimal PDF canvas on top of `lopdf`.
//!
//! Supports what the evidence report draws: filled rectangles, horizontal
//! rules, single-line text in the standard Helvetica faces and RGB images.
//! Callers position everything from the top of the page.

use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use super::layout::Rgb;
use super::metrics::Font;
use super::types::ReportResult;

/// An image stored once in the document and drawable on any page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHandle {
    id: ObjectId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
struct PageContent {
    ops: Vec<Operation>,
    xobjects: Vec<(String, ObjectId)>,
}

pub struct PdfCanvas {
    doc: Document,
    pages_id: ObjectId,
    regular_font: ObjectId,
    bold_font: ObjectId,
    width: f32,
    height: f32,
    pages: Vec<PageContent>,
    title: Option<String>,
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn color_operands(color: Rgb) -> Vec<Object> {
    color.iter().map(|&c| real(c as f32 / 255.0)).collect()
}

/// Encode text for a WinAnsi-encoded standard font; unmappable chars become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => ch as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

impl PdfCanvas {
    /// Create an empty document with pages of the given size (points)
    pub fn new(width: f32, height: f32) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_font = doc.add_object(font_dictionary(Font::Regular));
        let bold_font = doc.add_object(font_dictionary(Font::Bold));
        Self {
            doc,
            pages_id,
            regular_font,
            bold_font,
            width,
            height,
            pages: Vec::new(),
            title: None,
        }
    }

    /// Document title stored in the info dictionary
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Start a new page; later drawing goes there
    pub fn add_page(&mut self) {
        self.pages.push(PageContent::default());
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn current(&mut self) -> &mut PageContent {
        if self.pages.is_empty() {
            self.add_page();
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn pdf_y(&self, top: f32) -> f32 {
        self.height - top
    }

    /// Filled rectangle with its top-left corner at `(x, top)`
    pub fn fill_rect(&mut self, x: f32, top: f32, w: f32, h: f32, color: Rgb) {
        let y = self.pdf_y(top + h);
        let page = self.current();
        page.ops.push(Operation::new("rg", color_operands(color)));
        page.ops.push(Operation::new("re", vec![real(x), real(y), real(w), real(h)]));
        page.ops.push(Operation::new("f", vec![]));
    }

    /// Horizontal rule from `x1` to `x2` at `top`
    pub fn hline(&mut self, x1: f32, x2: f32, top: f32, color: Rgb, line_width: f32) {
        let y = self.pdf_y(top);
        let page = self.current();
        page.ops.push(Operation::new("RG", color_operands(color)));
        page.ops.push(Operation::new("w", vec![real(line_width)]));
        page.ops.push(Operation::new("m", vec![real(x1), real(y)]));
        page.ops.push(Operation::new("l", vec![real(x2), real(y)]));
        page.ops.push(Operation::new("S", vec![]));
    }

    /// One line of text whose box starts at `(x, top)`
    pub fn text(&mut self, x: f32, top: f32, font: Font, size: f32, color: Rgb, text: &str) {
        // Baseline sits at the font ascent below the top of the line box.
        let baseline = self.pdf_y(top + size * 0.718);
        let page = self.current();
        page.ops.push(Operation::new("BT", vec![]));
        page.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource_name().as_bytes().to_vec()), real(size)],
        ));
        page.ops.push(Operation::new("rg", color_operands(color)));
        page.ops.push(Operation::new("Td", vec![real(x), real(baseline)]));
        page.ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_win_ansi(text))],
        ));
        page.ops.push(Operation::new("ET", vec![]));
    }

    /// Store an image in the document
    pub fn embed_image(&mut self, image: RgbImage) -> ImageHandle {
        let (width, height) = image.dimensions();
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width as i64),
            "Height" => Object::Integer(height as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
        };
        let id = self.doc.add_object(Stream::new(dict, image.into_raw()));
        ImageHandle { id, width, height }
    }

    /// Draw an embedded image scaled to `w` x `h` with its top-left at `(x, top)`
    pub fn draw_image(&mut self, handle: ImageHandle, x: f32, top: f32, w: f32, h: f32) {
        let y = self.pdf_y(top + h);
        let page = self.current();
        let name = match page.xobjects.iter().find(|(_, id)| *id == handle.id) {
            Some((name, _)) => name.clone(),
            None => {
                let name = format!("Im{}", page.xobjects.len() + 1);
                page.xobjects.push((name.clone(), handle.id));
                name
            }
        };
        page.ops.push(Operation::new("q", vec![]));
        page.ops.push(Operation::new(
            "cm",
            vec![real(w), real(0.0), real(0.0), real(h), real(x), real(y)],
        ));
        page.ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        page.ops.push(Operation::new("Q", vec![]));
    }

    /// Assemble the page tree and serialize the document
    pub fn finish(mut self) -> ReportResult<Vec<u8>> {
        if self.pages.is_empty() {
            self.add_page();
        }

        let fonts = dictionary! {
            Font::Regular.resource_name() => self.regular_font,
            Font::Bold.resource_name() => self.bold_font,
        };

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for page in std::mem::take(&mut self.pages) {
            let content = Content { operations: page.ops };
            let content_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), content.encode()?));

            let mut xobjects = Dictionary::new();
            for (name, id) in page.xobjects {
                xobjects.set(name, Object::Reference(id));
            }

            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => self.pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => fonts.clone(),
                    "XObject" => xobjects,
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
            "MediaBox" => vec![real(0.0), real(0.0), real(self.width), real(self.height)],
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Producer" => Object::string_literal("bdd-evidence"),
        };
        if let Some(title) = &self.title {
            info.set("Title", Object::string_literal(encode_win_ansi(title)));
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);

        self.doc.compress();
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

fn font_dictionary(font: Font) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_ansi_keeps_latin1_and_maps_punctuation() {
        assert_eq!(encode_win_ansi("Então"), vec![b'E', b'n', b't', 0xE3, b'o']);
        assert_eq!(encode_win_ansi("a–b"), vec![b'a', 0x96, b'b']);
        assert_eq!(encode_win_ansi("✓"), vec![b'?']);
    }

    #[test]
    fn empty_canvas_still_produces_one_page() {
        let canvas = PdfCanvas::new(595.28, 841.89);
        let bytes = canvas.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn pages_and_images_are_written() {
        let mut canvas = PdfCanvas::new(595.28, 841.89);
        canvas.set_title("Evidence");
        canvas.add_page();
        canvas.fill_rect(0.0, 0.0, 595.28, 20.0, [0xE4, 0, 0x2B]);
        canvas.text(50.0, 50.0, Font::Bold, 14.0, [0, 0, 0], "Título");
        let handle = canvas.embed_image(RgbImage::new(4, 2));
        canvas.draw_image(handle, 50.0, 80.0, 40.0, 20.0);
        canvas.add_page();
        canvas.hline(50.0, 545.28, 100.0, [0xCC, 0xCC, 0xCC], 1.0);
        canvas.draw_image(handle, 50.0, 120.0, 40.0, 20.0);
        assert_eq!(canvas.page_count(), 2);

        let bytes = canvas.finish().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
