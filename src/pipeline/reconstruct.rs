//! Document reconstruction: recognition output → a one-page PDF whose text
//! layer sits where the recognizer saw it.
//!
//! Each recognized item becomes one text object, solid black, at the
//! transformed top-left corner of its box and at the estimated font size.
//! Runs keep recognition order and overlapping boxes are drawn as-is. The
//! page is sized to the source raster in points, one pixel per point.
//!
//! Text that WinAnsi can carry is set in Helvetica. Any other run (Cyrillic,
//! Greek, Arabic, CJK, ...) is written as UTF-16 code units through a Type0
//! font with `Identity-H` encoding and an identity `ToUnicode` CMap, so the
//! native extractor reads back exactly what the recognizer returned. The
//! Type0 font is not embedded; its glyphs are only as good as the viewer's
//! substitute, but its text layer is exact.

use crate::pipeline::geometry::{coordinate_transform, font_size, FontMetrics};
use crate::pipeline::ocr::RecognitionResult;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Helvetica with WinAnsi encoding.
const LATIN_FONT: &str = "F1";
/// Type0 / Identity-H font for runs outside WinAnsi.
const UNICODE_FONT: &str = "F2";

/// WinAnsi code points for bytes 0x80..=0x9F; `None` marks unassigned bytes.
#[rustfmt::skip]
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

/// One positioned run of text on a reconstructed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Baseline origin in page coordinates (bottom-left origin).
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub text: String,
}

/// A page rebuilt from recognition output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedPage {
    pub width: f32,
    pub height: f32,
    pub runs: Vec<TextRun>,
}

/// Build a [`ReconstructedPage`] of `width` × `height` from `result`.
///
/// Items whose text is empty after trimming are dropped; an empty result
/// yields a valid page with no runs.
pub fn reconstruct(
    result: &RecognitionResult,
    width: f32,
    height: f32,
    metrics: &FontMetrics,
) -> ReconstructedPage {
    let runs = result
        .items
        .iter()
        .filter(|item| !item.text.trim().is_empty())
        .map(|item| {
            let (x, y) = coordinate_transform(&item.bbox, height);
            TextRun {
                x,
                y,
                font_size: font_size(&item.bbox, metrics),
                text: item.text.clone(),
            }
        })
        .collect();

    ReconstructedPage {
        width,
        height,
        runs,
    }
}

impl ReconstructedPage {
    /// Lay the page out as a standalone single-page PDF.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let encoded: Vec<(&str, Object)> =
            self.runs.iter().map(|run| encode_run(&run.text)).collect();

        let mut fonts = dictionary! {};
        let latin_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(LATIN_FONT, latin_id);
        if encoded.iter().any(|(font, _)| *font == UNICODE_FONT) {
            let unicode_id = add_unicode_font(&mut doc);
            fonts.set(UNICODE_FONT, unicode_id);
        }

        let mut operations = Vec::with_capacity(self.runs.len() * 6);
        for (run, (font, text)) in self.runs.iter().zip(encoded) {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![font.into(), run.font_size.into()]));
            operations.push(Operation::new("rg", vec![0.into(), 0.into(), 0.into()]));
            operations.push(Operation::new("Td", vec![run.x.into(), run.y.into()]));
            operations.push(Operation::new("Tj", vec![text]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        // Encoding a content stream built from plain operators cannot fail.
        let content_bytes = content.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), self.width.into(), self.height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => fonts,
            },
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// Serialise the page as PDF bytes.
    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut doc = self.to_document();
        let mut buf = Vec::new();
        doc.save_to(&mut buf)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(buf)
    }

    /// Write the page as a PDF file at `path`.
    pub fn write_pdf(&self, path: &Path) -> Result<(), std::io::Error> {
        let bytes = self.to_pdf_bytes()?;
        std::fs::write(path, bytes)
    }
}

/// Pick the font for `text` and encode it as the `Tj` operand.
fn encode_run(text: &str) -> (&'static str, Object) {
    match encode_win_ansi(text) {
        Some(bytes) => (LATIN_FONT, Object::String(bytes, StringFormat::Literal)),
        None => {
            let units = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
            (UNICODE_FONT, Object::String(units, StringFormat::Hexadecimal))
        }
    }
}

/// WinAnsi bytes for `text`, or `None` if any character has no WinAnsi
/// code that reads back unchanged. U+00A0 and U+00AD are excluded: WinAnsi
/// readers decode 0xA0 as a space and 0xAD as a hyphen.
fn encode_win_ansi(text: &str) -> Option<Vec<u8>> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> Option<u8> {
    match c {
        '\u{20}'..='\u{7E}' | '\u{A1}'..='\u{AC}' | '\u{AE}'..='\u{FF}' => Some(c as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|&mapped| mapped == Some(c))
            .map(|i| 0x80 + i as u8),
    }
}

/// Add a Type0 font whose codes are UTF-16 code units, with the `ToUnicode`
/// CMap that maps every code to itself.
fn add_unicode_font(doc: &mut Document) -> ObjectId {
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "ArialUnicodeMS",
        "Flags" => 32,
        "FontBBox" => vec![0.into(), (-200).into(), 1000.into(), 900.into()],
        "ItalicAngle" => 0,
        "Ascent" => 900,
        "Descent" => -200,
        "CapHeight" => 700,
        "StemV" => 80,
    });
    let descendant_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "ArialUnicodeMS",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 500,
        "CIDToGIDMap" => "Identity",
    });
    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, identity_to_unicode_cmap()));
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "ArialUnicodeMS",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![descendant_id.into()],
        "ToUnicode" => to_unicode_id,
    })
}

/// A `ToUnicode` CMap mapping every two-byte code to the same UTF-16 unit.
/// Ranges only vary in their low byte and blocks hold at most 100 ranges.
fn identity_to_unicode_cmap() -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo <<\n/Registry (Adobe)\n/Ordering (UCS)\n/Supplement 0\n>> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let high_bytes: Vec<u32> = (0..=0xFF).collect();
    for block in high_bytes.chunks(100) {
        cmap.push_str(&format!("{} beginbfrange\n", block.len()));
        for hi in block {
            cmap.push_str(&format!("<{hi:02X}00> <{hi:02X}FF> <{hi:02X}00>\n"));
        }
        cmap.push_str("endbfrange\n");
    }
    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::document::PdfDocument;
    use crate::pipeline::geometry::BoundingBox;
    use crate::pipeline::ocr::RecognizedText;
    use crate::pipeline::text::extract_text;

    fn item(x: f32, y: f32, h: f32, text: &str) -> RecognizedText {
        RecognizedText {
            bbox: BoundingBox::from_rect(x, y, 100.0, h),
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn blank_items_are_dropped() {
        let result = RecognitionResult::new(vec![item(0.0, 0.0, 10.0, "   ")]);
        let page = reconstruct(&result, 100.0, 100.0, &FontMetrics::default());
        assert!(page.runs.is_empty());
    }

    #[test]
    fn empty_result_gives_empty_page() {
        let page = reconstruct(
            &RecognitionResult::default(),
            640.0,
            480.0,
            &FontMetrics::default(),
        );
        assert_eq!((page.width, page.height), (640.0, 480.0));
        assert!(page.runs.is_empty());
    }

    #[test]
    fn runs_keep_recognition_order_and_position() {
        let result = RecognitionResult::new(vec![
            item(10.0, 20.0, 30.0, "second line below"),
            item(10.0, 5.0, 6.0, "first"),
        ]);
        let page = reconstruct(&result, 200.0, 300.0, &FontMetrics::default());
        assert_eq!(page.runs.len(), 2);
        assert_eq!(page.runs[0].text, "second line below");
        assert_eq!((page.runs[0].x, page.runs[0].y), (10.0, 280.0));
        assert_eq!(page.runs[0].font_size, 20.0);
        assert_eq!(page.runs[1].font_size, 8.0);
    }

    #[test]
    fn overlapping_boxes_are_not_merged() {
        let result = RecognitionResult::new(vec![
            item(10.0, 10.0, 12.0, "one"),
            item(10.0, 10.0, 12.0, "two"),
        ]);
        let page = reconstruct(&result, 100.0, 100.0, &FontMetrics::default());
        assert_eq!(page.runs.len(), 2);
    }

    #[test]
    fn written_pdf_reads_back() {
        let result = RecognitionResult::new(vec![
            item(40.0, 20.0, 30.0, "Bill of Lading"),
            item(40.0, 80.0, 20.0, "Page (1) of 2"),
        ]);
        let page = reconstruct(&result, 800.0, 600.0, &FontMetrics::default());
        let bytes = page.to_pdf_bytes().unwrap();

        let doc = PdfDocument::from_bytes(&bytes, "rebuilt.pdf").unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.pages()[0].width, 800.0);
        assert_eq!(doc.pages()[0].height, 600.0);
        assert!(doc.page_has_fonts(&doc.pages()[0]));
        assert_eq!(extract_text(&doc).unwrap(), "Bill of Lading Page (1) of 2");
    }

    #[test]
    fn empty_page_writes_a_valid_pdf() {
        let page = reconstruct(
            &RecognitionResult::default(),
            50.0,
            50.0,
            &FontMetrics::default(),
        );
        let bytes = page.to_pdf_bytes().unwrap();
        let doc = PdfDocument::from_bytes(&bytes, "blank.pdf").unwrap();
        assert_eq!(extract_text(&doc).unwrap(), "");
    }

    fn read_back(lines: &[&str]) -> String {
        let items = lines
            .iter()
            .enumerate()
            .map(|(i, text)| item(10.0, 40.0 * i as f32 + 10.0, 24.0, text))
            .collect();
        let page = reconstruct(
            &RecognitionResult::new(items),
            600.0,
            400.0,
            &FontMetrics::default(),
        );
        let bytes = page.to_pdf_bytes().unwrap();
        let doc = PdfDocument::from_bytes(&bytes, "rebuilt.pdf").unwrap();
        extract_text(&doc).unwrap()
    }

    #[test]
    fn win_ansi_covers_the_0x80_block() {
        assert_eq!(encode_win_ansi("Café"), Some(b"Caf\xe9".to_vec()));
        assert_eq!(
            encode_win_ansi("\u{201C}Total\u{201D} \u{2014} \u{20AC}5"),
            Some(b"\x93Total\x94 \x97 \x805".to_vec())
        );
        assert_eq!(
            encode_win_ansi("don\u{2019}t \u{2022} \u{2013}"),
            Some(b"don\x92t \x95 \x96".to_vec())
        );
        assert_eq!(encode_win_ansi("\u{041F}"), None);
        assert_eq!(encode_win_ansi("a\u{00A0}b"), None);
    }

    #[test]
    fn typographic_punctuation_reads_back_unchanged() {
        assert_eq!(
            read_back(&["don\u{2019}t", "\u{201C}Total\u{201D} \u{2014} \u{20AC}5"]),
            "don\u{2019}t \u{201C}Total\u{201D} \u{2014} \u{20AC}5"
        );
    }

    #[test]
    fn non_latin_text_reads_back_unchanged() {
        assert_eq!(read_back(&["Привет"]), "Привет");
        assert_eq!(read_back(&["سلام دنیا"]), "سلام دنیا");
        assert_eq!(read_back(&["日本語 テキスト"]), "日本語 テキスト");
    }

    fn has_type0_font(doc: &Document) -> bool {
        doc.objects.values().any(|o| {
            o.as_dict()
                .and_then(|d| d.get(b"Subtype"))
                .and_then(Object::as_name)
                .is_ok_and(|name| name == b"Type0")
        })
    }

    #[test]
    fn mixed_scripts_share_one_page() {
        assert_eq!(read_back(&["Invoice", "Счёт 42"]), "Invoice Счёт 42");

        let result = RecognitionResult::new(vec![
            item(0.0, 0.0, 12.0, "Invoice"),
            item(0.0, 20.0, 12.0, "Счёт"),
        ]);
        let page = reconstruct(&result, 100.0, 100.0, &FontMetrics::default());
        let fonts: Vec<&str> = page.runs.iter().map(|r| encode_run(&r.text).0).collect();
        assert_eq!(fonts, vec![LATIN_FONT, UNICODE_FONT]);
        assert!(has_type0_font(&page.to_document()));
    }

    #[test]
    fn latin_only_pages_carry_no_type0_font() {
        let result = RecognitionResult::new(vec![item(0.0, 0.0, 12.0, "plain")]);
        let page = reconstruct(&result, 100.0, 100.0, &FontMetrics::default());
        assert!(!has_type0_font(&page.to_document()));
    }
}
