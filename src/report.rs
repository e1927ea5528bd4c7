//! PDF report rendering.
//!
//! The report is a two-section paginated document: the transcript, then the
//! evaluation, under a centered title. Text is set in the built-in Helvetica
//! face (WinAnsi encoding); characters the face cannot encode are replaced
//! with `?` rather than failing the run.

use anyhow::{Result, anyhow};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocumentReference, PdfLayerReference};

/// MIME type of the rendered report.
pub const REPORT_MIME: &str = "application/pdf";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;

const TITLE_PT: f32 = 18.0;
const HEADING_PT: f32 = 12.0;
const BODY_PT: f32 = 11.0;

const TITLE: &str = "Call Quality Report";
const TRANSCRIPT_HEADING: &str = "Transcription:";
const EVALUATION_HEADING: &str = "AI Analysis:";

// Point-to-millimeter conversion and the average glyph advance of Helvetica,
// used for wrapping and centering. Helvetica metrics average out close to
// half the em size for prose.
const PT_TO_MM: f32 = 0.352_778;
const AVG_GLYPH_EM: f32 = 0.5;

/// Render the transcript and evaluation into PDF bytes.
pub fn render(transcript: &str, evaluation: &str) -> Result<Vec<u8>> {
    let (doc, page, layer) =
        printpdf::PdfDocument::new(TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "page 1");

    let body_font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("failed to embed body font: {e}"))?;
    let bold_font = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow!("failed to embed heading font: {e}"))?;

    let mut composer = Composer {
        doc: &doc,
        layer: doc.get_page(page).get_layer(layer),
        cursor_mm: PAGE_HEIGHT_MM - MARGIN_MM,
        page_count: 1,
    };

    composer.centered_line(TITLE, TITLE_PT, &bold_font);
    composer.blank_line(BODY_PT);

    composer.section(TRANSCRIPT_HEADING, transcript, &bold_font, &body_font);
    composer.blank_line(BODY_PT);
    composer.section(EVALUATION_HEADING, evaluation, &bold_font, &body_font);

    doc.save_to_bytes()
        .map_err(|e| anyhow!("failed to serialize report PDF: {e}"))
}

/// Tracks the write cursor across pages.
struct Composer<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    cursor_mm: f32,
    page_count: usize,
}

impl Composer<'_> {
    fn section(&mut self, heading: &str, text: &str, bold: &IndirectFontRef, body: &IndirectFontRef) {
        self.line(heading, HEADING_PT, bold);
        self.blank_line(BODY_PT);

        let max_chars = max_chars_per_line(BODY_PT);
        for raw_line in sanitize_for_winansi(text).lines() {
            if raw_line.trim().is_empty() {
                self.blank_line(BODY_PT);
                continue;
            }
            for wrapped in wrap_line(raw_line, max_chars) {
                self.line(&wrapped, BODY_PT, body);
            }
        }
    }

    fn line(&mut self, text: &str, size_pt: f32, font: &IndirectFontRef) {
        self.advance(size_pt);
        self.layer
            .use_text(text, size_pt, Mm(MARGIN_MM), Mm(self.cursor_mm), font);
    }

    fn centered_line(&mut self, text: &str, size_pt: f32, font: &IndirectFontRef) {
        self.advance(size_pt);
        let width_mm = text.chars().count() as f32 * size_pt * AVG_GLYPH_EM * PT_TO_MM;
        let x = ((PAGE_WIDTH_MM - width_mm) / 2.0).max(MARGIN_MM);
        self.layer
            .use_text(text, size_pt, Mm(x), Mm(self.cursor_mm), font);
    }

    fn blank_line(&mut self, size_pt: f32) {
        self.advance(size_pt);
    }

    /// Move the cursor down one line, starting a new page when the bottom
    /// margin is reached.
    fn advance(&mut self, size_pt: f32) {
        let line_height = size_pt * PT_TO_MM * 1.4;
        self.cursor_mm -= line_height;

        if self.cursor_mm < MARGIN_MM {
            self.page_count += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("page {}", self.page_count),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM - line_height;
        }
    }
}

/// Replace characters the built-in Helvetica face cannot encode with `?`.
///
/// Kept: printable ASCII, the Latin-1 supplement, and newlines. Tabs become
/// spaces; carriage returns are dropped. Lossy, never fatal.
pub fn sanitize_for_winansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push('\n'),
            '\r' => {}
            '\t' => out.push_str("    "),
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// How many average-width glyphs fit on one body line.
fn max_chars_per_line(size_pt: f32) -> usize {
    let usable_mm = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    let glyph_mm = size_pt * AVG_GLYPH_EM * PT_TO_MM;
    (usable_mm / glyph_mm).floor() as usize
}

/// Greedy word wrap. Words longer than a full line are hard-split.
fn wrap_line(line: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        if word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(max_chars) {
                lines.push(chunk.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
