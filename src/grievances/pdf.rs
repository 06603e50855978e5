use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_X: f32 = 14.0;
const TOP: f32 = 277.0;
const BOTTOM: f32 = 18.0;
const VALUE_X: f32 = 64.0;
const LINE_H: f32 = 5.0;
const FONT_SIZE: f32 = 10.0;
const FIELD_COLS: usize = 26;
const VALUE_COLS: usize = 72;

/// Greedy word wrap at `width` characters. Explicit newlines are kept and
/// words longer than a line are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for para in text.lines() {
        let mut line = String::new();
        for word in para.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                }
                out.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = if line.is_empty() { 0 } else { line.chars().count() + 1 };
            if needed + word.chars().count() > width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        out.push(line);
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

struct Cursor {
    doc: printpdf::PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl Cursor {
    fn next_line(&mut self) {
        self.y -= LINE_H;
        if self.y < BOTTOM {
            let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
    }
}

/// Renders a titled two-column (field, value) table as an A4 PDF.
pub fn render_table(title: &str, rows: &[(&str, String)]) -> anyhow::Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let regular = add_font(&doc, BuiltinFont::Helvetica)?;
    let bold = add_font(&doc, BuiltinFont::HelveticaBold)?;
    let layer = doc.get_page(page).get_layer(layer);

    layer.use_text(title, 16.0, Mm(MARGIN_X), Mm(TOP), &bold);
    let mut cur = Cursor {
        doc,
        layer,
        y: TOP - 5.0,
    };

    cur.next_line();
    cur.layer.use_text("Field", FONT_SIZE, Mm(MARGIN_X), Mm(cur.y), &bold);
    cur.layer.use_text("Value", FONT_SIZE, Mm(VALUE_X), Mm(cur.y), &bold);

    for (field, value) in rows {
        cur.next_line();
        let field_lines = wrap(field, FIELD_COLS);
        let value_lines = wrap(value, VALUE_COLS);
        let n = field_lines.len().max(value_lines.len());
        for i in 0..n {
            if i > 0 {
                cur.next_line();
            }
            if let Some(f) = field_lines.get(i) {
                cur.layer.use_text(f.as_str(), FONT_SIZE, Mm(MARGIN_X), Mm(cur.y), &bold);
            }
            if let Some(v) = value_lines.get(i) {
                cur.layer.use_text(v.as_str(), FONT_SIZE, Mm(VALUE_X), Mm(cur.y), &regular);
            }
        }
    }

    cur.doc
        .save_to_bytes()
        .map_err(|e| anyhow::anyhow!("pdf save failed: {e:?}"))
}

fn add_font(doc: &printpdf::PdfDocumentReference, font: BuiltinFont) -> anyhow::Result<IndirectFontRef> {
    doc.add_builtin_font(font)
        .map_err(|e| anyhow::anyhow!("pdf font failed: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_and_newlines() {
        let lines = wrap("one two three four\nfive", 9);
        assert_eq!(lines, vec!["one two", "three", "four", "five"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 9));
    }

    #[test]
    fn wrap_splits_long_words() {
        let lines = wrap("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_empty_text_is_one_blank_line() {
        assert_eq!(wrap("", 10), vec![String::new()]);
    }

    #[test]
    fn renders_pdf_bytes_across_pages() {
        let long = "word ".repeat(4000);
        let rows = vec![("Grievance Code", "G-1".to_string()), ("AI Proposed Solution", long)];
        let bytes = render_table("Grievance Report", &rows).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
