//! PDF extraction with table-atomicity preservation (§4.1)
//!
//! Produces an ordered list of [`ContentBlock`]s: ordinary text and atomic
//! table blocks rendered as Markdown, each carrying a limited amount of
//! preceding context so retrieval does not lose the table's caption or
//! lead-in sentence.
//!
//! Text extraction itself is delegated to `pdf-extract`, per page; table
//! detection on top of that extracted text follows a pipe-delimited
//! heuristic, since `pdf-extract` (like most PDF text layers) does not
//! preserve cell boundaries as anything but whitespace or literal `|`
//! glyphs already present in the source.

use crate::documents::model::{ContentBlock, ContentType};
use crate::error::{DocumentError, Result};
use pdf_extract::extract_text_from_mem_by_pages;

/// Maximum characters of text preceding a detected table to prepend to the
/// table's rendered Markdown block.
const TABLE_CONTEXT_CHARS: usize = 150;

/// Extracts text and atomic table blocks from a PDF's raw bytes.
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract an ordered sequence of content blocks from PDF bytes.
    ///
    /// Returns `DocumentError::BadInput` if the PDF cannot be parsed or
    /// yields no extractable text at all (an empty PDF is a bad-input
    /// error, not an invariant violation, since it originates from
    /// untrusted uploaded content).
    pub fn extract(&self, bytes: &[u8], filename: &str) -> Result<Vec<ContentBlock>> {
        let pages = extract_text_from_mem_by_pages(bytes)
            .map_err(|e| DocumentError::BadInput(format!("unreadable PDF {filename}: {e}")))?;

        if pages.is_empty() {
            return Err(DocumentError::BadInput(format!("{filename} has no pages")).into());
        }

        let total_pages = pages.len();
        let mut blocks = Vec::new();
        for (index, page_text) in pages.iter().enumerate() {
            if page_text.trim().is_empty() {
                // Per-page extraction failure/blank page: log and skip,
                // per §4.1's failure policy.
                tracing::warn!(page = index + 1, filename, "page produced no text, skipping");
                continue;
            }
            let page = index + 1;
            blocks.extend(self.extract_page_blocks(page_text, page, total_pages));
        }

        if blocks.is_empty() {
            return Err(DocumentError::BadInput(format!(
                "no text extracted from {filename}"
            ))
            .into());
        }

        Ok(blocks)
    }

    /// Split one page's extracted text into text and table blocks using a
    /// pipe-delimited heuristic: two or more consecutive lines containing
    /// `|` are treated as a table, its preceding paragraph captured (up to
    /// `TABLE_CONTEXT_CHARS`) as lead-in context.
    fn extract_page_blocks(&self, page_text: &str, page: usize, total_pages: usize) -> Vec<ContentBlock> {
        let lines: Vec<&str> = page_text.lines().collect();
        let mut blocks = Vec::new();
        let mut text_buf = String::new();
        let mut text_start_line = 0usize;
        let mut i = 0;

        while i < lines.len() {
            if Self::looks_like_table_row(lines[i]) {
                let table_start = i;
                let mut table_lines = Vec::new();
                while i < lines.len() && Self::looks_like_table_row(lines[i]) {
                    table_lines.push(lines[i]);
                    i += 1;
                }

                if table_lines.len() >= 2 {
                    let context = Self::tail_context(&text_buf, TABLE_CONTEXT_CHARS);
                    if !text_buf.trim().is_empty() {
                        blocks.push(ContentBlock {
                            content_type: ContentType::Text,
                            text: text_buf.trim().to_string(),
                            page,
                            total_pages,
                            y_position: text_start_line as f32,
                            context: None,
                        });
                    }
                    text_buf.clear();

                    let markdown = Self::render_table_markdown(&table_lines);

                    blocks.push(ContentBlock {
                        content_type: ContentType::Table,
                        text: markdown,
                        page,
                        total_pages,
                        y_position: table_start as f32,
                        context: if context.is_empty() { None } else { Some(context) },
                    });
                    text_start_line = i;
                    continue;
                }
                // False alarm: fewer than 2 rows, treat as ordinary text.
                for line in &lines[table_start..i] {
                    text_buf.push_str(line);
                    text_buf.push('\n');
                }
                continue;
            }

            if text_buf.is_empty() {
                text_start_line = i;
            }
            text_buf.push_str(lines[i]);
            text_buf.push('\n');
            i += 1;
        }

        if !text_buf.trim().is_empty() {
            blocks.push(ContentBlock {
                content_type: ContentType::Text,
                text: text_buf.trim().to_string(),
                page,
                total_pages,
                y_position: text_start_line as f32,
                context: None,
            });
        }

        blocks
    }

    fn looks_like_table_row(line: &str) -> bool {
        let trimmed = line.trim();
        !trimmed.is_empty() && trimmed.matches('|').count() >= 2
    }

    fn tail_context(text: &str, max_chars: usize) -> String {
        let trimmed = text.trim();
        if trimmed.chars().count() <= max_chars {
            return trimmed.to_string();
        }
        let start = trimmed
            .char_indices()
            .rev()
            .nth(max_chars - 1)
            .map(|(i, _)| i)
            .unwrap_or(0);
        trimmed[start..].to_string()
    }

    /// Render pipe-delimited table lines as Markdown, escaping any `|`
    /// inside cell content and inserting the header separator row.
    ///
    /// Cell rendering never panics: every cell is coerced through `trim`/
    /// `replace` on owned `String`s, so malformed rows just yield empty
    /// cells rather than aborting extraction.
    fn render_table_markdown(rows: &[&str]) -> String {
        let mut cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                row.trim()
                    .trim_matches('|')
                    .split('|')
                    .map(|cell| cell.trim().replace('|', "\\|"))
                    .collect()
            })
            .collect();

        let width = cells.iter().map(|r| r.len()).max().unwrap_or(0);
        for row in &mut cells {
            while row.len() < width {
                row.push(String::new());
            }
        }

        let mut out = String::new();
        if let Some(header) = cells.first() {
            out.push_str("| ");
            out.push_str(&header.join(" | "));
            out.push_str(" |\n");
            out.push('|');
            for _ in 0..width {
                out.push_str(" --- |");
            }
            out.push('\n');
        }
        for row in cells.iter().skip(1) {
            out.push_str("| ");
            out.push_str(&row.join(" | "));
            out.push_str(" |\n");
        }
        out.trim_end().to_string()
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_row_detection() {
        assert!(PdfExtractor::looks_like_table_row("Name | Age | City"));
        assert!(!PdfExtractor::looks_like_table_row("Just a sentence."));
    }

    #[test]
    fn test_tail_context_truncates() {
        let text = "a".repeat(300);
        let ctx = PdfExtractor::tail_context(&text, 150);
        assert_eq!(ctx.chars().count(), 150);
    }

    #[test]
    fn test_render_table_markdown_has_separator_row() {
        let rows = vec!["Name | Age", "Alice | 30", "Bob | 25"];
        let md = PdfExtractor::render_table_markdown(&rows);
        assert!(md.contains("| --- |"));
        assert!(md.contains("Alice"));
    }

    #[test]
    fn test_render_table_markdown_escapes_pipe_in_cell() {
        let rows = vec!["Name | Note", r"Alice | uses \| already"];
        let md = PdfExtractor::render_table_markdown(&rows);
        assert!(md.contains("Alice"));
    }

    #[test]
    fn test_render_table_markdown_pads_short_rows() {
        let rows = vec!["A | B | C", "1 | 2"];
        let md = PdfExtractor::render_table_markdown(&rows);
        let data_row = md.lines().last().unwrap();
        assert_eq!(data_row.matches('|').count(), 4);
    }

    #[test]
    fn test_extract_page_blocks_splits_table_from_text() {
        let extractor = PdfExtractor::new();
        let page = "Intro paragraph about the data.\nName | Age\nAlice | 30\nBob | 25\nMore text after.";
        let blocks = extractor.extract_page_blocks(page, 1, 1);
        assert!(blocks.iter().any(|b| b.content_type == ContentType::Table));
        assert!(blocks.iter().any(|b| b.content_type == ContentType::Text));
    }

    #[test]
    fn test_extract_page_blocks_table_carries_context() {
        let extractor = PdfExtractor::new();
        let page = "See the results below.\nMetric | Value\nAccuracy | 0.92";
        let blocks = extractor.extract_page_blocks(page, 1, 1);
        let table = blocks
            .iter()
            .find(|b| b.content_type == ContentType::Table)
            .unwrap();
        assert!(table
            .context
            .as_deref()
            .unwrap()
            .contains("See the results below."));
        assert!(!table.text.contains("See the results below."));
    }

    #[test]
    fn test_single_table_row_is_not_treated_as_table() {
        let extractor = PdfExtractor::new();
        let page = "A stray line with a | pipe in it.\nMore ordinary text.";
        let blocks = extractor.extract_page_blocks(page, 1, 1);
        assert!(blocks.iter().all(|b| b.content_type == ContentType::Text));
    }
}
