//! DOCX Converter
//!
//! `word/document.xml`を読み取り、段落を`<p>`、表を`<table>`として出力する。
//!
//! 結合情報は次のように変換されます。
//!
//! - `w:gridSpan` → `colspan`
//! - `w:vMerge w:val="restart"`から始まり、同じグリッド列の`w:vMerge`（継続）が続く範囲 → `rowspan`
//!   （継続側のセルは出力しません）
//!
//! 表の中の表は構造を持たず、外側のセルのテキストとして扱います。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::api::SupportedFormat;
use crate::convert::{write_html_table, ConvertedDocument, DocumentConverter, HtmlCell};
use crate::error::{ImportError, Result};
use crate::security::SecurityConfig;

const DOCUMENT_PART: &str = "word/document.xml";

/// Word文書（.docx）用コンバーター
#[derive(Debug, Clone, Default)]
pub struct DocxConverter {
    security: SecurityConfig,
}

impl DocxConverter {
    pub fn new(security: SecurityConfig) -> Self {
        Self { security }
    }

    /// ZIPコンテナから本文のXMLを読み出す
    fn read_document_xml(&self, bytes: &[u8]) -> Result<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        self.security.check_archive(&mut archive)?;

        let entry = archive.by_name(DOCUMENT_PART).map_err(|_| {
            ImportError::Conversion(format!("'{}' not found in DOCX container", DOCUMENT_PART))
        })?;

        let mut xml = String::new();
        entry
            .take(self.security.max_file_size)
            .read_to_string(&mut xml)
            .map_err(|e| ImportError::Conversion(format!("Failed to read {}: {}", DOCUMENT_PART, e)))?;
        Ok(xml)
    }
}

impl DocumentConverter for DocxConverter {
    fn format(&self) -> SupportedFormat {
        SupportedFormat::Docx
    }

    fn security(&self) -> &SecurityConfig {
        &self.security
    }

    fn convert_bytes(&self, bytes: &[u8]) -> Result<ConvertedDocument> {
        let xml = self.read_document_xml(bytes)?;
        let blocks = parse_document(&xml)?;
        tracing::debug!(blocks = blocks.len(), "parsed DOCX body");
        Ok(ConvertedDocument {
            markup: render_blocks(&blocks),
        })
    }
}

/// 縦結合の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerticalMerge {
    None,
    Restart,
    Continue,
}

#[derive(Debug, Clone)]
struct DocxCell {
    text: String,
    grid_span: usize,
    v_merge: VerticalMerge,
}

impl DocxCell {
    fn new() -> Self {
        Self {
            text: String::new(),
            grid_span: 1,
            v_merge: VerticalMerge::None,
        }
    }
}

#[derive(Debug, Clone)]
enum Block {
    Paragraph(String),
    Table(Vec<Vec<DocxCell>>),
}

/// 本文XMLを段落と表のブロック列に分解する
fn parse_document(xml: &str) -> Result<Vec<Block>> {
    let mut reader = Reader::from_str(xml);

    let mut blocks = Vec::new();
    let mut paragraph = String::new();
    let mut in_text = false;

    // 表の入れ子の深さ（1が最上位の表）
    let mut table_depth = 0usize;
    let mut rows: Vec<Vec<DocxCell>> = Vec::new();
    let mut row: Vec<DocxCell> = Vec::new();
    let mut cell: Option<DocxCell> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        flush_paragraph(&mut blocks, &mut paragraph);
                        rows.clear();
                    }
                }
                b"tr" if table_depth == 1 => row.clear(),
                b"tc" if table_depth == 1 => cell = Some(DocxCell::new()),
                b"p" => {
                    if let Some(cell) = cell.as_mut() {
                        if !cell.text.is_empty() && !cell.text.ends_with('\n') {
                            cell.text.push('\n');
                        }
                    }
                }
                b"t" => in_text = true,
                b"vMerge" if table_depth == 1 => apply_v_merge(&reader, &e, cell.as_mut()),
                b"gridSpan" if table_depth == 1 => apply_grid_span(&reader, &e, cell.as_mut()),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"vMerge" if table_depth == 1 => apply_v_merge(&reader, &e, cell.as_mut()),
                b"gridSpan" if table_depth == 1 => apply_grid_span(&reader, &e, cell.as_mut()),
                b"br" | b"cr" => append(&mut paragraph, cell.as_mut(), "\n"),
                b"tab" => append(&mut paragraph, cell.as_mut(), " "),
                _ => {}
            },
            Event::Text(e) => {
                if in_text {
                    let text = e.unescape()?;
                    append(&mut paragraph, cell.as_mut(), &text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if table_depth == 0 {
                        flush_paragraph(&mut blocks, &mut paragraph);
                    } else if let Some(cell) = cell.as_mut() {
                        // 入れ子の表のセル内段落も改行で区切る
                        if table_depth > 1 && !cell.text.ends_with('\n') {
                            cell.text.push('\n');
                        }
                    }
                }
                b"tc" if table_depth == 1 => {
                    if let Some(mut finished) = cell.take() {
                        finished.text = finished.text.trim().to_string();
                        row.push(finished);
                    }
                }
                b"tr" if table_depth == 1 => rows.push(std::mem::take(&mut row)),
                b"tbl" => {
                    if table_depth == 1 {
                        blocks.push(Block::Table(std::mem::take(&mut rows)));
                    }
                    table_depth = table_depth.saturating_sub(1);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    flush_paragraph(&mut blocks, &mut paragraph);
    Ok(blocks)
}

fn append(paragraph: &mut String, cell: Option<&mut DocxCell>, text: &str) {
    match cell {
        Some(cell) => cell.text.push_str(text),
        None => paragraph.push_str(text),
    }
}

fn flush_paragraph(blocks: &mut Vec<Block>, paragraph: &mut String) {
    let text = paragraph.trim();
    if !text.is_empty() {
        blocks.push(Block::Paragraph(text.to_string()));
    }
    paragraph.clear();
}

/// `w:val`属性の値を取得する
fn val_attribute<B>(reader: &Reader<B>, e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"val")
        .and_then(|attr| {
            attr.decode_and_unescape_value(reader)
                .ok()
                .map(|v| v.into_owned())
        })
}

fn apply_v_merge<B>(reader: &Reader<B>, e: &BytesStart<'_>, cell: Option<&mut DocxCell>) {
    if let Some(cell) = cell {
        cell.v_merge = match val_attribute(reader, e).as_deref() {
            Some("restart") => VerticalMerge::Restart,
            // 値なし、または"continue"は継続
            _ => VerticalMerge::Continue,
        };
    }
}

fn apply_grid_span<B>(reader: &Reader<B>, e: &BytesStart<'_>, cell: Option<&mut DocxCell>) {
    if let Some(cell) = cell {
        cell.grid_span = val_attribute(reader, e)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n >= 1)
            .unwrap_or(1);
    }
}

/// 縦結合を解決し、HTMLセルの行に変換する
///
/// 各セルのグリッド列位置は、同じ行の先行セルの`grid_span`の合計です。
/// `Restart`のセルの`rowspan`は、直下の行から同じグリッド列に続く`Continue`セルの数 + 1です。
fn resolve_table(rows: &[Vec<DocxCell>]) -> Vec<Vec<HtmlCell>> {
    // 各行の (グリッド列, セル) の対応
    let positioned: Vec<Vec<(usize, &DocxCell)>> = rows
        .iter()
        .map(|row| {
            let mut col = 0;
            row.iter()
                .map(|cell| {
                    let start = col;
                    col += cell.grid_span;
                    (start, cell)
                })
                .collect()
        })
        .collect();

    let continues_at = |row_idx: usize, col: usize| {
        positioned.get(row_idx).is_some_and(|row| {
            row.iter()
                .any(|(c, cell)| *c == col && cell.v_merge == VerticalMerge::Continue)
        })
    };

    positioned
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            row.iter()
                .filter(|(_, cell)| cell.v_merge != VerticalMerge::Continue)
                .map(|&(col, cell)| {
                    let mut row_span = 1;
                    if cell.v_merge == VerticalMerge::Restart {
                        while continues_at(row_idx + row_span, col) {
                            row_span += 1;
                        }
                    }
                    HtmlCell {
                        text: cell.text.clone(),
                        row_span,
                        col_span: cell.grid_span,
                    }
                })
                .collect()
        })
        .collect()
}

fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            Block::Paragraph(text) => {
                out.push_str("<p>");
                out.push_str(&quick_xml::escape::escape(text.as_str()));
                out.push_str("</p>\n");
            }
            Block::Table(rows) => write_html_table(&mut out, &resolve_table(rows)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn document(body: &str) -> String {
        format!(r#"<?xml version="1.0"?><w:document {}><w:body>{}</w:body></w:document>"#, NS, body)
    }

    fn tc(props: &str, text: &str) -> String {
        format!(
            "<w:tc><w:tcPr>{}</w:tcPr><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc>",
            props, text
        )
    }

    #[test]
    fn test_paragraphs_and_table() {
        let xml = document(&format!(
            "<w:p><w:r><w:t>2026 课表</w:t></w:r></w:p><w:tbl><w:tr>{}{}</w:tr></w:tbl>",
            tc("", "时间"),
            tc("", "星期一")
        ));
        let markup = render_blocks(&parse_document(&xml).unwrap());

        assert!(markup.starts_with("<p>2026 课表</p>"));
        assert!(markup.contains("<tr><td>时间</td><td>星期一</td></tr>"));
    }

    #[test]
    fn test_grid_span_becomes_colspan() {
        let xml = document(&format!(
            r#"<w:tbl><w:tr>{}</w:tr></w:tbl>"#,
            tc(r#"<w:gridSpan w:val="2"/>"#, "合并")
        ));
        let markup = render_blocks(&parse_document(&xml).unwrap());
        assert!(markup.contains(r#"<td colspan="2">合并</td>"#));
    }

    #[test]
    fn test_escaped_attribute_values_are_decoded() {
        let xml = document(&format!(
            "<w:tbl><w:tr>{}</w:tr><w:tr>{}</w:tr></w:tbl>",
            tc(r#"<w:gridSpan w:val="&#51;"/><w:vMerge w:val="re&#115;tart"/>"#, "实验"),
            tc("<w:vMerge/>", ""),
        ));
        let blocks = parse_document(&xml).unwrap();
        let Block::Table(rows) = &blocks[0] else {
            panic!("expected table");
        };
        let resolved = resolve_table(rows);

        assert_eq!(resolved[0][0].col_span, 3);
        assert_eq!(resolved[0][0].row_span, 2);
    }

    #[test]
    fn test_vertical_merge_becomes_rowspan() {
        let xml = document(&format!(
            "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
            tc("", "08:00-08:45"),
            tc(r#"<w:vMerge w:val="restart"/>"#, "高数"),
            tc("", "08:55-09:40"),
            tc("<w:vMerge/>", ""),
            tc("", "10:00-10:45"),
            tc("", "英语"),
        ));
        let blocks = parse_document(&xml).unwrap();
        let Block::Table(rows) = &blocks[0] else {
            panic!("expected table");
        };
        let resolved = resolve_table(rows);

        assert_eq!(resolved[0][1].row_span, 2);
        assert_eq!(resolved[0][1].text, "高数");
        // 継続セルは出力されない
        assert_eq!(resolved[1].len(), 1);
        assert_eq!(resolved[2][1].row_span, 1);
    }

    #[test]
    fn test_vertical_merge_respects_grid_column() {
        // 2行目の継続セルは列1にあるため、列2で始まった結合には数えない
        let xml = document(&format!(
            "<w:tbl><w:tr>{}{}{}</w:tr><w:tr>{}{}{}</w:tr></w:tbl>",
            tc("", "a"),
            tc(r#"<w:vMerge w:val="restart"/>"#, "b"),
            tc(r#"<w:vMerge w:val="restart"/>"#, "c"),
            tc("", "d"),
            tc("<w:vMerge/>", ""),
            tc("", "e"),
        ));
        let blocks = parse_document(&xml).unwrap();
        let Block::Table(rows) = &blocks[0] else {
            panic!("expected table");
        };
        let resolved = resolve_table(rows);
        assert_eq!(resolved[0][1].row_span, 2);
        assert_eq!(resolved[0][2].row_span, 1);
    }

    #[test]
    fn test_cell_paragraphs_and_breaks_become_line_breaks() {
        let xml = document(
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>高数</w:t></w:r></w:p>\
             <w:p><w:r><w:t>李老师</w:t><w:br/><w:t>A101</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
        );
        let markup = render_blocks(&parse_document(&xml).unwrap());
        assert!(markup.contains("<td>高数<br/>李老师<br/>A101</td>"));
    }

    #[test]
    fn test_nested_table_text_is_kept_in_outer_cell() {
        let xml = document(&format!(
            "<w:tbl><w:tr><w:tc><w:tbl><w:tr>{}</w:tr></w:tbl></w:tc></w:tr></w:tbl>",
            tc("", "内层")
        ));
        let blocks = parse_document(&xml).unwrap();
        assert_eq!(blocks.len(), 1);
        let Block::Table(rows) = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].text, "内层");
    }

    #[test]
    fn test_missing_document_part_is_conversion_error() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("word/other.xml", zip::write::FileOptions::default())
                .unwrap();
            std::io::Write::write_all(&mut writer, b"<x/>").unwrap();
            writer.finish().unwrap();
        }

        let result = DocxConverter::default().convert_bytes(buffer.get_ref());
        assert!(matches!(result, Err(ImportError::Conversion(_))));
    }

    #[test]
    fn test_not_a_zip_is_zip_error() {
        let result = DocxConverter::default().convert_bytes(b"plain text");
        assert!(matches!(result, Err(ImportError::Zip(_))));
    }
}
