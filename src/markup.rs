//! Markup Module
//!
//! 変換後のマークアップ（HTML）から最初の表を探し出し、行とセルの記述子に分解するモジュール。
//! 各行は個別にquick-xmlで解析され、タグの対応が取れない行は取り込み全体を
//! 失敗させずにスキップされます。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::sync::LazyLock;

static TABLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").unwrap());

static ROW_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());

// HTMLの空要素をXMLとして解析できる形（<br/>）に揃える
static VOID_ELEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|hr|img|col|input|wbr|meta|link)\b([^>]*?)\s*/?>").unwrap()
});

/// 表セルの生データ（結合情報付き）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawCell {
    pub text: String,
    pub row_span: usize,
    pub col_span: usize,
}

impl RawCell {
    #[cfg(test)]
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            row_span: 1,
            col_span: 1,
        }
    }
}

/// 表の1行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RawRow {
    pub cells: Vec<RawCell>,
}

/// マークアップ中の最初の`<table>`の内側を返す
///
/// 複数の表を含むドキュメントでも最初の1つだけを対象とします。
pub(crate) fn locate_first_table(markup: &str) -> Option<&str> {
    TABLE_PATTERN
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// 表の内側を行記述子の列に分解する
///
/// # 引数
///
/// * `table` - `locate_first_table()`が返した表の内側
/// * `max_span` - rowspan/colspan属性の上限
///
/// # 戻り値
///
/// 解析に成功した行のリスト（不正な行は含まれない）
pub(crate) fn parse_table_rows(table: &str, max_span: usize) -> Vec<RawRow> {
    let mut rows = Vec::new();

    for (index, caps) in ROW_PATTERN.captures_iter(table).enumerate() {
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        match parse_row(inner, max_span) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                tracing::warn!(row = index, %reason, "skipping malformed table row");
            }
        }
    }

    rows
}

/// 1行分のマークアップを解析する
fn parse_row(inner: &str, max_span: usize) -> Result<RawRow, String> {
    let normalized = VOID_ELEMENT_PATTERN.replace_all(inner, "<$1$2/>");

    let mut reader = Reader::from_str(&normalized);
    reader.check_end_names(false);

    let mut row = RawRow::default();
    let mut open_tags: Vec<String> = Vec::new();
    // 解析中のセルと、そのセルを開いたタグの深さ
    let mut current: Option<(RawCell, usize)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = tag_name(&e);
                open_tags.push(name.clone());

                if current.is_none() && is_cell_tag(&name) {
                    let (row_span, col_span) = read_spans(&reader, &e, max_span);
                    let cell = RawCell {
                        text: String::new(),
                        row_span,
                        col_span,
                    };
                    current = Some((cell, open_tags.len()));
                } else if let Some((cell, _)) = current.as_mut() {
                    if is_block_tag(&name) {
                        cell.text.push(' ');
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = tag_name(&e);
                if current.is_none() && is_cell_tag(&name) {
                    let (row_span, col_span) = read_spans(&reader, &e, max_span);
                    row.cells.push(RawCell {
                        text: String::new(),
                        row_span,
                        col_span,
                    });
                } else if let Some((cell, _)) = current.as_mut() {
                    if name == "br" || is_block_tag(&name) {
                        cell.text.push(' ');
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((cell, _)) = current.as_mut() {
                    match e.unescape_with(resolve_html_entity) {
                        Ok(text) => cell.text.push_str(&text),
                        Err(_) => cell.text.push_str(&String::from_utf8_lossy(&e)),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((cell, _)) = current.as_mut() {
                    cell.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                match open_tags.pop() {
                    Some(open) if open == name => {}
                    Some(open) => {
                        return Err(format!("expected </{}>, found </{}>", open, name));
                    }
                    None => return Err(format!("unexpected </{}>", name)),
                }

                let closes_cell = matches!(current, Some((_, depth)) if depth == open_tags.len() + 1);
                if closes_cell {
                    if let Some((mut cell, _)) = current.take() {
                        cell.text = normalize_text(&cell.text);
                        row.cells.push(cell);
                    }
                } else if let Some((cell, _)) = current.as_mut() {
                    if is_block_tag(&name) {
                        cell.text.push(' ');
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }

    if let Some(open) = open_tags.last() {
        return Err(format!("unclosed <{}>", open));
    }

    Ok(row)
}

/// マークアップを除去した後のテキストの空白を正規化する
///
/// 連続する空白（全角スペース・NBSPを含む）を1つの半角スペースにまとめ、前後を除去します。
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn is_cell_tag(name: &str) -> bool {
    name == "td" || name == "th"
}

fn is_block_tag(name: &str) -> bool {
    matches!(name, "p" | "div" | "li" | "ul" | "ol" | "tr" | "table")
}

/// rowspan/colspan属性を読み取る（不正値は1、上限は`max_span`）
fn read_spans<B>(reader: &Reader<B>, e: &BytesStart<'_>, max_span: usize) -> (usize, usize) {
    let mut row_span = 1;
    let mut col_span = 1;

    for attr in e.html_attributes().flatten() {
        let key = attr.key.as_ref().to_ascii_lowercase();
        let parse = || {
            attr.decode_and_unescape_value(reader)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&n| n >= 1)
                .map(|n| n.min(max_span))
                .unwrap_or(1)
        };
        match key.as_slice() {
            b"rowspan" => row_span = parse(),
            b"colspan" => col_span = parse(),
            _ => {}
        }
    }

    (row_span, col_span)
}

/// XML定義外のHTML名前付き文字参照を解決する
fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" | "ensp" | "emsp" | "thinsp" => Some(" "),
        "middot" => Some("·"),
        "ndash" => Some("–"),
        "mdash" => Some("—"),
        "hellip" => Some("…"),
        "ldquo" => Some("“"),
        "rdquo" => Some("”"),
        "lsquo" => Some("‘"),
        "rsquo" => Some("’"),
        "times" => Some("×"),
        _ => None,
    }
}
