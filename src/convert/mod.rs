//! Document Conversion Module
//!
//! アップロードされたドキュメント（DOCX / XLSX / HTML）を、表を含むHTMLマークアップへ
//! 変換するモジュール。抽出パイプラインの入力はこの変換結果のマークアップのみです。
//!
//! 変換はパイプラインで唯一のI/Oを伴う段階です。入力サイズとZIPコンテナの検査は
//! `SecurityConfig`に従ってこの段階で行われます。

mod docx;
mod html;
mod xlsx;

pub use docx::DocxConverter;
pub use html::HtmlConverter;
pub use xlsx::XlsxConverter;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::api::SupportedFormat;
use crate::error::Result;
use crate::security::SecurityConfig;

/// 変換結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDocument {
    /// 構造化マークアップ（HTML）
    pub markup: String,
}

/// ドキュメントをマークアップへ変換するコンバーター
///
/// 実装は`convert_bytes()`のみを提供すればよく、`convert()`はファイルを読み込み、
/// 入力サイズを検証したうえで`convert_bytes()`へ委譲します。
pub trait DocumentConverter: Send + Sync {
    /// 対応する形式
    fn format(&self) -> SupportedFormat;

    /// 入力サイズ検証に使用するセキュリティ設定
    fn security(&self) -> &SecurityConfig;

    /// メモリ上のドキュメントを変換する
    fn convert_bytes(&self, bytes: &[u8]) -> Result<ConvertedDocument>;

    /// ファイルを読み込んで変換する
    fn convert(&self, path: &Path) -> Result<ConvertedDocument> {
        let file = File::open(path)?;
        let limit = self.security().max_input_file_size;
        self.security().check_input_size(file.metadata()?.len())?;

        // メタデータと実際のサイズが異なる場合に備え、上限+1バイトまでしか読まない
        let mut buffer = Vec::new();
        file.take(limit.saturating_add(1)).read_to_end(&mut buffer)?;
        self.security().check_input_size(buffer.len() as u64)?;

        self.convert_bytes(&buffer)
    }
}

/// 形式に対応するコンバーターを生成する
pub fn converter_for(format: SupportedFormat, security: &SecurityConfig) -> Box<dyn DocumentConverter> {
    match format {
        SupportedFormat::Docx => Box::new(DocxConverter::new(security.clone())),
        SupportedFormat::Xlsx => Box::new(XlsxConverter::new(security.clone())),
        SupportedFormat::Html => Box::new(HtmlConverter::new(security.clone())),
    }
}

/// 表の1セル（HTML出力用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HtmlCell {
    pub text: String,
    pub row_span: usize,
    pub col_span: usize,
}

/// 行とセルから`<table>`要素を書き出す
///
/// テキストはエスケープされ、改行は`<br/>`として出力されます。
pub(crate) fn write_html_table(out: &mut String, rows: &[Vec<HtmlCell>]) {
    out.push_str("<table>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str("<td");
            if cell.row_span > 1 {
                out.push_str(&format!(" rowspan=\"{}\"", cell.row_span));
            }
            if cell.col_span > 1 {
                out.push_str(&format!(" colspan=\"{}\"", cell.col_span));
            }
            out.push('>');
            let lines: Vec<String> = cell
                .text
                .lines()
                .map(|line| quick_xml::escape::escape(line).into_owned())
                .collect();
            out.push_str(&lines.join("<br/>"));
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
}
