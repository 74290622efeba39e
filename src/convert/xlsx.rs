//! XLSX Converter
//!
//! calamineでブックの最初のシートを読み込み、結合セル範囲を`rowspan`/`colspan`として
//! 1つの`<table>`に書き出す。

use calamine::{open_workbook_auto_from_rs, Data, Dimensions, Range, Reader, Sheets};
use chrono::NaiveTime;
use std::collections::HashMap;
use std::io::Cursor;

use crate::api::SupportedFormat;
use crate::convert::{write_html_table, ConvertedDocument, DocumentConverter, HtmlCell};
use crate::error::{ImportError, Result};
use crate::security::SecurityConfig;

/// Excelブック（.xlsx / .xlsm）用コンバーター
#[derive(Debug, Clone, Default)]
pub struct XlsxConverter {
    security: SecurityConfig,
}

impl XlsxConverter {
    pub fn new(security: SecurityConfig) -> Self {
        Self { security }
    }
}

impl DocumentConverter for XlsxConverter {
    fn format(&self) -> SupportedFormat {
        SupportedFormat::Xlsx
    }

    fn security(&self) -> &SecurityConfig {
        &self.security
    }

    fn convert_bytes(&self, bytes: &[u8]) -> Result<ConvertedDocument> {
        // ZIPコンテナとしての事前検査
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        self.security.check_archive(&mut archive)?;

        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let mut workbook = match sheets {
            Sheets::Xlsx(workbook) => workbook,
            _ => {
                return Err(ImportError::UnsupportedFormat(
                    "Only XLSX workbooks are supported".to_string(),
                ))
            }
        };

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::Conversion("Workbook contains no sheets".to_string()))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::Spreadsheet(e.into()))?;

        workbook
            .load_merged_regions()
            .map_err(|e| ImportError::Spreadsheet(e.into()))?;
        let merged = match workbook.worksheet_merge_cells(&sheet_name) {
            Some(Ok(regions)) => regions,
            Some(Err(e)) => return Err(ImportError::Spreadsheet(e.into())),
            None => Vec::new(),
        };

        tracing::debug!(
            sheet = %sheet_name,
            merged_regions = merged.len(),
            "read XLSX worksheet"
        );

        let mut markup = String::new();
        if let Some(rows) = sheet_rows(&range, &merged) {
            write_html_table(&mut markup, &rows);
        }
        Ok(ConvertedDocument { markup })
    }
}

/// ワークシートを結合情報付きの行に変換する
///
/// 結合範囲の左上セルのみを出力し、覆われた位置は出力しません。
/// 値の入っていない範囲しかないシートは`None`を返します。
fn sheet_rows(range: &Range<Data>, merged: &[Dimensions]) -> Option<Vec<Vec<HtmlCell>>> {
    let (first_row, first_col) = range.start()?;
    let (mut last_row, mut last_col) = range.end()?;
    let merged: Vec<Dimensions> = merged.iter().map(normalize_region).collect();

    // 結合範囲が使用範囲の外まで広がっている場合も含める
    for region in &merged {
        last_row = last_row.max(region.end.0);
        last_col = last_col.max(region.end.1);
    }

    let origins: HashMap<(u32, u32), &Dimensions> =
        merged.iter().map(|region| (region.start, region)).collect();
    let covered = |row: u32, col: u32| {
        merged.iter().any(|region| {
            region.start != (row, col)
                && (region.start.0..=region.end.0).contains(&row)
                && (region.start.1..=region.end.1).contains(&col)
        })
    };

    let rows = (first_row..=last_row)
        .map(|row| {
            (first_col..=last_col)
                .filter(|&col| !covered(row, col))
                .map(|col| {
                    let text = range
                        .get_value((row, col))
                        .map(cell_text)
                        .unwrap_or_default();
                    let (row_span, col_span) = origins
                        .get(&(row, col))
                        .map(|region| {
                            (
                                (region.end.0.saturating_sub(region.start.0) as usize) + 1,
                                (region.end.1.saturating_sub(region.start.1) as usize) + 1,
                            )
                        })
                        .unwrap_or((1, 1));
                    HtmlCell {
                        text,
                        row_span,
                        col_span,
                    }
                })
                .collect()
        })
        .collect();

    Some(rows)
}

/// 結合範囲の始点と終点を左上・右下の順に揃える
fn normalize_region(region: &Dimensions) -> Dimensions {
    Dimensions {
        start: (
            region.start.0.min(region.end.0),
            region.start.1.min(region.end.1),
        ),
        end: (
            region.start.0.max(region.end.0),
            region.start.1.max(region.end.1),
        ),
    }
}

/// セル値を表示用テキストに変換する
///
/// 時刻のみのシリアル値（1未満）は`HH:MM`として出力します。
fn cell_text(data: &Data) -> String {
    match data {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if (0.0..1.0).contains(&serial) {
                serial_to_time(serial)
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| format_number(serial))
            } else {
                format_number(serial)
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// 1日の割合を時刻に変換する（秒は四捨五入）
fn serial_to_time(fraction: f64) -> Option<NaiveTime> {
    let seconds = (fraction * 86_400.0).round() as i64;
    if !(0..86_400).contains(&seconds) {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, 0)
}
