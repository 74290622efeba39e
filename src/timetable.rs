//! Timetable Module
//!
//! グリッド・軸・セル解析結果を組み合わせ、毎週の授業コマの一覧を組み立てるモジュール。

use rayon::prelude::*;
use serde::Serialize;

use crate::axis::{AxisMap, FIRST_WEEKDAY_COLUMN};
use crate::cell::parse_cell;
use crate::grid::TimetableGrid;
use crate::types::{CellCoord, TimeRange, WeeklyCourseSlot};

/// 組み立て結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    /// 行優先順の授業コマ
    pub slots: Vec<WeeklyCourseSlot>,

    /// 軸が解決できず破棄されたセルの数
    pub discarded: usize,
}

/// 軸の解決が済んだ、解析待ちの原点セル
struct ResolvedCell<'a> {
    text: &'a str,
    day_of_week: u32,
    start: TimeRange,
    end: TimeRange,
}

/// 毎週の授業コマを組み立てる
///
/// 行1..N、列1..Mを行優先で走査し、プレースホルダーと空セルを読み飛ばします。
/// 列1は行軸（時間）の見出しなので、授業セルとしては扱いません。
/// 原点セルごとに、自身の行から開始時間帯を、`row + row_span - 1`行から終了時間帯を、
/// 列から曜日を求めます。いずれかの軸が解決できないセルはエラーにせず破棄します。
pub fn assemble(grid: &TimetableGrid, axes: &AxisMap) -> Timetable {
    let mut resolved = Vec::new();
    let mut discarded = 0;

    for row in 1..grid.get_rows() {
        for col in FIRST_WEEKDAY_COLUMN..grid.get_cols() {
            let Some(cell) = grid.get(row, col) else {
                continue;
            };
            if cell.is_placeholder || cell.text.is_empty() {
                continue;
            }

            let end_row = row + cell.row_span.max(1) - 1;
            let axes_resolved = (
                axes.weekday_of_column(col),
                axes.time_of_row(row),
                axes.time_of_row(end_row),
            );

            match axes_resolved {
                (Some(day_of_week), Some(start), Some(end)) => resolved.push(ResolvedCell {
                    text: &cell.text,
                    day_of_week,
                    start,
                    end,
                }),
                _ => {
                    discarded += 1;
                    tracing::debug!(
                        cell = %CellCoord::new(row, col),
                        text = %cell.text,
                        "discarding cell with unresolved weekday or time axis"
                    );
                }
            }
        }
    }

    // セル解析は純粋関数のため並列に実行し、順序は保持する
    let slots = resolved
        .par_iter()
        .map(|cell| WeeklyCourseSlot {
            descriptor: parse_cell(cell.text),
            day_of_week: cell.day_of_week,
            start: cell.start,
            end: cell.end,
        })
        .collect();

    Timetable { slots, discarded }
}
