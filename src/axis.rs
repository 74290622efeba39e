//! Axis Module
//!
//! グリッドの行軸（行 → 時間帯）と列軸（列 → 曜日）を解釈するモジュール。
//! 解決できなかった軸はエラーにせず`None`として記録し、後段でそのセルを破棄させます。

use chrono::NaiveTime;
use regex::Regex;
use std::sync::LazyLock;

use crate::grid::TimetableGrid;
use crate::types::TimeRange;

/// 時間が書かれている列
pub(crate) const TIME_COLUMN: usize = 1;

/// 曜日列の開始位置
pub(crate) const FIRST_WEEKDAY_COLUMN: usize = 2;

static CLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s*[:：]\s*(\d{2})").unwrap());

/// 曜日の表記と曜日番号（月曜=1）の対応表
///
/// 表の順に検索し、最初に見つかった表記を採用します。
const WEEKDAY_GLYPHS: &[(&str, u32)] = &[
    ("一", 1),
    ("二", 2),
    ("三", 3),
    ("四", 4),
    ("五", 5),
    ("六", 6),
    ("日", 7),
    ("天", 7),
    ("mon", 1),
    ("tue", 2),
    ("wed", 3),
    ("thu", 4),
    ("fri", 5),
    ("sat", 6),
    ("sun", 7),
];

/// 行軸・列軸の解釈結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisMap {
    /// 行インデックス → 時間帯（行0と解決できなかった行は`None`）
    row_times: Vec<Option<TimeRange>>,

    /// 列インデックス → 曜日（列0・1と解決できなかった列は`None`）
    weekdays: Vec<Option<u32>>,
}

impl AxisMap {
    /// グリッドから軸を解釈する（失敗しない）
    pub fn interpret(grid: &TimetableGrid) -> Self {
        let row_times = (0..grid.get_rows())
            .map(|row| {
                if row == 0 {
                    None
                } else {
                    parse_time_range(grid.text(row, TIME_COLUMN))
                }
            })
            .collect();

        let weekdays = (0..grid.get_cols())
            .map(|col| {
                if col < FIRST_WEEKDAY_COLUMN {
                    None
                } else {
                    parse_weekday(grid.text(0, col))
                }
            })
            .collect();

        Self {
            row_times,
            weekdays,
        }
    }

    /// 行の時間帯
    pub fn time_of_row(&self, row: usize) -> Option<TimeRange> {
        self.row_times.get(row).copied().flatten()
    }

    /// 列の曜日
    pub fn weekday_of_column(&self, col: usize) -> Option<u32> {
        self.weekdays.get(col).copied().flatten()
    }
}

/// テキストから2つの時刻を探し、時間帯として返す
///
/// "08:00-09:40"、"8：00\n9：40"などを受け付けます。
pub(crate) fn parse_time_range(text: &str) -> Option<TimeRange> {
    let mut times = CLOCK_PATTERN.captures_iter(text).filter_map(|caps| {
        let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let minute = caps.get(2)?.as_str().parse::<u32>().ok()?;
        NaiveTime::from_hms_opt(hour, minute, 0)
    });

    let start = times.next()?;
    let end = times.next()?;
    Some(TimeRange::new(start, end))
}

/// 見出しテキストから曜日番号を求める
pub(crate) fn parse_weekday(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    WEEKDAY_GLYPHS
        .iter()
        .find(|(glyph, _)| lowered.contains(glyph))
        .map(|&(_, day)| day)
}
