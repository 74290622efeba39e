//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use std::fmt;

/// 1学期の週数
pub const SEMESTER_WEEKS: u32 = 18;

/// カレンダーイベントの種別（常に"calendar"）
pub const EVENT_TYPE_CALENDAR: &str = "calendar";

/// グリッド座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CellCoord {
    pub row: usize,
    pub col: usize,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    ///
    /// ログ出力で破棄されたセルの位置を示すために使用します。
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        let mut col = self.col;
        let mut letters = Vec::new();
        loop {
            letters.push((b'A' + (col % 26) as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        let col_str: String = letters.iter().rev().collect();
        format!("{}{}", col_str, self.row + 1)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_notation())
    }
}

/// 再構築済みグリッドの1セル
///
/// 結合領域の左上（原点）セルのみ`is_placeholder = false`で実際の`row_span`を持ちます。
/// 結合領域に覆われたその他の位置はプレースホルダーであり、個別に解析してはいけません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    /// マークアップを除去し、空白を正規化したテキスト
    pub text: String,

    /// 結合領域に覆われた位置かどうか
    pub is_placeholder: bool,

    /// 縦方向の結合数（原点セルのみ意味を持つ）
    pub row_span: usize,

    /// 横方向の結合数（原点セルのみ意味を持つ）
    pub col_span: usize,
}

impl GridCell {
    /// 結合領域の原点セルを生成
    pub fn origin(text: String, row_span: usize, col_span: usize) -> Self {
        Self {
            text,
            is_placeholder: false,
            row_span,
            col_span,
        }
    }

    /// 原点セルのテキストを引き継いだプレースホルダーを生成
    pub fn placeholder(text: String) -> Self {
        Self {
            text,
            is_placeholder: true,
            row_span: 1,
            col_span: 1,
        }
    }
}

fn serialize_hhmm<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format("%H:%M"))
}

/// 1コマ（行）の時間帯
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    /// 開始時刻（"HH:MM"としてシリアライズ）
    #[serde(serialize_with = "serialize_hhmm")]
    pub start: NaiveTime,

    /// 終了時刻（"HH:MM"としてシリアライズ）
    #[serde(serialize_with = "serialize_hhmm")]
    pub end: NaiveTime,
}

impl TimeRange {
    /// 新しい時間帯を生成
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// セルのテキストから抽出された授業情報
///
/// 不変条件: `1 <= start_week <= end_week <= SEMESTER_WEEKS`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDescriptor {
    pub course_name: String,
    pub teacher: String,
    pub classroom: String,
    pub course_category: String,
    pub start_week: u32,
    pub end_week: u32,
}

impl CourseDescriptor {
    /// 授業名のみを持ち、全週に開講される授業情報を生成
    pub fn named(course_name: impl Into<String>) -> Self {
        Self {
            course_name: course_name.into(),
            teacher: String::new(),
            classroom: String::new(),
            course_category: String::new(),
            start_week: 1,
            end_week: SEMESTER_WEEKS,
        }
    }

    /// 指定した週（1始まり）に開講されるかどうか
    pub fn is_active_in_week(&self, week: u32) -> bool {
        week >= self.start_week && week <= self.end_week && week <= SEMESTER_WEEKS
    }
}

/// 日付展開前の、毎週繰り返される授業コマ
///
/// 同じ曜日・時間帯に複数のコマが存在してもよい（重複排除は行わない）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCourseSlot {
    pub descriptor: CourseDescriptor,

    /// 曜日（月曜=1 … 日曜=7）
    pub day_of_week: u32,

    /// 開始行の時間帯
    pub start: TimeRange,

    /// 終了行（開始行 + row_span - 1）の時間帯
    pub end: TimeRange,
}

/// 取り込み先カテゴリ（固定のラベル・色）
///
/// ストア側で find-or-create され、取り込みのたびにラベルと色が正規化されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCategory {
    pub id: String,
    pub label: String,
    pub color: String,
}

impl Default for ImportCategory {
    fn default() -> Self {
        Self {
            id: "imported-schedule".to_string(),
            label: "导入课表".to_string(),
            color: "#4A90E2".to_string(),
        }
    }
}

/// 学期展開で生成される、日付の確定したカレンダーイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub description: String,
    pub category_id: String,
    pub category_color: String,
    pub all_day: bool,
    pub event_type: &'static str,
}

impl CalendarEvent {
    /// イベントの日付
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

/// カレンダーストアへ一括で渡される取り込みバッチ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub events: Vec<CalendarEvent>,
    pub category: ImportCategory,
}

impl ImportBatch {
    /// 取り込み先カテゴリID
    pub fn import_category_id(&self) -> &str {
        &self.category.id
    }
}
