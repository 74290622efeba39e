//! Public API Types
//!
//! 公開APIで使用する設定値・列挙型を定義するモジュール。

use serde::Serialize;
use std::path::Path;

use crate::error::{ImportError, Result};

/// 学期の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Season {
    /// 春学期
    Spring,
    /// 秋学期
    Autumn,
}

impl Season {
    /// 表示用の名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Season::Spring => "春季学期",
            Season::Autumn => "秋季学期",
        }
    }
}

/// 学期判定のルール
///
/// 現在の月が`spring_months`の範囲内なら春学期、それ以外は秋学期と判定します。
/// 春学期の開始月より前の月（デフォルトでは1月）は前年の秋学期として扱います。
///
/// デフォルト値は「2月〜7月は3月1日起点の春学期、8月〜1月は9月8日起点の秋学期」です。
///
/// # 使用例
///
/// ```rust
/// use coursegrid::{ImporterBuilder, SemesterPolicy};
///
/// # fn main() -> Result<(), coursegrid::ImportError> {
/// let importer = ImporterBuilder::new()
///     .with_semester_policy(SemesterPolicy {
///         spring_months: (2, 7),
///         spring_anchor: (2, 24),
///         autumn_anchor: (9, 1),
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemesterPolicy {
    /// 春学期と判定する月の範囲（開始月, 終了月）
    pub spring_months: (u32, u32),

    /// 春学期の起点日（月, 日）
    pub spring_anchor: (u32, u32),

    /// 秋学期の起点日（月, 日）
    pub autumn_anchor: (u32, u32),
}

impl Default for SemesterPolicy {
    fn default() -> Self {
        Self {
            spring_months: (2, 7),
            spring_anchor: (3, 1),
            autumn_anchor: (9, 8),
        }
    }
}

impl SemesterPolicy {
    /// 指定した月が春学期の範囲内かどうか
    pub fn is_spring_month(&self, month: u32) -> bool {
        month >= self.spring_months.0 && month <= self.spring_months.1
    }

    /// ルールを検証する
    ///
    /// 起点日は閏年以外でも存在する日付でなければなりません（2月29日は不可）。
    pub(crate) fn validate(&self) -> Result<()> {
        let (first, last) = self.spring_months;
        if !(1..=12).contains(&first) || !(1..=12).contains(&last) {
            return Err(ImportError::Config(format!(
                "Invalid spring months: {}..={} (must be within 1..=12)",
                first, last
            )));
        }
        if first > last {
            return Err(ImportError::Config(format!(
                "Invalid spring months: start month ({}) > end month ({})",
                first, last
            )));
        }

        for (name, (month, day)) in [
            ("spring", self.spring_anchor),
            ("autumn", self.autumn_anchor),
        ] {
            if chrono::NaiveDate::from_ymd_opt(2023, month, day).is_none() {
                return Err(ImportError::Config(format!(
                    "Invalid {} anchor date: {}-{}",
                    name, month, day
                )));
            }
        }

        Ok(())
    }
}

/// 取り込み可能なドキュメント形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SupportedFormat {
    /// Word文書（.docx）
    Docx,
    /// Excelブック（.xlsx / .xlsm）
    Xlsx,
    /// HTML（.html / .htm）
    Html,
}

impl SupportedFormat {
    /// 拡張子から形式を判定する
    ///
    /// # 戻り値
    ///
    /// * `Ok(SupportedFormat)` - サポートされている拡張子の場合
    /// * `Err(ImportError::UnsupportedFormat)` - それ以外の場合
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "docx" => Ok(SupportedFormat::Docx),
            "xlsx" | "xlsm" => Ok(SupportedFormat::Xlsx),
            "html" | "htm" => Ok(SupportedFormat::Html),
            _ => Err(ImportError::UnsupportedFormat(format!(
                "'{}' (expected .docx, .xlsx, .xlsm, .html or .htm)",
                path.display()
            ))),
        }
    }
}
