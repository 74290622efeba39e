//! Builder Module
//!
//! Fluent Builder APIを提供し、`Importer`インスタンスを段階的に構築する。
//! `Importer`は変換 → 表の特定 → グリッド再構築 → 授業コマの組み立て → 学期展開 →
//! ストアへの受け渡し、という一連の取り込み処理のファサードです。

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::api::{SemesterPolicy, SupportedFormat};
use crate::axis::AxisMap;
use crate::convert::converter_for;
use crate::error::{ImportError, Result};
use crate::grid::TimetableGrid;
use crate::markup::locate_first_table;
use crate::security::SecurityConfig;
use crate::semester::{materialize, Semester};
use crate::store::CalendarStore;
use crate::timetable::{assemble, Timetable};
use crate::types::{CalendarEvent, ImportBatch, ImportCategory, WeeklyCourseSlot};

/// 取り込み処理の設定を保持する内部構造体
#[derive(Debug, Clone, Default)]
pub(crate) struct ImportConfig {
    /// 学期判定のルール
    pub semester_policy: SemesterPolicy,

    /// 取り込み先カテゴリ
    pub category: ImportCategory,

    /// セキュリティ制限
    pub security: SecurityConfig,
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust
/// use coursegrid::{ImportCategory, ImporterBuilder};
///
/// # fn main() -> Result<(), coursegrid::ImportError> {
/// let importer = ImporterBuilder::new()
///     .with_category(ImportCategory {
///         id: "timetable".to_string(),
///         label: "课表".to_string(),
///         color: "#FF8800".to_string(),
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ImporterBuilder {
    /// 内部設定（構築中）
    config: ImportConfig,
}

impl ImporterBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 学期判定: 2月〜7月は3月1日起点の春学期、それ以外は9月8日起点の秋学期
    /// - 取り込み先カテゴリ: `imported-schedule`（"导入课表", `#4A90E2`）
    /// - セキュリティ制限: `SecurityConfig::default()`
    pub fn new() -> Self {
        Self::default()
    }

    /// 学期判定のルールを指定する
    pub fn with_semester_policy(mut self, policy: SemesterPolicy) -> Self {
        self.config.semester_policy = policy;
        self
    }

    /// 取り込み先カテゴリを指定する
    ///
    /// # 制約
    ///
    /// * `id`と`label`は空であってはならない
    /// * `color`は`#RRGGBB`形式でなければならない
    pub fn with_category(mut self, category: ImportCategory) -> Self {
        self.config.category = category;
        self
    }

    /// セキュリティ制限を指定する
    pub fn with_security_config(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// 設定を検証し、`Importer`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Importer)`: 設定が有効な場合
    /// * `Err(ImportError::Config)`: 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * 春学期の月範囲が1..=12の外、または開始月 > 終了月
    /// * 起点日が存在しない日付（2月29日を含む）
    /// * カテゴリのIDまたはラベルが空、色が`#RRGGBB`形式でない
    /// * `max_span`または`max_input_file_size`が0
    pub fn build(self) -> Result<Importer> {
        // 1. 学期判定ルールの検証
        self.config.semester_policy.validate()?;

        // 2. カテゴリの検証
        let category = &self.config.category;
        if category.id.trim().is_empty() {
            return Err(ImportError::Config(
                "Import category id must not be empty".to_string(),
            ));
        }
        if category.label.trim().is_empty() {
            return Err(ImportError::Config(
                "Import category label must not be empty".to_string(),
            ));
        }
        if !is_hex_color(&category.color) {
            return Err(ImportError::Config(format!(
                "Invalid category color: '{}' (expected #RRGGBB)",
                category.color
            )));
        }

        // 3. セキュリティ制限の検証
        let security = &self.config.security;
        if security.max_span == 0 {
            return Err(ImportError::Config("max_span must be at least 1".to_string()));
        }
        if security.max_input_file_size == 0 {
            return Err(ImportError::Config(
                "max_input_file_size must be greater than 0".to_string(),
            ));
        }

        Ok(Importer {
            config: self.config,
        })
    }
}

fn is_hex_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// 取り込み処理の段階
///
/// `Idle → Converting → TableLocated → GridBuilt → SlotsAssembled → Materialized → Done`
/// の一方向にのみ進み、どの段階からも`Failed`へ遷移し得ます。再試行はありません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImportStage {
    Idle,
    Converting,
    TableLocated,
    GridBuilt,
    SlotsAssembled,
    Materialized,
    Done,
    Failed(String),
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStage::Idle => f.write_str("idle"),
            ImportStage::Converting => f.write_str("converting"),
            ImportStage::TableLocated => f.write_str("table-located"),
            ImportStage::GridBuilt => f.write_str("grid-built"),
            ImportStage::SlotsAssembled => f.write_str("slots-assembled"),
            ImportStage::Materialized => f.write_str("materialized"),
            ImportStage::Done => f.write_str("done"),
            ImportStage::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// 1回の取り込み処理の段階遷移を記録する
#[derive(Debug)]
struct StageTracker {
    stage: ImportStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: ImportStage::Idle,
        }
    }

    fn advance(&mut self, next: ImportStage) {
        tracing::debug!(from = %self.stage, to = %next, "import stage transition");
        self.stage = next;
    }

    /// `Failed`へ遷移し、エラーをそのまま返す
    fn fail(&mut self, err: ImportError) -> ImportError {
        tracing::debug!(stage = %self.stage, error = %err, "import stage failed");
        self.stage = ImportStage::Failed(err.to_string());
        err
    }
}

/// `parse_outcome()`の結果（UI層との受け渡し用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutcome {
    pub success: bool,

    /// 成功時の授業コマ（行優先順）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<WeeklyCourseSlot>>,

    /// 失敗時のエラーメッセージ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ParseOutcome {
    /// JSON文字列に変換
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// 学期展開の結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedSemester {
    pub semester: Semester,
    pub events: Vec<CalendarEvent>,
}

/// `import_file()`の結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// ストアに作成されたイベント数
    pub created_count: usize,

    /// 学期のラベル（例: "2026年秋季学期"）
    pub semester_label: String,

    /// 学期第1週の月曜日
    pub semester_start_date: NaiveDate,
}

impl ImportSummary {
    /// JSON文字列に変換
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// 取り込み処理のファサード
///
/// `ImporterBuilder`で構築された設定に基づいて取り込み処理を実行します。
/// 1回の呼び出しが1つの独立した処理単位であり、`Importer`自体は状態を持ちません。
///
/// # 使用例
///
/// ```rust
/// use coursegrid::ImporterBuilder;
///
/// # fn main() -> Result<(), coursegrid::ImportError> {
/// let importer = ImporterBuilder::new().build()?;
/// let timetable = importer.parse_markup(
///     "<table>\
///        <tr><td>节次</td><td>时间</td><td>星期一</td></tr>\
///        <tr><td>1</td><td>08:00-09:40</td><td>高等数学/李老师/东区-教学楼-101</td></tr>\
///      </table>",
/// )?;
/// assert_eq!(timetable.slots[0].descriptor.classroom, "101");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Importer {
    /// 取り込み設定
    config: ImportConfig,
}

impl Importer {
    /// 取り込み先カテゴリ
    pub fn category(&self) -> &ImportCategory {
        &self.config.category
    }

    /// マークアップから時間割を抽出する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Timetable)` - 1件以上の授業コマが得られた場合
    /// * `Err(ImportError::NoTableFound)` - マークアップに表がない場合
    /// * `Err(ImportError::EmptySchedule)` - 授業コマが1件も得られなかった場合
    pub fn parse_markup(&self, markup: &str) -> Result<Timetable> {
        let mut tracker = StageTracker::new();
        self.extract(markup, &mut tracker)
    }

    /// ファイルを変換し、時間割を抽出する
    ///
    /// 拡張子から形式を判定し、対応するコンバーターでマークアップへ変換してから
    /// `parse_markup()`と同じ処理を行います。
    pub fn parse_file(&self, path: &Path) -> Result<Timetable> {
        let mut tracker = StageTracker::new();
        let markup = self.convert(path, &mut tracker)?;
        self.extract(&markup, &mut tracker)
    }

    /// `parse_file()`の結果を`{ success, schedule?, message? }`の形で返す
    pub fn parse_outcome(&self, path: &Path) -> ParseOutcome {
        match self.parse_file(path) {
            Ok(timetable) => ParseOutcome {
                success: true,
                schedule: Some(timetable.slots),
                message: None,
            },
            Err(e) => ParseOutcome {
                success: false,
                schedule: None,
                message: Some(e.to_string()),
            },
        }
    }

    /// 授業コマを、`today`から判定した学期の日付付きイベントへ展開する
    pub fn materialize(
        &self,
        slots: &[WeeklyCourseSlot],
        today: NaiveDate,
    ) -> Result<MaterializedSemester> {
        let semester = Semester::detect(today, &self.config.semester_policy)?;
        let events = materialize(slots, &semester, &self.config.category);
        Ok(MaterializedSemester { semester, events })
    }

    /// ファイルを取り込み、展開したイベントをストアへ渡す
    ///
    /// ストアは、それより前のすべての段階が成功した場合に限り、
    /// ちょうど1回だけ呼び出されます。
    ///
    /// # 処理フロー
    ///
    /// 1. 変換（形式判定とマークアップへの変換）
    /// 2. 表の特定と行の解析
    /// 3. グリッドの再構築
    /// 4. 授業コマの組み立て
    /// 5. 学期展開
    /// 6. ストアへの受け渡し
    pub fn import_file<S: CalendarStore>(
        &self,
        path: &Path,
        today: NaiveDate,
        store: &mut S,
    ) -> Result<ImportSummary> {
        let mut tracker = StageTracker::new();

        let markup = self.convert(path, &mut tracker)?;
        let timetable = self.extract(&markup, &mut tracker)?;

        let materialized = self
            .materialize(&timetable.slots, today)
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(ImportStage::Materialized);

        let MaterializedSemester { semester, events } = materialized;
        let batch = ImportBatch {
            events,
            category: self.config.category.clone(),
        };
        let created_count = store
            .replace_imported(batch)
            .map_err(|e| tracker.fail(ImportError::Store(Box::new(e))))?;
        tracker.advance(ImportStage::Done);

        tracing::info!(
            path = %path.display(),
            created = created_count,
            discarded = timetable.discarded,
            semester = %semester.label,
            "imported timetable"
        );

        Ok(ImportSummary {
            created_count,
            semester_label: semester.label,
            semester_start_date: semester.first_monday,
        })
    }

    /// 形式を判定してマークアップへ変換する
    fn convert(&self, path: &Path, tracker: &mut StageTracker) -> Result<String> {
        tracker.advance(ImportStage::Converting);
        let format = SupportedFormat::from_path(path).map_err(|e| tracker.fail(e))?;
        let converter = converter_for(format, &self.config.security);
        let document = converter.convert(path).map_err(|e| tracker.fail(e))?;
        Ok(document.markup)
    }

    /// マークアップから時間割を抽出する（表の特定 → グリッド → 授業コマ）
    fn extract(&self, markup: &str, tracker: &mut StageTracker) -> Result<Timetable> {
        let table = locate_first_table(markup).ok_or_else(|| tracker.fail(ImportError::NoTableFound))?;
        tracker.advance(ImportStage::TableLocated);

        let grid = TimetableGrid::from_table(table, self.config.security.max_span);
        tracing::debug!(
            rows = grid.get_rows(),
            cols = grid.get_cols(),
            "rebuilt timetable grid"
        );
        tracker.advance(ImportStage::GridBuilt);

        let axes = AxisMap::interpret(&grid);
        let timetable = assemble(&grid, &axes);
        if timetable.slots.is_empty() {
            return Err(tracker.fail(ImportError::EmptySchedule));
        }
        tracker.advance(ImportStage::SlotsAssembled);

        Ok(timetable)
    }
}
