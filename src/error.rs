//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// coursegridクレート全体で使用するエラー型
///
/// ドキュメント変換、時間割の抽出、学期展開、カレンダーストアへの受け渡しの
/// いずれかで発生するハードエラーを表します。
///
/// セルの軸（曜日・時間）が解決できない場合の破棄はエラーではなく、
/// このエラー型には現れません（`Timetable::discarded`で件数のみ確認できます）。
///
/// # エラーの種類
///
/// - 変換系: `Io`, `Zip`, `Xml`, `Spreadsheet`, `Conversion`, `UnsupportedFormat`,
///   `SecurityViolation`
/// - 抽出系: `NoTableFound`, `EmptySchedule`
/// - その他: `Config`, `Store`
///
/// # 使用例
///
/// ```rust,no_run
/// use coursegrid::{ImportError, ImporterBuilder};
/// use std::path::Path;
///
/// # fn main() -> Result<(), ImportError> {
/// let importer = ImporterBuilder::new().build()?;
/// match importer.parse_file(Path::new("schedule.docx")) {
///     Err(ImportError::NoTableFound) => println!("表が見つかりません"),
///     Err(e) if e.is_conversion_error() => println!("変換失敗: {}", e),
///     Err(e) => return Err(e),
///     Ok(timetable) => println!("{} slots", timetable.slots.len()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ImportError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIPコンテナ（DOCX）の解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XMLの解析エラー
    #[error("XML error: {0}")]
    Xml(String),

    /// スプレッドシートの解析中に発生したエラー（calamine由来）
    #[error("Failed to parse spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// 外部コンバーターが失敗した場合のエラー
    ///
    /// メッセージはそのまま呼び出し元へ表示されます。
    #[error("Document conversion failed: {0}")]
    Conversion(String),

    /// サポートされていないファイル形式
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// 変換後のマークアップに表が見つからない
    #[error("No table found in the converted document")]
    NoTableFound,

    /// 表は見つかったが、有効な授業が1件も抽出できなかった
    #[error("The timetable contains no recognizable courses")]
    EmptySchedule,

    /// 設定の検証に失敗したエラー
    ///
    /// `ImporterBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// カレンダーストアへの受け渡しに失敗したエラー
    #[error("Calendar store error: {0}")]
    Store(Box<dyn std::error::Error + Send + Sync>),
}

impl ImportError {
    /// 変換ステージ（抽出前）で発生したエラーかどうか
    pub fn is_conversion_error(&self) -> bool {
        matches!(
            self,
            ImportError::Io(_)
                | ImportError::Zip(_)
                | ImportError::Xml(_)
                | ImportError::Spreadsheet(_)
                | ImportError::Conversion(_)
                | ImportError::UnsupportedFormat(_)
                | ImportError::SecurityViolation(_)
        )
    }
}

impl From<zip::result::ZipError> for ImportError {
    fn from(err: zip::result::ZipError) -> Self {
        ImportError::Zip(err.to_string())
    }
}

impl From<quick_xml::Error> for ImportError {
    fn from(err: quick_xml::Error) -> Self {
        ImportError::Xml(err.to_string())
    }
}

/// クレート共通のResult型
pub type Result<T> = std::result::Result<T, ImportError>;
