//! Calendar Store Module
//!
//! 展開済みイベントを受け取るカレンダーストアとの境界を定義するモジュール。
//!
//! ストアへの受け渡しは取り込み1回につき1回だけ、抽出・展開がすべて成功した後に行われます。
//! ストアは受け取ったバッチで「取り込み済み」カテゴリの内容を置き換えます。

use std::collections::BTreeMap;
use std::convert::Infallible;

use crate::types::{CalendarEvent, ImportBatch, ImportCategory};

/// カレンダーストア
///
/// # 契約
///
/// `replace_imported()`は次の処理を行います。
///
/// 1. 取り込み先カテゴリを探し、なければ作成する（ラベルと色は毎回バッチの値に正規化）
/// 2. そのカテゴリに属する既存のイベントをすべて削除する
/// 3. バッチのイベントを挿入し、永続化する
///
/// 戻り値は挿入したイベント数です。
pub trait CalendarStore {
    /// ストア固有のエラー
    type Error: std::error::Error + Send + Sync + 'static;

    /// 取り込み済みカテゴリの内容をバッチで置き換える
    fn replace_imported(&mut self, batch: ImportBatch) -> Result<usize, Self::Error>;
}

/// メモリ上のカレンダーストア
///
/// 永続化を必要としない組み込み先やテストで使用します。
#[derive(Debug, Clone, Default)]
pub struct MemoryCalendarStore {
    categories: BTreeMap<String, ImportCategory>,
    events: Vec<CalendarEvent>,
    batches_received: usize,
}

impl MemoryCalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保持しているすべてのイベント
    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    /// 指定カテゴリに属するイベント
    pub fn events_in(&self, category_id: &str) -> impl Iterator<Item = &CalendarEvent> {
        let category_id = category_id.to_string();
        self.events
            .iter()
            .filter(move |event| event.category_id == category_id)
    }

    pub fn category(&self, id: &str) -> Option<&ImportCategory> {
        self.categories.get(id)
    }

    /// 既存のイベントを追加する（取り込み以外で作成されたイベントの再現用）
    pub fn insert_event(&mut self, event: CalendarEvent) {
        self.events.push(event);
    }

    /// `replace_imported()`が呼び出された回数
    pub fn batches_received(&self) -> usize {
        self.batches_received
    }
}

impl CalendarStore for MemoryCalendarStore {
    type Error = Infallible;

    fn replace_imported(&mut self, batch: ImportBatch) -> Result<usize, Self::Error> {
        self.batches_received += 1;

        let ImportBatch { events, category } = batch;
        let category_id = category.id.clone();

        // find-or-create（ラベルと色は常に正規化）
        self.categories.insert(category_id.clone(), category);

        self.events.retain(|event| event.category_id != category_id);
        let created = events.len();
        self.events.extend(events);

        tracing::debug!(category = %category_id, created, "replaced imported events");
        Ok(created)
    }
}
