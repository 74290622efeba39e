//! Cell Content Module
//!
//! 1セル分の自由記述テキストを`CourseDescriptor`に変換するモジュール。
//!
//! 抽出は順序付きの独立した抽出器の連鎖として表現され、各抽出器は
//! `Extraction::Matched(値)`または`Extraction::NoMatch`を返します。
//! どの抽出器が一致しなくても解析全体は失敗せず、既定値へ段階的にフォールバックします。
//!
//! 1. 週範囲（`1-16周`など） → 一致した部分を作業用コピーから除去
//! 2. 授業区分（元のテキスト中の最初の括弧書き）
//! 3. 構造化フィールド（`授業名/教員/キャンパス-建物-教室`）

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{CourseDescriptor, SEMESTER_WEEKS};

static WEEK_RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第?\s*(\d{1,3})\s*[-~～–—]\s*(\d{1,3})\s*(?:每周|周)").unwrap()
});

static CATEGORY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(（]\s*([^()（）]*?)\s*[)）]").unwrap());

static EMPTY_PARENS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(（]\s*[)）]").unwrap());

static REPEATED_SLASH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*/(?:\s*/)+\s*").unwrap());

static STRUCTURED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<name>[^/]+)/(?P<teacher>[^/]*)/(?:[^/]*-)?\s*[(（]?(?P<room>[^/()（）\-]+?)[)）]?\s*$",
    )
    .unwrap()
});

/// 抽出器の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    /// パターンに一致し、値を取り出せた
    Matched(T),
    /// パターンに一致しなかった
    NoMatch,
}

impl<T> Extraction<T> {
    /// 一致した場合は値を、しなかった場合は`default`を返す
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Extraction::Matched(value) => value,
            Extraction::NoMatch => default,
        }
    }

    /// `Option`に変換
    pub fn ok(self) -> Option<T> {
        match self {
            Extraction::Matched(value) => Some(value),
            Extraction::NoMatch => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Extraction::Matched(_))
    }
}

/// 週範囲の抽出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekRange {
    pub start_week: u32,
    pub end_week: u32,
    /// 一致部分を取り除いたテキスト
    pub remainder: String,
}

/// 構造化フィールドの抽出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredFields {
    pub course_name: String,
    pub teacher: String,
    pub classroom: String,
}

/// 週範囲（`<開始>-<終了>周`）を抽出する
///
/// 値は`1..=18`に切り詰められ、切り詰め後に範囲が空になる場合は不一致として扱います。
pub fn extract_week_range(text: &str) -> Extraction<WeekRange> {
    let Some(caps) = WEEK_RANGE_PATTERN.captures(text) else {
        return Extraction::NoMatch;
    };

    let (Some(whole), Some(start), Some(end)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return Extraction::NoMatch;
    };
    let (Ok(start), Ok(end)) = (start.as_str().parse::<u32>(), end.as_str().parse::<u32>()) else {
        return Extraction::NoMatch;
    };

    let start_week = start.max(1);
    let end_week = end.min(SEMESTER_WEEKS);
    if start_week > end_week {
        return Extraction::NoMatch;
    }

    let mut remainder = String::with_capacity(text.len());
    remainder.push_str(&text[..whole.start()]);
    remainder.push_str(&text[whole.end()..]);

    Extraction::Matched(WeekRange {
        start_week,
        end_week,
        remainder,
    })
}

/// 元のテキストから最初の括弧書き（授業区分）を抽出する
pub fn extract_category(original: &str) -> Extraction<String> {
    CATEGORY_PATTERN
        .captures_iter(original)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|s| !s.is_empty())
        .map(|s| Extraction::Matched(s.to_string()))
        .unwrap_or(Extraction::NoMatch)
}

const OPENING_BRACKETS: [char; 4] = ['(', '（', '[', '【'];
const CLOSING_BRACKETS: [char; 4] = [')', '）', ']', '】'];

/// 先頭の`…)`区切り（最初の閉じ括弧まで）を除去する
///
/// 括弧で始まるテキストは、区切り内に`/`があっても閉じ括弧まで除去します
/// （`(2025/2026学年)高等数学/…`）。それ以外は閉じ括弧が最初の`/`より前にあり、
/// 除去後も授業名が残る場合だけ除去するため、`高等数学(上)/…`の`(上)`は残ります。
fn strip_leading_prefix(text: &str) -> &str {
    let trimmed = text.trim_start();
    let Some((close, bracket)) = trimmed
        .char_indices()
        .find(|(_, c)| CLOSING_BRACKETS.contains(c))
    else {
        return trimmed;
    };
    let rest = &trimmed[close + bracket.len_utf8()..];

    if trimmed.starts_with(OPENING_BRACKETS) {
        return rest;
    }

    let before_slash = trimmed.find('/').map_or(true, |slash| close < slash);
    let name_remains = rest
        .split('/')
        .next()
        .is_some_and(|name| !name.trim().is_empty());
    if before_slash && name_remains {
        rest
    } else {
        trimmed
    }
}

/// 先頭の`…)`区切りを除去し、週範囲除去で残った空の区切りを整理する
fn clean_working_copy(working: &str) -> String {
    let without_prefix = strip_leading_prefix(working);
    let without_empty_parens = EMPTY_PARENS_PATTERN.replace_all(without_prefix, "");
    let collapsed = REPEATED_SLASH_PATTERN.replace_all(&without_empty_parens, "/");
    collapsed
        .trim_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

/// `授業名/教員/…-…-教室`形式のフィールドを抽出する
pub fn extract_structured_fields(cleaned: &str) -> Extraction<StructuredFields> {
    let Some(caps) = STRUCTURED_PATTERN.captures(cleaned) else {
        return Extraction::NoMatch;
    };

    let field = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    let course_name = field("name");
    if course_name.is_empty() {
        return Extraction::NoMatch;
    }

    Extraction::Matched(StructuredFields {
        course_name,
        teacher: field("teacher"),
        classroom: field("room"),
    })
}

/// セルのテキストを授業情報に変換する（失敗しない）
pub fn parse_cell(text: &str) -> CourseDescriptor {
    // 1. 週範囲
    let (start_week, end_week, working) = match extract_week_range(text) {
        Extraction::Matched(range) => (range.start_week, range.end_week, range.remainder),
        Extraction::NoMatch => (1, SEMESTER_WEEKS, text.to_string()),
    };

    // 2. 授業区分（除去前のテキストから）
    let category = extract_category(text);

    // 3. 構造化フィールド
    let cleaned = clean_working_copy(&working);
    match extract_structured_fields(&cleaned) {
        Extraction::Matched(fields) => CourseDescriptor {
            course_name: fields.course_name,
            teacher: fields.teacher,
            classroom: fields.classroom,
            course_category: category.unwrap_or(String::new()),
            start_week,
            end_week,
        },
        Extraction::NoMatch => {
            let course_name = if cleaned.is_empty() {
                text.trim().to_string()
            } else {
                cleaned
            };
            CourseDescriptor {
                course_name,
                teacher: String::new(),
                classroom: String::new(),
                course_category: String::new(),
                start_week,
                end_week,
            }
        }
    }
}
