//! Semester Module
//!
//! 毎週の授業コマを、検出した学期の18週分の日付付きカレンダーイベントへ展開するモジュール。
//!
//! 1. 起点日の判定（現在日付と`SemesterPolicy`から春学期/秋学期を決定）
//! 2. 月曜日への位置合わせ（起点日を含む週の月曜日を第1週の月曜日とする）
//! 3. 展開（週 × コマごとに、週範囲内であればイベントを1件生成）

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::api::{Season, SemesterPolicy};
use crate::error::{ImportError, Result};
use crate::types::{
    CalendarEvent, ImportCategory, WeeklyCourseSlot, EVENT_TYPE_CALENDAR, SEMESTER_WEEKS,
};

/// 検出された学期
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub season: Season,

    /// 学期の年（1月の秋学期は前年）
    pub year: i32,

    /// 起点日（0時に正規化）
    pub anchor: NaiveDateTime,

    /// 第1週の月曜日
    pub first_monday: NaiveDate,

    /// 表示用ラベル（例: "2026年春季学期"）
    pub label: String,
}

impl Semester {
    /// 現在日付から学期を判定する
    ///
    /// # 引数
    ///
    /// * `today` - 現在日付
    /// * `policy` - 学期判定のルール（検証済みであること）
    ///
    /// # 戻り値
    ///
    /// * `Ok(Semester)` - 判定に成功した場合
    /// * `Err(ImportError::Config)` - 起点日がその年に存在しない場合
    pub fn detect(today: NaiveDate, policy: &SemesterPolicy) -> Result<Self> {
        let month = today.month();

        let (season, year, (anchor_month, anchor_day)) = if policy.is_spring_month(month) {
            (Season::Spring, today.year(), policy.spring_anchor)
        } else if month < policy.spring_months.0 {
            (Season::Autumn, today.year() - 1, policy.autumn_anchor)
        } else {
            (Season::Autumn, today.year(), policy.autumn_anchor)
        };

        let anchor = NaiveDate::from_ymd_opt(year, anchor_month, anchor_day).ok_or_else(|| {
            ImportError::Config(format!(
                "Semester anchor {}-{}-{} does not exist",
                year, anchor_month, anchor_day
            ))
        })?;

        let first_monday = align_to_monday(anchor)?;

        Ok(Self {
            season,
            year,
            anchor: anchor.and_time(NaiveTime::MIN),
            first_monday,
            label: format!("{}年{}", year, season.display_name()),
        })
    }

    /// 第`week_index`週（0始まり）の`day_of_week`曜日（月曜=1）の日付
    pub fn date_of(&self, week_index: u32, day_of_week: u32) -> Option<NaiveDate> {
        if !(1..=7).contains(&day_of_week) {
            return None;
        }
        let offset = u64::from(week_index) * 7 + u64::from(day_of_week - 1);
        self.first_monday.checked_add_days(Days::new(offset))
    }
}

/// 起点日を含む週の月曜日を求める（日曜日は直前の月曜日から6日後として扱う）
pub(crate) fn align_to_monday(anchor: NaiveDate) -> Result<NaiveDate> {
    let offset = u64::from(anchor.weekday().num_days_from_monday());
    anchor
        .checked_sub_days(Days::new(offset))
        .ok_or_else(|| ImportError::Config(format!("Cannot align {} to Monday", anchor)))
}

/// 授業コマを学期全体のカレンダーイベントへ展開する
///
/// 週（0..18）を外側、コマを内側のループとし、`week + 1`が授業の週範囲に
/// 含まれる場合のみイベントを生成します。生成件数は、各コマについて
/// `[1, 18] ∩ [start_week, end_week]`の週数の合計になります。
pub fn materialize(
    slots: &[WeeklyCourseSlot],
    semester: &Semester,
    category: &ImportCategory,
) -> Vec<CalendarEvent> {
    let mut events = Vec::new();

    for week_index in 0..SEMESTER_WEEKS {
        for slot in slots {
            if !slot.descriptor.is_active_in_week(week_index + 1) {
                continue;
            }

            let Some(date) = semester.date_of(week_index, slot.day_of_week) else {
                tracing::debug!(
                    day_of_week = slot.day_of_week,
                    course = %slot.descriptor.course_name,
                    "skipping slot with out-of-range weekday"
                );
                continue;
            };

            events.push(CalendarEvent {
                id: Uuid::new_v4().to_string(),
                title: event_title(slot),
                start: date.and_time(slot.start.start),
                end: date.and_time(slot.end.end),
                description: event_description(slot),
                category_id: category.id.clone(),
                category_color: category.color.clone(),
                all_day: false,
                event_type: EVENT_TYPE_CALENDAR,
            });
        }
    }

    events
}

/// 授業名も授業区分もないセルのタイトル
const FALLBACK_TITLE: &str = "课程";

/// イベントのタイトル（授業名 → 授業区分 → "课程"の順にフォールバック）
fn event_title(slot: &WeeklyCourseSlot) -> String {
    let descriptor = &slot.descriptor;
    if !descriptor.course_name.is_empty() {
        descriptor.course_name.clone()
    } else if !descriptor.course_category.is_empty() {
        descriptor.course_category.clone()
    } else {
        FALLBACK_TITLE.to_string()
    }
}

fn event_description(slot: &WeeklyCourseSlot) -> String {
    let descriptor = &slot.descriptor;
    let mut lines = Vec::new();

    if !descriptor.teacher.is_empty() {
        lines.push(format!("教师：{}", descriptor.teacher));
    }
    if !descriptor.classroom.is_empty() {
        lines.push(format!("教室：{}", descriptor.classroom));
    }
    if !descriptor.course_category.is_empty() {
        lines.push(format!("类别：{}", descriptor.course_category));
    }
    lines.push(format!(
        "周次：第{}-{}周",
        descriptor.start_week, descriptor.end_week
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CourseDescriptor, TimeRange};
    use chrono::Weekday;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(day_of_week: u32, start_week: u32, end_week: u32) -> WeeklyCourseSlot {
        let range = TimeRange::new(hm(8, 0), hm(9, 40));
        WeeklyCourseSlot {
            descriptor: CourseDescriptor {
                start_week,
                end_week,
                ..CourseDescriptor::named("数据结构")
            },
            day_of_week,
            start: range,
            end: range,
        }
    }

    #[test]
    fn test_detect_spring_semester() {
        let semester = Semester::detect(date(2026, 4, 15), &SemesterPolicy::default()).unwrap();
        assert_eq!(semester.season, Season::Spring);
        assert_eq!(semester.year, 2026);
        assert_eq!(semester.anchor, date(2026, 3, 1).and_time(NaiveTime::MIN));
        assert_eq!(semester.label, "2026年春季学期");
    }

    #[test]
    fn test_detect_autumn_semester() {
        let semester = Semester::detect(date(2026, 10, 18), &SemesterPolicy::default()).unwrap();
        assert_eq!(semester.season, Season::Autumn);
        assert_eq!(semester.anchor.date(), date(2026, 9, 8));
        assert_eq!(semester.first_monday, date(2026, 9, 7));
        assert_eq!(semester.label, "2026年秋季学期");
    }

    #[test]
    fn test_january_rolls_back_to_previous_autumn() {
        let semester = Semester::detect(date(2027, 1, 10), &SemesterPolicy::default()).unwrap();
        assert_eq!(semester.season, Season::Autumn);
        assert_eq!(semester.year, 2026);
        assert_eq!(semester.anchor.date(), date(2026, 9, 8));
    }

    #[test]
    fn test_boundary_months() {
        let policy = SemesterPolicy::default();
        assert_eq!(Semester::detect(date(2026, 2, 1), &policy).unwrap().season, Season::Spring);
        assert_eq!(Semester::detect(date(2026, 7, 31), &policy).unwrap().season, Season::Spring);
        assert_eq!(Semester::detect(date(2026, 8, 1), &policy).unwrap().season, Season::Autumn);
        assert_eq!(Semester::detect(date(2026, 12, 31), &policy).unwrap().year, 2026);
    }

    #[test]
    fn test_custom_policy() {
        let policy = SemesterPolicy {
            spring_months: (3, 8),
            spring_anchor: (2, 20),
            autumn_anchor: (9, 1),
        };
        let february = Semester::detect(date(2026, 2, 10), &policy).unwrap();
        assert_eq!(february.season, Season::Autumn);
        assert_eq!(february.year, 2025);

        let march = Semester::detect(date(2026, 3, 10), &policy).unwrap();
        assert_eq!(march.anchor.date(), date(2026, 2, 20));
    }

    #[test]
    fn test_wednesday_anchor_aligns_two_days_earlier() {
        let anchor = date(2023, 3, 1);
        assert_eq!(anchor.weekday(), Weekday::Wed);
        assert_eq!(align_to_monday(anchor).unwrap(), date(2023, 2, 27));
    }

    #[test]
    fn test_sunday_anchor_aligns_six_days_earlier() {
        let anchor = date(2026, 3, 1);
        assert_eq!(anchor.weekday(), Weekday::Sun);
        assert_eq!(align_to_monday(anchor).unwrap(), date(2026, 2, 23));
    }

    #[test]
    fn test_week_zero_monday_lands_on_first_monday() {
        let semester = Semester::detect(date(2023, 3, 15), &SemesterPolicy::default()).unwrap();
        let events = materialize(&[slot(1, 1, 1)], &semester, &ImportCategory::default());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date(), semester.first_monday);
        assert_eq!(events[0].date().weekday(), Weekday::Mon);
        assert_eq!(events[0].start, date(2023, 2, 27).and_time(hm(8, 0)));
        assert_eq!(events[0].end, date(2023, 2, 27).and_time(hm(9, 40)));
    }

    #[test]
    fn test_week_range_filtering() {
        let semester = Semester::detect(date(2026, 4, 1), &SemesterPolicy::default()).unwrap();
        let events = materialize(&[slot(3, 3, 5)], &semester, &ImportCategory::default());

        assert_eq!(events.len(), 3);
        let expected: Vec<NaiveDate> = (2..5)
            .map(|w| semester.date_of(w, 3).unwrap())
            .collect();
        let actual: Vec<NaiveDate> = events.iter().map(|e| e.date()).collect();
        assert_eq!(actual, expected);
        assert!(actual.iter().all(|d| d.weekday() == Weekday::Wed));
    }

    #[test]
    fn test_events_carry_category_and_unique_ids() {
        let semester = Semester::detect(date(2026, 4, 1), &SemesterPolicy::default()).unwrap();
        let category = ImportCategory::default();
        let events = materialize(&[slot(1, 1, 18), slot(5, 1, 18)], &semester, &category);

        assert_eq!(events.len(), 36);
        let ids: HashSet<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 36);
        assert!(events.iter().all(|e| e.category_id == category.id
            && e.category_color == category.color
            && !e.all_day
            && e.event_type == "calendar"));
    }

    #[test]
    fn test_event_title_and_description() {
        let semester = Semester::detect(date(2026, 4, 1), &SemesterPolicy::default()).unwrap();
        let mut untitled = slot(2, 1, 2);
        untitled.descriptor.course_name.clear();
        untitled.descriptor.course_category = "实验".to_string();
        untitled.descriptor.classroom = "B204".to_string();

        let events = materialize(&[untitled], &semester, &ImportCategory::default());
        assert_eq!(events[0].title, "实验");
        assert!(events[0].description.contains("教室：B204"));
        assert!(events[0].description.contains("周次：第1-2周"));
        assert!(!events[0].description.contains("教师"));
    }

    #[test]
    fn test_event_title_falls_back_to_generic_label() {
        let semester = Semester::detect(date(2026, 4, 1), &SemesterPolicy::default()).unwrap();
        let mut blank = slot(2, 1, 1);
        blank.descriptor.course_name.clear();

        let events = materialize(&[blank], &semester, &ImportCategory::default());
        assert_eq!(events[0].title, "课程");
    }

    #[test]
    fn test_invalid_weekday_is_skipped() {
        let semester = Semester::detect(date(2026, 4, 1), &SemesterPolicy::default()).unwrap();
        assert!(materialize(&[slot(0, 1, 18), slot(8, 1, 18)], &semester, &ImportCategory::default()).is_empty());
    }

    #[test]
    fn test_events_are_week_major() {
        let semester = Semester::detect(date(2026, 4, 1), &SemesterPolicy::default()).unwrap();
        let events = materialize(&[slot(5, 1, 2), slot(1, 1, 2)], &semester, &ImportCategory::default());
        let days: Vec<u32> = events.iter().map(|e| e.date().weekday().number_from_monday()).collect();
        assert_eq!(days, vec![5, 1, 5, 1]);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_event_count_matches_week_range(
                start in 1u32..=18,
                len in 0u32..18,
                day in 1u32..=7,
                month in 1u32..=12,
            ) {
                let end = (start + len).min(18);
                let semester = Semester::detect(date(2026, month, 15), &SemesterPolicy::default()).unwrap();
                let events = materialize(&[slot(day, start, end)], &semester, &ImportCategory::default());

                prop_assert_eq!(events.len() as u32, end - start + 1);
                for event in &events {
                    let days_from_first = (event.date() - semester.first_monday).num_days();
                    let week = days_from_first / 7 + 1;
                    prop_assert!(week >= i64::from(start) && week <= i64::from(end));
                    prop_assert_eq!(event.date().weekday().number_from_monday(), day);
                }
            }
        }
    }
}
