//! Integration Tests for coursegrid
//!
//! End-to-end tests of the import pipeline for each supported document format:
//! conversion, table reconstruction, cell parsing, semester materialization and
//! the hand-off to the calendar store.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use coursegrid::{
    assemble, AxisMap, CalendarStore, ImportBatch, ImportError, ImporterBuilder,
    MemoryCalendarStore, SemesterPolicy, TimetableGrid,
};
use rust_xlsxwriter::*;
use std::fmt;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

// Helper module for generating test fixtures
mod fixtures {
    use super::*;

    /// A two-period timetable where 高等数学 spans both periods on Monday
    pub const HTML_TIMETABLE: &str = r#"<!DOCTYPE html>
<html><body>
<h1>2026 秋季课表</h1>
<table border="1">
  <tr><th>节次</th><th>时间</th><th>星期一</th><th>星期二</th><th>星期三</th></tr>
  <tr>
    <td>1</td><td>08:00-08:45</td>
    <td rowspan="2">(必修)高等数学/李老师/1-16周/东区-教学楼-(A101)</td>
    <td></td>
    <td>大学英语/陈老师/3-5周/北校区-外语楼-305</td>
  </tr>
  <tr>
    <td>2</td><td>08:55-09:40</td>
    <td>体育</td>
    <td></td>
  </tr>
</table>
</body></html>"#;

    pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Generate a workbook whose course cell is a vertically merged region
    pub fn generate_merged_timetable() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        // Header row
        for (col, header) in ["节次", "时间", "星期一", "星期二"].iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }

        // Time axis
        worksheet.write_string(1, 0, "1")?;
        worksheet.write_string(1, 1, "08:00-08:45")?;
        worksheet.write_string(2, 0, "2")?;
        worksheet.write_string(2, 1, "08:55-09:40")?;

        // Monday periods 1-2 (B2:B3 in course columns)
        worksheet.merge_range(1, 2, 2, 2, "数据结构/王老师/2-9周/南校区-计算机楼-204", &Format::new())?;
        worksheet.write_string(2, 3, "线性代数/赵老师/B105")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Build a minimal DOCX container around a WordprocessingML body
    pub fn generate_docx(body: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let mut zip_data = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

            zip.start_file("[Content_Types].xml", options).unwrap();
            zip.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
                .unwrap();

            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document.as_bytes()).unwrap();

            zip.finish().unwrap();
        }
        zip_data
    }

    pub fn docx_cell(props: &str, lines: &[&str]) -> String {
        let paragraphs: String = lines
            .iter()
            .map(|line| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", line))
            .collect();
        format!("<w:tc><w:tcPr>{}</w:tcPr>{}</w:tc>", props, paragraphs)
    }

    pub fn docx_row(cells: &[String]) -> String {
        format!("<w:tr>{}</w:tr>", cells.concat())
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn test_html_import_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_file(dir.path(), "课表.html", fixtures::HTML_TIMETABLE.as_bytes());

    let importer = ImporterBuilder::new().build().unwrap();
    let mut store = MemoryCalendarStore::new();
    let summary = importer
        .import_file(&path, date(2026, 10, 18), &mut store)
        .unwrap();

    // 高等数学 16 + 大学英语 3 + 体育 18
    assert_eq!(summary.created_count, 16 + 3 + 18);
    assert_eq!(summary.semester_label, "2026年秋季学期");
    assert_eq!(summary.semester_start_date, date(2026, 9, 7));
    assert_eq!(store.batches_received(), 1);

    let math: Vec<_> = store
        .events()
        .iter()
        .filter(|e| e.title == "高等数学")
        .collect();
    assert_eq!(math.len(), 16);
    // 2026-09-08 is a Tuesday, so week 1 starts on Monday 2026-09-07
    assert_eq!(math[0].start, date(2026, 9, 7).and_time(hm(8, 0)));
    assert_eq!(math[0].end, date(2026, 9, 7).and_time(hm(9, 40)));
    assert!(math[0].description.contains("教师：李老师"));
    assert!(math[0].description.contains("教室：A101"));
    assert!(math[0].description.contains("必修"));

    let english: Vec<NaiveDate> = store
        .events()
        .iter()
        .filter(|e| e.title == "大学英语")
        .map(|e| e.date())
        .collect();
    assert_eq!(
        english,
        vec![date(2026, 9, 23), date(2026, 9, 30), date(2026, 10, 7)]
    );
}

#[test]
fn test_html_parse_keeps_row_major_order() {
    let importer = ImporterBuilder::new().build().unwrap();
    let timetable = importer.parse_markup(fixtures::HTML_TIMETABLE).unwrap();

    let names: Vec<_> = timetable
        .slots
        .iter()
        .map(|s| s.descriptor.course_name.as_str())
        .collect();
    assert_eq!(names, vec!["高等数学", "大学英语", "体育"]);
    assert_eq!(timetable.slots[2].day_of_week, 2);
    assert_eq!(timetable.discarded, 0);
}

#[test]
fn test_xlsx_merged_region_becomes_rowspan() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = fixtures::generate_merged_timetable().unwrap();
    let path = fixtures::write_file(dir.path(), "schedule.xlsx", &bytes);

    let importer = ImporterBuilder::new().build().unwrap();
    let timetable = importer.parse_file(&path).unwrap();

    assert_eq!(timetable.slots.len(), 2);

    let structures = &timetable.slots[0];
    assert_eq!(structures.descriptor.course_name, "数据结构");
    assert_eq!(structures.descriptor.classroom, "204");
    assert_eq!((structures.descriptor.start_week, structures.descriptor.end_week), (2, 9));
    assert_eq!(structures.day_of_week, 1);
    assert_eq!(structures.start.start, hm(8, 0));
    assert_eq!(structures.end.end, hm(9, 40));

    let algebra = &timetable.slots[1];
    assert_eq!(algebra.descriptor.course_name, "线性代数");
    assert_eq!(algebra.day_of_week, 2);
    assert_eq!(algebra.start.start, hm(8, 55));
}

#[test]
fn test_docx_vmerge_and_grid_span() {
    use fixtures::{docx_cell, docx_row};

    let table = format!(
        "<w:tbl>{}{}{}</w:tbl>",
        docx_row(&[
            docx_cell("", &["节次"]),
            docx_cell("", &["时间"]),
            docx_cell("", &["星期四"]),
            docx_cell("", &["星期五"]),
        ]),
        docx_row(&[
            docx_cell("", &["1"]),
            docx_cell("", &["10:00-10:45"]),
            docx_cell(r#"<w:vMerge w:val="restart"/>"#, &["操作系统", "/刘老师/", "西区-实验楼-(B302)"]),
            docx_cell("", &["形势与政策"]),
        ]),
        docx_row(&[
            // 节次と時間は1つのセルにまとめられている
            docx_cell(r#"<w:gridSpan w:val="2"/>"#, &["2 10:55-11:40"]),
            docx_cell("<w:vMerge/>", &[]),
            docx_cell("", &[]),
        ]),
    );
    let body = format!(
        "<w:p><w:r><w:t>课程表</w:t></w:r></w:p>{}<w:p><w:r><w:t>备注</w:t></w:r></w:p>",
        table
    );

    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_file(dir.path(), "schedule.docx", &fixtures::generate_docx(&body));

    let importer = ImporterBuilder::new().build().unwrap();
    let timetable = importer.parse_file(&path).unwrap();

    assert_eq!(timetable.slots.len(), 2);
    let os = &timetable.slots[0];
    assert_eq!(os.descriptor.course_name, "操作系统");
    assert_eq!(os.descriptor.teacher, "刘老师");
    assert_eq!(os.descriptor.classroom, "B302");
    assert_eq!(os.day_of_week, 4);
    assert_eq!(os.start.start, hm(10, 0));
    assert_eq!(os.end.end, hm(11, 40));

    assert_eq!(timetable.slots[1].descriptor.course_name, "形势与政策");
    assert_eq!(timetable.slots[1].day_of_week, 5);
}

#[test]
fn test_unresolvable_weekday_column_is_discarded_while_others_materialize() {
    let markup = "<table>\
        <tr><td>节次</td><td>时间</td><td>星期一</td><td>备注</td><td>星期三</td></tr>\
        <tr><td>1</td><td>08:00-09:40</td><td>物理</td><td>自带计算器</td><td>化学</td></tr>\
        </table>";

    let importer = ImporterBuilder::new().build().unwrap();
    let timetable = importer.parse_markup(markup).unwrap();
    assert_eq!(timetable.slots.len(), 2);
    assert_eq!(timetable.discarded, 1);

    let materialized = importer
        .materialize(&timetable.slots, date(2026, 3, 15))
        .unwrap();
    assert_eq!(materialized.events.len(), 2 * 18);
    assert!(materialized.events.iter().all(|e| e.title != "自带计算器"));
    assert!(materialized
        .events
        .iter()
        .all(|e| matches!(e.date().weekday(), Weekday::Mon | Weekday::Wed)));
}

#[test]
fn test_only_first_table_is_used() {
    let markup = "<table>\
        <tr><td>节次</td><td>时间</td><td>星期一</td></tr>\
        <tr><td>1</td><td>08:00-09:40</td><td>第一张表</td></tr>\
        </table>\
        <table>\
        <tr><td>节次</td><td>时间</td><td>星期二</td></tr>\
        <tr><td>1</td><td>08:00-09:40</td><td>第二张表</td></tr>\
        </table>";

    let importer = ImporterBuilder::new().build().unwrap();
    let timetable = importer.parse_markup(markup).unwrap();
    assert_eq!(timetable.slots.len(), 1);
    assert_eq!(timetable.slots[0].descriptor.course_name, "第一张表");
}

#[test]
fn test_custom_semester_policy_moves_anchor() {
    let importer = ImporterBuilder::new()
        .with_semester_policy(SemesterPolicy {
            spring_months: (2, 7),
            spring_anchor: (2, 23),
            autumn_anchor: (9, 1),
        })
        .build()
        .unwrap();
    let timetable = importer.parse_markup(fixtures::HTML_TIMETABLE).unwrap();
    let materialized = importer
        .materialize(&timetable.slots, date(2026, 3, 10))
        .unwrap();

    assert_eq!(materialized.semester.anchor.date(), date(2026, 2, 23));
    assert_eq!(materialized.semester.first_monday, date(2026, 2, 23));
    assert_eq!(materialized.events[0].date(), date(2026, 2, 23));
}

#[test]
fn test_parse_outcome_success_serializes_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_file(dir.path(), "t.htm", fixtures::HTML_TIMETABLE.as_bytes());

    let importer = ImporterBuilder::new().build().unwrap();
    let outcome = importer.parse_outcome(&path);
    assert!(outcome.success);
    assert!(outcome.message.is_none());
    let slots = outcome.schedule.as_ref().unwrap();
    assert_eq!(slots[0].descriptor.course_name, "高等数学");

    let json = outcome.to_json().unwrap();
    assert!(json.contains("\"success\":true"));
    assert!(json.contains("\"schedule\":["));
    assert!(!json.contains("\"discarded\""));
    assert!(json.contains("\"courseName\":\"高等数学\""));
    assert!(json.contains("\"dayOfWeek\":1"));
    assert!(json.contains("\"start\":\"08:00\""));
    assert!(!json.contains("\"message\""));
}

#[derive(Debug)]
struct StoreUnavailable;

impl fmt::Display for StoreUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("calendar database is locked")
    }
}

impl std::error::Error for StoreUnavailable {}

#[derive(Default)]
struct FailingStore {
    calls: usize,
}

impl CalendarStore for FailingStore {
    type Error = StoreUnavailable;

    fn replace_imported(&mut self, _batch: ImportBatch) -> Result<usize, Self::Error> {
        self.calls += 1;
        Err(StoreUnavailable)
    }
}

#[test]
fn test_store_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_file(dir.path(), "schedule.html", fixtures::HTML_TIMETABLE.as_bytes());

    let importer = ImporterBuilder::new().build().unwrap();
    let mut store = FailingStore::default();
    let result = importer.import_file(&path, date(2026, 10, 18), &mut store);

    assert_eq!(store.calls, 1);
    match result {
        Err(ImportError::Store(e)) => assert!(e.to_string().contains("locked")),
        other => panic!("Expected Store error, got {:?}", other),
    }
}

#[test]
fn test_reimport_replaces_previous_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_file(dir.path(), "schedule.html", fixtures::HTML_TIMETABLE.as_bytes());

    let importer = ImporterBuilder::new().build().unwrap();
    let mut store = MemoryCalendarStore::new();
    importer
        .import_file(&path, date(2026, 10, 18), &mut store)
        .unwrap();
    let summary = importer
        .import_file(&path, date(2026, 10, 18), &mut store)
        .unwrap();

    assert_eq!(store.batches_received(), 2);
    assert_eq!(store.events().len(), summary.created_count);
}

#[test]
fn test_stage_functions_are_usable_without_importer() {
    let grid = TimetableGrid::from_markup(fixtures::HTML_TIMETABLE, 64).unwrap();
    assert_eq!(grid.get_rows(), 3);
    assert_eq!(grid.get_cols(), 5);

    let axes = AxisMap::interpret(&grid);
    assert_eq!(axes.weekday_of_column(2), Some(1));
    assert_eq!(axes.weekday_of_column(1), None);

    let timetable = assemble(&grid, &axes);
    let names: Vec<&str> = timetable
        .slots
        .iter()
        .map(|slot| slot.descriptor.course_name.as_str())
        .collect();
    assert_eq!(names, vec!["高等数学", "大学英语", "体育"]);
}
