//! coursegrid - Timetable extraction and semester materialization for uploaded course schedules
//!
//! This crate converts a human-authored, merged-cell course timetable (DOCX, XLSX or HTML)
//! into a normalized weekly timetable, then expands it into dated calendar events spanning
//! an 18-week academic semester.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chrono::Local;
//! use coursegrid::{ImporterBuilder, MemoryCalendarStore};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create an importer with default settings
//!     let importer = ImporterBuilder::new().build()?;
//!
//!     // Import a timetable document into a calendar store
//!     let mut store = MemoryCalendarStore::new();
//!     let today = Local::now().date_naive();
//!     let summary = importer.import_file(Path::new("schedule.docx"), today, &mut store)?;
//!
//!     println!("{} events for {}", summary.created_count, summary.semester_label);
//!     Ok(())
//! }
//! ```
//!
//! # Parse Only
//!
//! ```rust,no_run
//! use coursegrid::ImporterBuilder;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let importer = ImporterBuilder::new().build()?;
//!
//!     // Weekly slots without calendar dates
//!     let timetable = importer.parse_file(Path::new("schedule.xlsx"))?;
//!     for slot in &timetable.slots {
//!         println!(
//!             "{} day {} {}",
//!             slot.descriptor.course_name, slot.day_of_week, slot.start
//!         );
//!     }
//!
//!     // Cells whose weekday or time axis could not be resolved are dropped, not errors
//!     println!("discarded: {}", timetable.discarded);
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust
//! use coursegrid::{ImportCategory, ImporterBuilder, SecurityConfig, SemesterPolicy};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _importer = ImporterBuilder::new()
//!         .with_semester_policy(SemesterPolicy {
//!             spring_months: (2, 7),
//!             spring_anchor: (2, 23),
//!             autumn_anchor: (9, 1),
//!         })
//!         .with_category(ImportCategory {
//!             id: "school".to_string(),
//!             label: "学校课表".to_string(),
//!             color: "#2E7D32".to_string(),
//!         })
//!         .with_security_config(SecurityConfig {
//!             max_input_file_size: 16 * 1024 * 1024,
//!             ..SecurityConfig::default()
//!         })
//!         .build()?;
//!     Ok(())
//! }
//! ```

mod api;
mod axis;
mod builder;
mod cell;
mod convert;
mod error;
mod grid;
mod markup;
mod security;
mod semester;
mod store;
mod timetable;
mod types;

// 公開API
pub use api::{Season, SemesterPolicy, SupportedFormat};
pub use axis::AxisMap;
pub use builder::{ImportSummary, Importer, ImporterBuilder, MaterializedSemester, ParseOutcome};
pub use cell::{
    extract_category, extract_structured_fields, extract_week_range, parse_cell, Extraction,
    StructuredFields, WeekRange,
};
pub use convert::{
    converter_for, ConvertedDocument, DocumentConverter, DocxConverter, HtmlConverter,
    XlsxConverter,
};
pub use error::{ImportError, Result};
pub use grid::TimetableGrid;
pub use security::SecurityConfig;
pub use semester::Semester;
pub use store::{CalendarStore, MemoryCalendarStore};
pub use timetable::{assemble, Timetable};
pub use types::{
    CalendarEvent, CourseDescriptor, GridCell, ImportBatch, ImportCategory, TimeRange,
    WeeklyCourseSlot, EVENT_TYPE_CALENDAR, SEMESTER_WEEKS,
};
