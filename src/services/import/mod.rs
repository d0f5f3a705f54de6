//! Bulk spreadsheet import
//!
//! Pipeline: `workbook` reads the first sheet into `RawRow`s, `normalizer`
//! resolves header synonyms and validates each row, `batch` submits the
//! canonical records one at a time through a `RecordCreator`.

pub mod batch;
pub mod normalizer;
pub mod persist;
pub mod row;
pub mod template;
pub mod validator;
pub mod workbook;

pub use batch::{run_batch, BatchProgress, CreateError, CreatedRecord, ProgressSink, RecordCreator};
pub use normalizer::{normalize_feedback, normalize_report};
pub use persist::{PgFeedbackCreator, PgReportCreator};
pub use row::{CellValue, FieldSpec, RawRow};
pub use template::{template_for, SheetTemplate, TemplateError};
pub use validator::RowError;
pub use workbook::{read_upload, WorkbookError};
