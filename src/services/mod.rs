//! Business logic services

pub mod import;
pub mod import_processor;
pub mod job_history;
pub mod report_export;
