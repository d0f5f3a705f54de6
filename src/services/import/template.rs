//! Downloadable import templates
//!
//! Each template holds the primary column names and example rows. The
//! examples are valid input: feeding a template back through the
//! normalizer accepts every row.

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use super::normalizer::{feedback_fields, report_fields};
use super::row::{CellValue, FieldSpec, RawRow};
use crate::types::ImportKind;

pub const REPORT_TEMPLATE_FILENAME: &str = "template_laporan.xlsx";
pub const FEEDBACK_TEMPLATE_FILENAME: &str = "template_feedback.xlsx";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Gagal membuat template: {0}")]
    Xlsx(#[from] XlsxError),
}

/// One header row plus example rows, in column order
#[derive(Debug, Clone)]
pub struct SheetTemplate {
    pub sheet_name: &'static str,
    pub filename: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTemplate {
    fn new(sheet_name: &'static str, filename: &'static str, fields: &[FieldSpec]) -> Self {
        Self {
            sheet_name,
            filename,
            headers: fields.iter().map(|f| f.name).collect(),
            rows: Vec::new(),
        }
    }

    fn example(mut self, cells: Vec<CellValue>) -> Self {
        debug_assert_eq!(cells.len(), self.headers.len());
        self.rows.push(cells);
        self
    }

    /// Example rows keyed by header, as the sheet reader would return them
    pub fn raw_rows(&self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|cells| {
                let mut row = RawRow::new();
                for (header, cell) in self.headers.iter().zip(cells) {
                    row.insert(*header, cell.clone());
                }
                row
            })
            .collect()
    }

    /// Render as a single-sheet xlsx workbook
    pub fn to_xlsx(&self) -> Result<Vec<u8>, TemplateError> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        let sheet = workbook.add_worksheet().set_name(self.sheet_name)?;

        for (col, header) in self.headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
            sheet.set_column_width(col as u16, column_width(self, col))?;
        }

        for (r, cells) in self.rows.iter().enumerate() {
            let row = r as u32 + 1;
            for (col, cell) in cells.iter().enumerate() {
                let col = col as u16;
                match cell {
                    CellValue::Empty => {}
                    CellValue::Number(n) => {
                        sheet.write_number(row, col, *n)?;
                    }
                    CellValue::Bool(b) => {
                        sheet.write_boolean(row, col, *b)?;
                    }
                    CellValue::Text(s) => {
                        sheet.write_string(row, col, s)?;
                    }
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

fn column_width(template: &SheetTemplate, col: usize) -> f64 {
    let widest = template
        .rows
        .iter()
        .filter_map(|cells| cells.get(col))
        .map(|cell| cell.as_text().chars().count())
        .chain(std::iter::once(template.headers[col].len()))
        .max()
        .unwrap_or(10);
    (widest + 2) as f64
}

pub fn report_template() -> SheetTemplate {
    SheetTemplate::new("Template", REPORT_TEMPLATE_FILENAME, &report_fields::ALL).example(vec![
        "pengaduan".into(),
        "kecelakaan".into(),
        "Deskripsi detail laporan".into(),
        "tinggi".into(),
        "Jl. Malioboro, Yogyakarta".into(),
        "John Doe".into(),
        "081234567890".into(),
        "john@email.com".into(),
        "Bripka Ahmad".into(),
        "Polres Kota Yogyakarta".into(),
        "081234567891".into(),
    ])
}

pub fn feedback_template() -> SheetTemplate {
    SheetTemplate::new("Template Feedback", FEEDBACK_TEMPLATE_FILENAME, &feedback_fields::ALL)
        .example(vec![
            "saran".into(),
            "Contoh Saran Perbaikan".into(),
            "Saran untuk meningkatkan layanan 110".into(),
            CellValue::Number(4.0),
            "user@email.com".into(),
            "John Doe".into(),
        ])
        .example(vec![
            "keluhan".into(),
            "Contoh Keluhan Layanan".into(),
            "Keluhan mengenai respon time yang lambat".into(),
            CellValue::Number(2.0),
            "user2@email.com".into(),
            "Jane Smith".into(),
        ])
        .example(vec![
            "pujian".into(),
            "Pelayanan Sangat Baik".into(),
            "Terima kasih atas pelayanan yang memuaskan".into(),
            CellValue::Number(5.0),
            "user3@email.com".into(),
            "Alice Johnson".into(),
        ])
}

pub fn template_for(kind: ImportKind) -> SheetTemplate {
    match kind {
        ImportKind::Report => report_template(),
        ImportKind::Feedback => feedback_template(),
    }
}
