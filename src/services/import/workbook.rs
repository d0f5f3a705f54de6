//! Spreadsheet parsing (calamine)
//!
//! Only the first sheet is read. Its first row holds the headers; every
//! following non-empty row becomes one `RawRow`.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;

use super::row::{CellValue, RawRow};

const ACCEPTED_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// Batch-fatal parse failure; no row is processed when this occurs
#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("Format file tidak didukung ({0}). Gunakan file .xlsx atau .xls")]
    UnsupportedFormat(String),

    #[error("Ukuran file {size} byte melebihi batas {max} byte")]
    TooLarge { size: usize, max: usize },

    #[error("File tidak dapat dibaca: {0}")]
    Unreadable(String),

    #[error("File tidak berisi sheet")]
    NoSheet,
}

/// Whether an upload name carries a supported spreadsheet extension
pub fn accepts_filename(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Check the name and size of an upload, then parse it
pub fn read_upload(filename: &str, bytes: Vec<u8>, max_bytes: usize) -> Result<Vec<RawRow>, WorkbookError> {
    if !accepts_filename(filename) {
        return Err(WorkbookError::UnsupportedFormat(filename.to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(WorkbookError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }
    read_first_sheet(bytes)
}

/// Parse the first sheet of an in-memory workbook into header-keyed rows
pub fn read_first_sheet(bytes: Vec<u8>) -> Result<Vec<RawRow>, WorkbookError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| WorkbookError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(WorkbookError::NoSheet)?
        .map_err(|e| WorkbookError::Unreadable(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<Option<String>> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| {
                let name = cell_value(cell).trimmed();
                (!name.is_empty()).then_some(name)
            })
            .collect(),
        None => return Ok(Vec::new()),
    };

    let parsed = rows
        .map(|cells| {
            let mut row = RawRow::new();
            for (header, cell) in headers.iter().zip(cells) {
                if let Some(header) = header {
                    row.insert(header.clone(), cell_value(cell));
                }
            }
            row
        })
        .filter(|row| !row.is_empty())
        .collect();

    Ok(parsed)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Dates arrive as their serial number, like any other numeric cell
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn sheet_bytes(headers: &[&str], rows: &[Vec<Option<&str>>]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                if let Some(value) = value {
                    sheet.write_string(r as u32 + 1, col as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_accepts_filename() {
        assert!(accepts_filename("laporan.xlsx"));
        assert!(accepts_filename("DATA.XLS"));
        assert!(!accepts_filename("laporan.csv"));
        assert!(!accepts_filename("xlsx"));
    }

    #[test]
    fn test_reads_header_keyed_rows_and_skips_blank_rows() {
        let bytes = sheet_bytes(
            &["jenis", "lokasi", ""],
            &[
                vec![Some("pengaduan"), Some("Sleman"), Some("ignored")],
                vec![None, None, None],
                vec![Some("informasi"), None, None],
            ],
        );

        let rows = read_first_sheet(bytes).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("lokasi"), Some(&CellValue::Text("Sleman".into())));
        assert_eq!(rows[0].get(""), None);
        assert_eq!(rows[1].get("jenis"), Some(&CellValue::Text("informasi".into())));
        assert!(!rows[1].get("lokasi").map(CellValue::is_present).unwrap_or(false));
    }

    #[test]
    fn test_numeric_cells_stay_numeric() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "rating").unwrap();
        sheet.write_number(1, 0, 4.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = read_first_sheet(bytes).unwrap();
        assert_eq!(rows[0].get("rating"), Some(&CellValue::Number(4.0)));
    }

    #[test]
    fn test_header_only_sheet_has_no_rows() {
        let rows = read_first_sheet(sheet_bytes(&["jenis", "lokasi"], &[])).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_garbage_bytes_are_batch_fatal() {
        let err = read_first_sheet(b"definitely not a workbook".to_vec()).unwrap_err();
        assert!(matches!(err, WorkbookError::Unreadable(_)));
    }

    #[test]
    fn test_read_upload_rejects_extension_and_size() {
        let bytes = sheet_bytes(&["jenis"], &[vec![Some("prank")]]);
        assert!(matches!(
            read_upload("laporan.pdf", bytes.clone(), usize::MAX),
            Err(WorkbookError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            read_upload("laporan.xlsx", bytes.clone(), 10),
            Err(WorkbookError::TooLarge { .. })
        ));
        assert_eq!(read_upload("laporan.xlsx", bytes, usize::MAX).unwrap().len(), 1);
    }
}
