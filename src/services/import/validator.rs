//! Row validation: required fields, enum membership, rating range
//!
//! Every check is pure and fails with a row-scoped `RowError`; messages
//! name the spreadsheet row and the value as it was received so users can
//! find and fix it in the source file.

use thiserror::Error;

use super::row::{CellValue, FieldSpec, RawRow};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// Row-scoped normalization or validation failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("Baris {row}: Field wajib tidak lengkap. Diperlukan: {}", .required.join(", "))]
    MissingFields { row: usize, required: Vec<&'static str> },

    #[error("Baris {row}: {label} tidak valid ({value}). Harus salah satu dari: {}", .allowed.join(", "))]
    InvalidEnum {
        row: usize,
        label: &'static str,
        value: String,
        allowed: Vec<&'static str>,
    },

    #[error("Baris {row}: Rating harus berupa angka 1-5 (nilai: {value})")]
    InvalidRating { row: usize, value: String },
}

impl RowError {
    pub fn row(&self) -> usize {
        match self {
            RowError::MissingFields { row, .. }
            | RowError::InvalidEnum { row, .. }
            | RowError::InvalidRating { row, .. } => *row,
        }
    }
}

/// Fail when any of the required fields resolves to nothing
pub fn require_fields(row: &RawRow, row_number: usize, required: &[FieldSpec]) -> Result<(), RowError> {
    if required.iter().all(|field| row.resolve(field).is_some()) {
        Ok(())
    } else {
        Err(RowError::MissingFields {
            row: row_number,
            required: required.iter().map(|f| f.name).collect(),
        })
    }
}

/// Normalize an enum cell (stringify, trim, lowercase) and look it up.
/// `raw` is reported untouched in the error.
pub fn check_enum<T>(
    raw: &CellValue,
    row_number: usize,
    label: &'static str,
    allowed: &[&'static str],
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, RowError> {
    let normalized = raw.as_text().trim().to_lowercase();
    parse(&normalized).ok_or_else(|| RowError::InvalidEnum {
        row: row_number,
        label,
        value: raw.as_text(),
        allowed: allowed.to_vec(),
    })
}

/// Coerce a rating cell and check the range; returns the rounded value.
/// Numbers are used as-is, anything else is parsed from its text form.
pub fn check_rating(raw: &CellValue, row_number: usize) -> Result<i32, RowError> {
    let numeric = match raw {
        CellValue::Number(n) => *n,
        other => other.as_text().trim().parse::<f64>().unwrap_or(f64::NAN),
    };

    if numeric.is_nan() || !(MIN_RATING..=MAX_RATING).contains(&numeric) {
        return Err(RowError::InvalidRating {
            row: row_number,
            value: raw.as_text(),
        });
    }

    Ok(numeric.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedbackType;

    const ALLOWED: [&str; 5] = ["saran", "keluhan", "pujian", "bug_report", "fitur_request"];

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_rating_rounds_half_up() {
        assert_eq!(check_rating(&text("3"), 2), Ok(3));
        assert_eq!(check_rating(&CellValue::Number(3.0), 2), Ok(3));
        assert_eq!(check_rating(&CellValue::Number(3.4), 2), Ok(3));
        assert_eq!(check_rating(&CellValue::Number(3.6), 2), Ok(4));
        assert_eq!(check_rating(&CellValue::Number(2.5), 2), Ok(3));
        assert_eq!(check_rating(&CellValue::Number(5.0), 2), Ok(5));
    }

    #[test]
    fn test_rating_out_of_range_or_not_numeric() {
        for raw in [CellValue::Number(0.0), CellValue::Number(6.0), text("abc"), text("0"), text("5.01")] {
            let err = check_rating(&raw, 7).unwrap_err();
            assert!(matches!(err, RowError::InvalidRating { row: 7, .. }), "{:?}", raw);
        }
    }

    #[test]
    fn test_rating_error_quotes_received_value() {
        let err = check_rating(&text("abc"), 4).unwrap_err();
        assert_eq!(err.to_string(), "Baris 4: Rating harus berupa angka 1-5 (nilai: abc)");
    }

    #[test]
    fn test_enum_is_case_insensitive_and_trimmed() {
        assert_eq!(check_enum(&text(" SARAN "), 2, "Jenis feedback", &ALLOWED, FeedbackType::parse), Ok(FeedbackType::Saran));
        assert_eq!(check_enum(&text("Saran"), 2, "Jenis feedback", &ALLOWED, FeedbackType::parse), Ok(FeedbackType::Saran));
    }

    #[test]
    fn test_enum_rejects_unknown_value_with_raw_text() {
        let err = check_enum(&text("Sugestion"), 3, "Jenis feedback", &ALLOWED, FeedbackType::parse).unwrap_err();
        assert_eq!(err.row(), 3);
        let message = err.to_string();
        assert!(message.starts_with("Baris 3: Jenis feedback tidak valid (Sugestion)"));
        assert!(message.contains("bug_report"));
    }

    #[test]
    fn test_require_fields_lists_required_names() {
        const A: FieldSpec = FieldSpec::new("lokasi", &[]);
        const B: FieldSpec = FieldSpec::new("pelapor", &[]);
        let row = RawRow::new().with("pelapor", "Budi");
        let err = require_fields(&row, 9, &[A, B]).unwrap_err();
        assert_eq!(err.to_string(), "Baris 9: Field wajib tidak lengkap. Diperlukan: lokasi, pelapor");

        let row = row.with("lokasi", "Bantul");
        assert!(require_fields(&row, 9, &[A, B]).is_ok());
    }
}
