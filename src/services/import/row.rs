//! Raw spreadsheet rows and header synonym resolution

use std::collections::HashMap;
use std::fmt;

/// One raw cell value as read from the sheet
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// A cell counts as present when it carries a usable value.
    /// Blank text, zero and `false` are treated as missing, matching how
    /// sheets authored by hand mark an unfilled column.
    pub fn is_present(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Text(s) => !s.trim().is_empty(),
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Bool(b) => *b,
        }
    }

    /// Cell rendered as text, untrimmed
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Trimmed text of a present cell
    pub fn trimmed(&self) -> String {
        self.as_text().trim().to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // Whole numbers print without a fraction, e.g. phone numbers typed as numbers
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// A logical field: its primary column name plus accepted header synonyms
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub synonyms: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(name: &'static str, synonyms: &'static [&'static str]) -> Self {
        Self { name, synonyms }
    }

    /// Candidate headers in lookup order
    pub fn candidates(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.synonyms.iter().copied())
    }
}

/// One data row keyed by header name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: HashMap<String, CellValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, header: impl Into<String>, value: CellValue) {
        self.cells.insert(header.into(), value);
    }

    pub fn with(mut self, header: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(header, value.into());
        self
    }

    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.get(header)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|c| matches!(c, CellValue::Empty))
    }

    /// First present value among the field's candidate headers
    pub fn resolve(&self, field: &FieldSpec) -> Option<&CellValue> {
        field
            .candidates()
            .filter_map(|header| self.cells.get(header))
            .find(|cell| cell.is_present())
    }

    /// Trimmed text of the resolved field, empty when absent
    pub fn text(&self, field: &FieldSpec) -> String {
        self.resolve(field).map(CellValue::trimmed).unwrap_or_default()
    }
}

/// Spreadsheet row number shown to users: one header row plus 1-based indexing
pub fn display_row_number(index: usize) -> usize {
    index + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEEDBACK_TYPE: FieldSpec = FieldSpec::new(
        "feedback_type",
        &["Feedback Type", "feedback type", "jenis_feedback"],
    );

    #[test]
    fn test_resolve_prefers_primary_name() {
        let row = RawRow::new()
            .with("feedback_type", "saran")
            .with("jenis_feedback", "keluhan");
        assert_eq!(row.text(&FEEDBACK_TYPE), "saran");
    }

    #[test]
    fn test_resolve_falls_through_blank_cells_in_order() {
        let row = RawRow::new()
            .with("feedback_type", "   ")
            .with("Feedback Type", "pujian")
            .with("jenis_feedback", "keluhan");
        assert_eq!(row.text(&FEEDBACK_TYPE), "pujian");
    }

    #[test]
    fn test_resolve_has_no_fuzzy_matching() {
        let row = RawRow::new().with("FEEDBACK_TYPE", "saran");
        assert!(row.resolve(&FEEDBACK_TYPE).is_none());
        assert_eq!(row.text(&FEEDBACK_TYPE), "");
    }

    #[test]
    fn test_number_cells_render_without_fraction() {
        assert_eq!(CellValue::Number(81234567890.0).as_text(), "81234567890");
        assert_eq!(CellValue::Number(3.5).as_text(), "3.5");
    }

    #[test]
    fn test_presence_rules() {
        assert!(!CellValue::Empty.is_present());
        assert!(!CellValue::Text(" ".to_string()).is_present());
        assert!(!CellValue::Number(0.0).is_present());
        assert!(CellValue::Number(4.0).is_present());
        assert!(CellValue::Text("0".to_string()).is_present());
    }

    #[test]
    fn test_display_row_number_accounts_for_header() {
        assert_eq!(display_row_number(0), 2);
        assert_eq!(display_row_number(3), 5);
    }
}
